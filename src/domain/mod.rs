//! Domain layer containing the assistant's core types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, state machine)
//! - `intent` - Recognized intents, results, and per-handler pattern tables
//! - `action` - Fire-and-forget action records, failure classification, notifications
//! - `conversation` - Per-session conversational state, threads, layers, retention
//! - `pipeline` - Stage selection for a request
//! - `workflow` - Workflow lifecycle state and load progress

pub mod action;
pub mod conversation;
pub mod foundation;
pub mod intent;
pub mod pipeline;
pub mod workflow;
