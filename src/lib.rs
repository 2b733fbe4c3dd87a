//! Assistant Core - intent dispatch and conversational state for a voice/text assistant
//!
//! This crate routes recognized intents to handlers through declarative
//! pattern tables, tracks fire-and-forget actions per session, keeps layered
//! conversational context, and manages the lifecycle of processing workflows.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
