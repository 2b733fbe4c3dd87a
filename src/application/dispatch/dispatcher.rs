//! DonationDispatcher - routes intents to one handler's bound methods.
//!
//! The handler declares its methods as a `(name, fn)` table at compile time.
//! The pattern table decides which intents reach the handler and which method
//! serves each intent suffix. Both are reconciled once at registration.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;

use super::errors::{DispatchError, HandlerError, RegistrationError};
use crate::application::actions::ActionTracker;
use crate::application::sessions::SharedContext;
use crate::domain::foundation::SessionId;
use crate::domain::intent::{Intent, IntentResult, PatternTable};
use crate::ports::PatternSource;

/// Per-request collaborators handed to handler methods.
#[derive(Clone)]
pub struct DispatchContext {
    pub session_id: SessionId,
    pub conversation: SharedContext,
    pub actions: Arc<ActionTracker>,
}

/// A bound handler method.
pub type HandlerMethod<H> = for<'a> fn(
    &'a H,
    &'a Intent,
    &'a DispatchContext,
) -> BoxFuture<'a, Result<IntentResult, HandlerError>>;

/// A handler whose methods are routed by a pattern table.
pub trait DonationHandler: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Method name to function table.
    fn methods() -> Vec<(&'static str, HandlerMethod<Self>)>
    where
        Self: Sized;

    fn is_available(&self) -> bool {
        true
    }
}

/// What a registered handler can do, for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerCapabilities {
    pub name: String,
    pub domains: Vec<String>,
    pub methods: Vec<String>,
    pub available: bool,
}

/// Object-safe view of a dispatcher used by the orchestrator.
#[async_trait]
pub trait RoutedHandler: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, intent: &Intent) -> bool;

    fn resolve_method(&self, intent: &Intent) -> Option<String>;

    async fn execute(
        &self,
        intent: &Intent,
        ctx: &DispatchContext,
    ) -> Result<IntentResult, DispatchError>;

    fn is_available(&self) -> bool;

    fn capabilities(&self) -> HandlerCapabilities;
}

struct TableSnapshot {
    generation: u64,
    table: Option<Arc<PatternTable>>,
}

pub struct DonationDispatcher<H: DonationHandler> {
    handler: H,
    bindings: Vec<(&'static str, HandlerMethod<H>)>,
    source: Arc<dyn PatternSource>,
    snapshot: RwLock<TableSnapshot>,
}

impl<H: DonationHandler> DonationDispatcher<H> {
    /// Binds `handler` to its pattern table.
    ///
    /// A missing table is fatal. Methods named by the table but not bound
    /// are logged, or fatal when `strict`.
    pub fn register(
        handler: H,
        source: Arc<dyn PatternSource>,
        strict: bool,
    ) -> Result<Self, RegistrationError> {
        let name = handler.name().to_string();
        let generation = source.generation();
        let table = source
            .pattern_table(&name)
            .ok_or_else(|| RegistrationError::DonationMissing {
                handler: name.clone(),
            })?;

        let bindings = H::methods();
        let unbound: Vec<String> = table
            .method_names()
            .into_iter()
            .filter(|method| !bindings.iter().any(|(bound, _)| bound == method))
            .map(str::to_string)
            .collect();

        if !unbound.is_empty() {
            if strict {
                return Err(RegistrationError::UnboundMethods {
                    handler: name,
                    methods: unbound,
                });
            }
            tracing::warn!(handler = %name, methods = ?unbound, "Pattern table names methods with no binding");
        }

        tracing::info!(
            handler = %name,
            domains = ?table.domain_patterns,
            methods = bindings.len(),
            "Registered intent handler"
        );

        Ok(Self {
            handler,
            bindings,
            source,
            snapshot: RwLock::new(TableSnapshot {
                generation,
                table: Some(table),
            }),
        })
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The current table, re-read from the source after an external reload.
    fn table(&self) -> Option<Arc<PatternTable>> {
        let generation = self.source.generation();
        {
            let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
            if snapshot.generation == generation {
                return snapshot.table.clone();
            }
        }

        let table = self.source.pattern_table(self.handler.name());
        if table.is_none() {
            tracing::warn!(handler = self.handler.name(), generation, "Pattern table disappeared after reload");
        }
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *snapshot = TableSnapshot {
            generation,
            table: table.clone(),
        };
        table
    }

    fn binding(&self, method: &str) -> Option<HandlerMethod<H>> {
        self.bindings
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, f)| *f)
    }
}

#[async_trait]
impl<H: DonationHandler> RoutedHandler for DonationDispatcher<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn can_handle(&self, intent: &Intent) -> bool {
        self.table()
            .map(|table| table.match_intent(intent).is_some())
            .unwrap_or(false)
    }

    fn resolve_method(&self, intent: &Intent) -> Option<String> {
        self.table()?.resolve_method(intent).map(str::to_string)
    }

    async fn execute(
        &self,
        intent: &Intent,
        ctx: &DispatchContext,
    ) -> Result<IntentResult, DispatchError> {
        let table = self.table().ok_or_else(|| DispatchError::DonationMissing {
            handler: self.name().to_string(),
        })?;
        let method = table
            .resolve_method(intent)
            .ok_or_else(|| DispatchError::MethodNotFound {
                intent: intent.name().to_string(),
            })?;
        let bound = self
            .binding(method)
            .ok_or_else(|| DispatchError::MethodNotImplemented {
                method: method.to_string(),
            })?;

        tracing::debug!(handler = self.name(), method, intent = intent.name(), "Dispatching intent");

        bound(&self.handler, intent, ctx)
            .await
            .map_err(|err| DispatchError::MethodExecution {
                method: method.to_string(),
                cause: err.to_string(),
            })
    }

    fn is_available(&self) -> bool {
        self.handler.is_available()
    }

    fn capabilities(&self) -> HandlerCapabilities {
        let table = self.table();
        HandlerCapabilities {
            name: self.name().to_string(),
            domains: table
                .as_ref()
                .map(|t| t.domain_patterns.clone())
                .unwrap_or_default(),
            methods: self.bindings.iter().map(|(name, _)| name.to_string()).collect(),
            available: self.handler.is_available(),
        }
    }
}
