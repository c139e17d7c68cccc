//! State and dispatch machinery shared by the command and query buses.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::FutureExt;
use operations::{CqrsError, DetailMap, OperationKind, OperationResult, Result};
use serde_json::json;

use crate::middleware::{DispatchContext, DispatchResult, Middleware, Next};
use crate::registry::HandlerRegistry;

pub(crate) struct BusCore {
    kind: OperationKind,
    pub(crate) registry: HandlerRegistry,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    initialized: AtomicBool,
}

impl BusCore {
    pub(crate) fn new(kind: OperationKind, allow_override: bool) -> Self {
        Self {
            kind,
            registry: HandlerRegistry::new(kind, allow_override),
            middleware: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CqrsError::BusNotInitialized { kind: self.kind })
        }
    }

    pub(crate) fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        tracing::info!(bus = %self.kind, middleware = middleware.name(), "middleware added");
        self.middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(middleware);
    }

    pub(crate) fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|middleware| middleware.name())
            .collect()
    }

    pub(crate) fn shutdown(&self) {
        self.registry.clear();
        self.middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.initialized.store(false, Ordering::Release);
        tracing::info!(bus = %self.kind, "bus shut down");
    }

    /// Runs `terminal` inside the middleware chain.
    ///
    /// The chain is built from a snapshot of the middleware list, so
    /// middleware added during a dispatch only applies to later ones. A panic
    /// anywhere in the chain is caught and returned as an error.
    pub(crate) async fn dispatch<'a>(
        &self,
        ctx: &'a DispatchContext,
        terminal: Next<'a>,
    ) -> DispatchResult {
        let middleware: Vec<Arc<dyn Middleware>> = self
            .middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let chain = middleware
            .into_iter()
            .rev()
            .fold(terminal, |next, middleware| -> Next<'a> {
                Box::new(move || async move { middleware.handle(ctx, next).await }.boxed())
            });

        match AssertUnwindSafe(async move { chain().await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => Err(CqrsError::other("Panic", panic_message(payload.as_ref()))),
        }
    }

    /// Error map for failures that escaped the handler lifecycle.
    pub(crate) fn unexpected_failure(&self, err: &CqrsError) -> DetailMap {
        let mut errors = DetailMap::new();
        errors.insert(
            "message".into(),
            json!(format!("Unexpected error during {} execution", self.kind.as_str())),
        );
        errors.insert("error_type".into(), json!(err.kind()));
        errors.insert("error_details".into(), json!(err.to_string()));
        errors
    }

    /// Recovers the concrete envelope from the chain's erased result.
    pub(crate) fn downcast<R: OperationResult>(
        &self,
        outcome: DispatchResult,
        expected: &'static str,
    ) -> std::result::Result<R, CqrsError> {
        let erased = outcome?;
        erased
            .into_any()
            .downcast::<R>()
            .map(|result| *result)
            .map_err(|_| {
                CqrsError::other(
                    "ResultTypeMismatch",
                    format!("middleware returned a result that is not {expected}"),
                )
            })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
