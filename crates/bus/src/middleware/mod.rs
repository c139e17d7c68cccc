//! Middleware chain wrapped around every dispatch.
//!
//! Middleware is registered per bus and runs in registration order: the
//! first registered middleware sees the dispatch first and the result last.
//! Each middleware receives a one-shot [`Next`] continuation and decides
//! whether, and when, to call it.

mod logging;
mod metering;

use async_trait::async_trait;
use common::short_type_name;
use futures_util::future::BoxFuture;
use operations::{CqrsError, OperationKind, OperationMetadata, OperationResult};

pub use logging::LoggingMiddleware;
pub use metering::MetricsMiddleware;

/// Outcome flowing back through the chain.
pub type DispatchResult = Result<Box<dyn OperationResult>, CqrsError>;

/// Continuation that runs the rest of the chain, ending with the handler.
pub type Next<'a> = Box<dyn FnOnce() -> BoxFuture<'a, DispatchResult> + Send + 'a>;

/// Read-only facts about the dispatch a middleware is wrapping.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    kind: OperationKind,
    operation_name: &'static str,
    handler_name: &'static str,
    metadata: OperationMetadata,
}

impl DispatchContext {
    pub fn new(
        kind: OperationKind,
        operation_name: &'static str,
        handler_name: &'static str,
        metadata: OperationMetadata,
    ) -> Self {
        Self {
            kind,
            operation_name,
            handler_name,
            metadata,
        }
    }

    /// Whether this is a command or a query dispatch.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn operation_name(&self) -> &'static str {
        self.operation_name
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }
}

/// A step wrapped around handler execution.
///
/// Returning without calling `next` short-circuits the dispatch; returning
/// `Err` turns the dispatch into a failed result.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }

    async fn handle(&self, ctx: &DispatchContext, next: Next<'_>) -> DispatchResult;
}
