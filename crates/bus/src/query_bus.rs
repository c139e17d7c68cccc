//! Query bus.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::short_type_name;
use futures_util::FutureExt;
use handlers::QueryExecutor;
use operations::{
    CqrsError, OperationKind, OperationResult, OperationStatus, Query, QueryResult, Result,
};
use tracing::Instrument;

use crate::binding::QueryBinding;
use crate::dispatch::BusCore;
use crate::middleware::{DispatchContext, Middleware, Next};
use crate::registry::HandlerInfo;

/// Routes each query type to its single registered executor.
pub struct QueryBus {
    core: BusCore,
}

impl QueryBus {
    /// Creates an initialized bus. With `allow_override`, registering a
    /// second handler for a query replaces the first instead of failing.
    pub fn new(allow_override: bool) -> Self {
        Self {
            core: BusCore::new(OperationKind::Query, allow_override),
        }
    }

    /// Registers the executor for query type `Q`.
    pub fn register_handler<Q, E>(&self, executor: E) -> Result<()>
    where
        Q: Query,
        E: QueryExecutor<Q>,
    {
        let handler = executor.handler_name();
        let executor: Arc<dyn QueryExecutor<Q>> = Arc::new(executor);
        self.core.registry.insert(
            TypeId::of::<Q>(),
            short_type_name::<Q>(),
            handler,
            Box::new(executor),
        )
    }

    /// Registers a batch of handlers in order.
    ///
    /// Stops at the first failure; handlers registered before it stay
    /// registered.
    pub fn register_handlers<I>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = QueryBinding>,
    {
        for binding in bindings {
            binding.register(self)?;
        }
        Ok(())
    }

    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.core.add_middleware(middleware);
    }

    /// Dispatches a query to its handler through the middleware chain.
    ///
    /// Returns `Err` only when the bus is shut down or no handler is
    /// registered for `Q`; every other failure is reported in the result.
    pub async fn execute<Q: Query>(&self, query: Q) -> Result<QueryResult<Q::Output>> {
        let operation_id = query.metadata().operation_id();
        let query_type = query.name();

        self.core.ensure_initialized()?;
        tracing::debug!(%operation_id, query_type, "executing query");

        let executor = self
            .core
            .registry
            .get::<Arc<dyn QueryExecutor<Q>>>(TypeId::of::<Q>())
            .ok_or_else(|| {
                tracing::error!(%operation_id, query_type, "no handler registered for query");
                CqrsError::QueryHandlerNotFound {
                    query_type: query_type.to_string(),
                    operation_id: Some(operation_id),
                }
            })?;
        let handler_class = executor.handler_name();
        tracing::debug!(%operation_id, query_type, handler_class, "query handler found");

        let span = tracing::info_span!(
            "query_bus.execute",
            cqrs.bus_type = "query",
            cqrs.query_type = query_type,
            cqrs.operation_id = %operation_id,
            cqrs.handler_class = handler_class,
        );
        let ctx = DispatchContext::new(
            OperationKind::Query,
            query_type,
            handler_class,
            query.metadata().clone(),
        );

        let query = &query;
        let terminal: Next<'_> = Box::new(move || {
            async move {
                let result = executor.execute(query).await;
                Ok(Box::new(result) as Box<dyn OperationResult>)
            }
            .boxed()
        });

        let outcome = self.core.dispatch(&ctx, terminal).instrument(span).await;
        let result = self
            .core
            .downcast::<QueryResult<Q::Output>>(outcome, "a QueryResult")
            .unwrap_or_else(|err| {
                tracing::error!(
                    %operation_id,
                    query_type,
                    error_type = err.kind(),
                    error = %err,
                    "unexpected error during query execution"
                );
                QueryResult::failure(
                    OperationStatus::Failed,
                    self.core.unexpected_failure(&err),
                    query.metadata().clone(),
                )
            });

        tracing::debug!(%operation_id, query_type, status = %result.status(), "query execution completed");
        Ok(result)
    }

    /// Query name to handler name for every registration.
    pub fn registered_handlers(&self) -> BTreeMap<String, String> {
        self.core.registry.names()
    }

    pub fn handler_info(&self) -> Vec<HandlerInfo> {
        self.core.registry.info()
    }

    pub fn handler_count(&self) -> usize {
        self.core.registry.len()
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.core.middleware_names()
    }

    pub fn allows_override(&self) -> bool {
        self.core.registry.allow_override()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_initialized()
    }

    /// Drops all handlers and middleware. Later dispatches fail with
    /// `BusNotInitialized`.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new(false)
    }
}
