//! Query handler contract and execution lifecycle.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::short_type_name;
use operations::{CacheInfo, CqrsError, OperationKind, Pagination, Query, QueryResult};
use tracing::Instrument;

use crate::outcome::{DispatchState, classify, log_failure};

/// Deadline applied to query handlers that do not override [`QueryHandler::timeout`].
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs the query's own validation and raises it as an error.
pub fn validate_query<Q: Query>(query: &Q) -> Result<(), CqrsError> {
    let errors = query.validate();
    if errors.is_empty() {
        return Ok(());
    }
    Err(CqrsError::QueryValidation {
        query_name: query.name().to_string(),
        errors,
        operation_id: Some(query.metadata().operation_id()),
    })
}

/// Read logic for one query type.
///
/// Besides [`handle`](QueryHandler::handle), a query handler can take part
/// in result caching through [`cached_result`](QueryHandler::cached_result)
/// and [`cache_result`](QueryHandler::cache_result). Both default to no-ops,
/// so caching only happens when a handler or decorator provides a store.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync + 'static {
    async fn handle(&self, query: &Q) -> Result<Q::Output, CqrsError>;

    async fn validate(&self, query: &Q) -> Result<(), CqrsError> {
        validate_query(query)
    }

    async fn authorize(&self, _query: &Q) -> Result<(), CqrsError> {
        Ok(())
    }

    /// Looks up a previously cached output for the query.
    async fn cached_result(&self, _query: &Q) -> Result<Option<Q::Output>, CqrsError> {
        Ok(None)
    }

    /// Stores a freshly computed output for later lookups.
    async fn cache_result(&self, _query: &Q, _output: &Q::Output) -> Result<(), CqrsError> {
        Ok(())
    }

    /// Key reported in the result's cache info.
    fn cache_key(&self, query: &Q) -> Option<String> {
        query.cache_key()
    }

    /// Pagination details for list outputs.
    async fn pagination(&self, _query: &Q, _output: &Q::Output) -> Option<Pagination> {
        None
    }

    /// Runs [`handle`](QueryHandler::handle) under `timeout`.
    async fn handle_within(&self, query: &Q, timeout: Duration) -> Result<Q::Output, CqrsError> {
        match tokio::time::timeout(timeout, self.handle(query)).await {
            Ok(output) => output,
            Err(_) => Err(CqrsError::HandlerTimeout {
                operation_name: query.name().to_string(),
                timeout,
                operation_id: Some(query.metadata().operation_id()),
            }),
        }
    }

    fn timeout(&self) -> Duration {
        DEFAULT_QUERY_TIMEOUT
    }

    fn cache_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

#[async_trait]
impl<Q, H> QueryHandler<Q> for Arc<H>
where
    Q: Query,
    H: QueryHandler<Q> + ?Sized,
{
    async fn handle(&self, query: &Q) -> Result<Q::Output, CqrsError> {
        (**self).handle(query).await
    }

    async fn validate(&self, query: &Q) -> Result<(), CqrsError> {
        (**self).validate(query).await
    }

    async fn authorize(&self, query: &Q) -> Result<(), CqrsError> {
        (**self).authorize(query).await
    }

    async fn cached_result(&self, query: &Q) -> Result<Option<Q::Output>, CqrsError> {
        (**self).cached_result(query).await
    }

    async fn cache_result(&self, query: &Q, output: &Q::Output) -> Result<(), CqrsError> {
        (**self).cache_result(query, output).await
    }

    fn cache_key(&self, query: &Q) -> Option<String> {
        (**self).cache_key(query)
    }

    async fn pagination(&self, query: &Q, output: &Q::Output) -> Option<Pagination> {
        (**self).pagination(query, output).await
    }

    async fn handle_within(&self, query: &Q, timeout: Duration) -> Result<Q::Output, CqrsError> {
        (**self).handle_within(query, timeout).await
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn cache_enabled(&self) -> bool {
        (**self).cache_enabled()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Something the query bus can dispatch a query to.
#[async_trait]
pub trait QueryExecutor<Q: Query>: Send + Sync + 'static {
    /// Runs the full lifecycle. Failures are reported through the result status.
    async fn execute(&self, query: &Q) -> QueryResult<Q::Output>;

    fn handler_name(&self) -> &'static str;
}

enum Fetched<T> {
    Cached(T),
    Fresh(T),
}

/// Runs a [`QueryHandler`] through the fixed query lifecycle:
/// validate, authorize, cache lookup, execute under a deadline, cache store,
/// wrap the outcome.
pub struct QueryLifecycle<Q, H> {
    handler: H,
    timeout: Option<Duration>,
    cache_enabled: Option<bool>,
    _query: PhantomData<fn(&Q)>,
}

impl<Q, H> QueryLifecycle<Q, H>
where
    Q: Query,
    H: QueryHandler<Q>,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            timeout: None,
            cache_enabled: None,
            _query: PhantomData,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn enable_cache(&mut self) {
        self.cache_enabled = Some(true);
    }

    pub fn disable_cache(&mut self) {
        self.cache_enabled = Some(false);
    }

    /// Builder-style cache toggle.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| self.handler.timeout())
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
            .unwrap_or_else(|| self.handler.cache_enabled())
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn run_steps(&self, query: &Q) -> Result<Fetched<Q::Output>, CqrsError> {
        tracing::trace!(state = %DispatchState::Received, "query dispatch state");

        self.handler.validate(query).await?;
        tracing::debug!(state = %DispatchState::Validated, "query.validation.completed");

        self.handler.authorize(query).await?;
        tracing::debug!(state = %DispatchState::Authorized, "query.authorization.completed");

        let cache_enabled = self.cache_enabled();
        if cache_enabled {
            let cached = self.handler.cached_result(query).await?;
            tracing::debug!(
                state = %DispatchState::CacheChecked,
                hit = cached.is_some(),
                "query.cache.checked"
            );
            if let Some(output) = cached {
                metrics::counter!("cqrs_cache_hits_total", "query" => query.name()).increment(1);
                return Ok(Fetched::Cached(output));
            }
        }

        let timeout = self.timeout();
        tracing::trace!(state = %DispatchState::Executing, timeout_secs = timeout.as_secs_f64(), "query dispatch state");

        let output = self.handler.handle_within(query, timeout).await?;

        if cache_enabled {
            self.handler.cache_result(query, &output).await?;
            tracing::debug!(state = %DispatchState::CacheStored, "query.cache.stored");
        }

        Ok(Fetched::Fresh(output))
    }
}

#[async_trait]
impl<Q, H> QueryExecutor<Q> for QueryLifecycle<Q, H>
where
    Q: Query,
    H: QueryHandler<Q>,
{
    async fn execute(&self, query: &Q) -> QueryResult<Q::Output> {
        let metadata = query.metadata().clone();
        let query_name = query.name();
        let span = tracing::info_span!(
            "query.handle",
            cqrs.operation_type = "query",
            cqrs.query_name = query_name,
            cqrs.operation_id = %metadata.operation_id(),
            cqrs.handler = self.handler.name(),
            cqrs.user_id = metadata.user_id(),
            cqrs.cache_enabled = self.cache_enabled(),
            cqrs.cache_hit = tracing::field::Empty,
            cqrs.status = tracing::field::Empty,
            cqrs.execution_time_ms = tracing::field::Empty,
        );

        async {
            let started = Instant::now();
            let outcome = self.run_steps(query).await;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            span.record("cqrs.execution_time_ms", elapsed_ms);
            metrics::histogram!("cqrs_handler_duration_seconds", "operation" => query_name)
                .record(elapsed.as_secs_f64());

            match outcome {
                Ok(Fetched::Cached(output)) => {
                    span.record("cqrs.status", "success");
                    span.record("cqrs.cache_hit", true);
                    tracing::info!(
                        state = %DispatchState::Completed,
                        execution_time_ms = elapsed_ms,
                        "query.cache.hit"
                    );
                    QueryResult::success(output, metadata)
                        .with_cache_info(CacheInfo::hit(self.handler.cache_key(query)))
                }
                Ok(Fetched::Fresh(output)) => {
                    span.record("cqrs.status", "success");
                    span.record("cqrs.cache_hit", false);
                    tracing::info!(
                        state = %DispatchState::Completed,
                        execution_time_ms = elapsed_ms,
                        "query.execution.completed"
                    );
                    let pagination = self.handler.pagination(query, &output).await;
                    QueryResult::success(output, metadata)
                        .with_pagination(pagination)
                        .with_cache_info(CacheInfo::miss(self.handler.cache_key(query)))
                }
                Err(err) => {
                    let failure = classify(OperationKind::Query, &err);
                    span.record("cqrs.status", failure.status.as_str());
                    log_failure(
                        OperationKind::Query,
                        query_name,
                        &err,
                        &failure,
                        elapsed_ms,
                    );
                    QueryResult::failure(failure.status, failure.errors, metadata)
                }
            }
        }
        .instrument(span.clone())
        .await
    }

    fn handler_name(&self) -> &'static str {
        self.handler.name()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use operations::{OperationMetadata, OperationStatus, ValidationErrors};
    use serde_json::json;

    use super::*;

    struct FindWidget {
        id: String,
        metadata: OperationMetadata,
    }

    impl FindWidget {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                metadata: OperationMetadata::new(),
            }
        }
    }

    impl Query for FindWidget {
        type Output = String;

        fn metadata(&self) -> &OperationMetadata {
            &self.metadata
        }

        fn validate(&self) -> ValidationErrors {
            let mut errors = ValidationErrors::new();
            errors.check(!self.id.is_empty(), "id", "required");
            errors
        }

        fn cache_key(&self) -> Option<String> {
            Some(format!("FindWidget:id={}", self.id))
        }
    }

    /// Handler with a private map standing in for a cache store.
    #[derive(Default)]
    struct MemoizingHandler {
        calls: AtomicUsize,
        cache: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl QueryHandler<FindWidget> for MemoizingHandler {
        async fn handle(&self, query: &FindWidget) -> Result<String, CqrsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("widget {}", query.id))
        }

        async fn cached_result(&self, query: &FindWidget) -> Result<Option<String>, CqrsError> {
            let cache = self.cache.lock().unwrap();
            Ok(query.cache_key().and_then(|key| cache.get(&key).cloned()))
        }

        async fn cache_result(&self, query: &FindWidget, output: &String) -> Result<(), CqrsError> {
            if let Some(key) = query.cache_key() {
                self.cache.lock().unwrap().insert(key, output.clone());
            }
            Ok(())
        }
    }

    struct SlowQuery;

    #[async_trait]
    impl QueryHandler<FindWidget> for SlowQuery {
        async fn handle(&self, _query: &FindWidget) -> Result<String, CqrsError> {
            tokio::time::sleep(Duration::from_secs(20)).await;
            Ok("late".into())
        }
    }

    struct Missing;

    #[async_trait]
    impl QueryHandler<FindWidget> for Missing {
        async fn handle(&self, query: &FindWidget) -> Result<String, CqrsError> {
            Err(CqrsError::resource_not_found("Widget", query.id.clone()))
        }
    }

    #[tokio::test]
    async fn test_second_identical_query_hits_cache() {
        let handler = Arc::new(MemoizingHandler::default());
        let lifecycle = QueryLifecycle::<FindWidget, _>::new(handler.clone());

        let first = lifecycle.execute(&FindWidget::new("w1")).await;
        let second = lifecycle.execute(&FindWidget::new("w1")).await;

        assert_eq!(first.data(), Some(&"widget w1".to_string()));
        assert!(!first.cache_info().unwrap().hit);
        assert_eq!(second.data(), Some(&"widget w1".to_string()));
        assert!(second.cache_info().unwrap().hit);
        assert_eq!(
            second.cache_info().unwrap().key.as_deref(),
            Some("FindWidget:id=w1")
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_executes() {
        let handler = Arc::new(MemoizingHandler::default());
        let mut lifecycle = QueryLifecycle::<FindWidget, _>::new(handler.clone());
        lifecycle.disable_cache();

        lifecycle.execute(&FindWidget::new("w1")).await;
        lifecycle.execute(&FindWidget::new("w1")).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert!(handler.cache.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_query_is_rejected_before_cache() {
        let handler = Arc::new(MemoizingHandler::default());
        let lifecycle = QueryLifecycle::<FindWidget, _>::new(handler.clone());

        let result = lifecycle.execute(&FindWidget::new("")).await;

        assert_eq!(result.status(), OperationStatus::ValidationError);
        assert_eq!(result.errors()["id"], json!("required"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_times_out_after_default_deadline() {
        let lifecycle = QueryLifecycle::<FindWidget, _>::new(SlowQuery);
        assert_eq!(lifecycle.timeout(), DEFAULT_QUERY_TIMEOUT);

        let result = lifecycle.execute(&FindWidget::new("w1")).await;

        assert_eq!(result.status(), OperationStatus::Failed);
        assert_eq!(result.error_message(), Some("Execution timed out after 15s"));
    }

    #[tokio::test]
    async fn test_handler_error_reports_kind() {
        let lifecycle = QueryLifecycle::<FindWidget, _>::new(Missing);

        let result = lifecycle.execute(&FindWidget::new("w9")).await;

        assert_eq!(result.status(), OperationStatus::Failed);
        assert_eq!(result.error_message(), Some("Query execution failed"));
        assert_eq!(result.errors()["error_type"], json!("ResourceNotFoundError"));
        assert!(result.cache_info().is_none());
    }

    #[test]
    fn test_cache_toggle_overrides_handler() {
        let lifecycle = QueryLifecycle::<FindWidget, _>::new(Missing);
        assert!(lifecycle.cache_enabled());
        let lifecycle = lifecycle.with_cache(false);
        assert!(!lifecycle.cache_enabled());
        assert_eq!(lifecycle.handler_name(), "Missing");
    }
}
