//! Retry with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use handlers::{CommandHandler, QueryHandler};
use operations::{Command, CqrsError, DetailMap, Pagination, Query};

use crate::filter::ErrorFilter;

/// Retries the wrapped handler's `handle` on failure.
///
/// Attempt `n` (1-based) that fails with an error matching the retry filter
/// is followed by a sleep of `delay * multiplier^(n-1)`. Each attempt runs
/// under its own copy of the deadline handed to `handle_within`, which is
/// the lifecycle's configured timeout or the inner handler's own. After the
/// last attempt the last error is returned.
pub struct RetryOnFailure<H> {
    inner: H,
    max_attempts: u32,
    delay: Duration,
    backoff_multiplier: f64,
    retry_on: ErrorFilter,
}

impl<H> RetryOnFailure<H> {
    /// Three attempts, one second initial delay, doubling.
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            retry_on: ErrorFilter::all(),
        }
    }

    /// Total number of attempts, including the first. At least one.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Factor applied to the delay after each failed attempt. Negative and
    /// non-finite values are ignored.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        if multiplier.is_finite() && multiplier >= 0.0 {
            self.backoff_multiplier = multiplier;
        }
        self
    }

    pub fn retry_on(mut self, filter: ErrorFilter) -> Self {
        self.retry_on = filter;
        self
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(Duration::MAX)
    }

    async fn run<F, Fut, T>(
        &self,
        operation_name: &'static str,
        mut attempt_once: F,
    ) -> Result<T, CqrsError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, CqrsError>> + Send,
        T: Send,
    {
        let mut delay = self.delay;
        let mut attempt = 1;

        loop {
            tracing::debug!(attempt, max_attempts = self.max_attempts, "retry.attempt");
            match attempt_once().await {
                Ok(output) => {
                    if attempt > 1 {
                        tracing::info!(attempt, operation = operation_name, "retry.succeeded");
                    }
                    return Ok(output);
                }
                Err(err) if attempt < self.max_attempts && self.retry_on.matches(&err) => {
                    metrics::counter!("cqrs_retry_attempts_total", "operation" => operation_name)
                        .increment(1);
                    tracing::warn!(
                        attempt,
                        operation = operation_name,
                        error = %err,
                        next_delay_secs = delay.as_secs_f64(),
                        "retry.failed_attempt"
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.next_delay(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if self.retry_on.matches(&err) {
                        tracing::error!(
                            final_attempt = attempt,
                            operation = operation_name,
                            error = %err,
                            "retry.exhausted"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl<C, H> CommandHandler<C> for RetryOnFailure<H>
where
    C: Command,
    H: CommandHandler<C>,
{
    async fn handle(&self, command: &C) -> Result<C::Output, CqrsError> {
        CommandHandler::<C>::handle_within(self, command, self.inner.timeout()).await
    }

    async fn handle_within(&self, command: &C, timeout: Duration) -> Result<C::Output, CqrsError> {
        self.run(command.name(), || self.inner.handle_within(command, timeout))
            .await
    }

    async fn validate(&self, command: &C) -> Result<(), CqrsError> {
        self.inner.validate(command).await
    }

    async fn authorize(&self, command: &C) -> Result<(), CqrsError> {
        self.inner.authorize(command).await
    }

    async fn affected_entities(&self, command: &C, output: &C::Output) -> Option<DetailMap> {
        self.inner.affected_entities(command, output).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[async_trait]
impl<Q, H> QueryHandler<Q> for RetryOnFailure<H>
where
    Q: Query,
    H: QueryHandler<Q>,
{
    async fn handle(&self, query: &Q) -> Result<Q::Output, CqrsError> {
        QueryHandler::<Q>::handle_within(self, query, self.inner.timeout()).await
    }

    async fn handle_within(&self, query: &Q, timeout: Duration) -> Result<Q::Output, CqrsError> {
        self.run(query.name(), || self.inner.handle_within(query, timeout))
            .await
    }

    async fn validate(&self, query: &Q) -> Result<(), CqrsError> {
        self.inner.validate(query).await
    }

    async fn authorize(&self, query: &Q) -> Result<(), CqrsError> {
        self.inner.authorize(query).await
    }

    async fn cached_result(&self, query: &Q) -> Result<Option<Q::Output>, CqrsError> {
        self.inner.cached_result(query).await
    }

    async fn cache_result(&self, query: &Q, output: &Q::Output) -> Result<(), CqrsError> {
        self.inner.cache_result(query, output).await
    }

    fn cache_key(&self, query: &Q) -> Option<String> {
        self.inner.cache_key(query)
    }

    async fn pagination(&self, query: &Q, output: &Q::Output) -> Option<Pagination> {
        self.inner.pagination(query, output).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn cache_enabled(&self) -> bool {
        self.inner.cache_enabled()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use handlers::{CommandExecutor, CommandLifecycle};
    use operations::{OperationMetadata, OperationStatus, ValidationErrors};
    use tokio::time::Instant;

    use super::*;

    struct Charge {
        metadata: OperationMetadata,
    }

    impl Charge {
        fn new() -> Self {
            Self {
                metadata: OperationMetadata::new(),
            }
        }
    }

    impl Command for Charge {
        type Output = u32;

        fn metadata(&self) -> &OperationMetadata {
            &self.metadata
        }

        fn validate(&self) -> ValidationErrors {
            ValidationErrors::new()
        }
    }

    /// Fails until it has been called `succeed_on` times.
    struct Flaky {
        calls: AtomicU32,
        succeed_on: u32,
        kind: &'static str,
    }

    impl Flaky {
        fn new(succeed_on: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                succeed_on,
                kind: "IoError",
            }
        }
    }

    #[async_trait]
    impl CommandHandler<Charge> for Flaky {
        async fn handle(&self, _command: &Charge) -> Result<u32, CqrsError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(call)
            } else {
                Err(CqrsError::other(self.kind, format!("attempt {call} failed")))
            }
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
    }

    async fn charge(handler: &impl CommandHandler<Charge>) -> Result<u32, CqrsError> {
        handler.handle(&Charge::new()).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let retry = RetryOnFailure::new(Flaky::new(3));
        let started = Instant::now();

        let output = charge(&retry).await.unwrap();

        assert_eq!(output, 3);
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let retry = RetryOnFailure::new(Flaky::new(10)).max_attempts(2);

        let err = charge(&retry).await.unwrap_err();

        assert_eq!(err.to_string(), "attempt 2 failed");
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_matching_error_is_not_retried() {
        let retry =
            RetryOnFailure::new(Flaky::new(3)).retry_on(ErrorFilter::kinds(["ConcurrencyError"]));

        let err = charge(&retry).await.unwrap_err();

        assert_eq!(err.kind(), "IoError");
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_timeout_is_the_per_attempt_deadline() {
        let retry = RetryOnFailure::new(Flaky::new(1)).max_attempts(5);
        assert_eq!(
            CommandHandler::<Charge>::timeout(&retry),
            Duration::from_secs(5)
        );
    }

    /// Hangs on the first call, answers on later ones.
    struct HangsOnce {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CommandHandler<Charge> for HangsOnce {
        async fn handle(&self, _command: &Charge) -> Result<u32, CqrsError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(7)
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_gets_a_fresh_timeout() {
        let lifecycle = CommandLifecycle::<Charge, _>::new(
            RetryOnFailure::new(HangsOnce {
                calls: AtomicU32::new(0),
            })
            .delay(Duration::from_millis(100)),
        );

        let result = lifecycle.execute(&Charge::new()).await;

        assert_eq!(result.status(), OperationStatus::Success);
        assert_eq!(result.data(), Some(&7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_timeout_applies_to_each_attempt() {
        let lifecycle = CommandLifecycle::<Charge, _>::new(RetryOnFailure::new(Flaky::new(3)))
            .with_timeout(Duration::from_secs(2));

        let result = lifecycle.execute(&Charge::new()).await;

        assert_eq!(result.status(), OperationStatus::Success);
        assert_eq!(result.data(), Some(&3));
        assert_eq!(lifecycle.handler().inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_carries_the_operation_id() {
        let retry = RetryOnFailure::new(HangsOnce {
            calls: AtomicU32::new(0),
        })
        .max_attempts(1);
        let command = Charge::new();

        let err = CommandHandler::<Charge>::handle(&retry, &command)
            .await
            .unwrap_err();

        assert!(matches!(err, CqrsError::HandlerTimeout { .. }));
        assert_eq!(err.operation_id(), Some(command.metadata().operation_id()));
    }
}
