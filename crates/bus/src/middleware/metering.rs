use std::time::Instant;

use async_trait::async_trait;
use operations::OperationKind;

use super::{DispatchContext, DispatchResult, Middleware, Next};

/// Records a dispatch counter and a duration histogram per operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn handle(&self, ctx: &DispatchContext, next: Next<'_>) -> DispatchResult {
        let started = Instant::now();
        let outcome = next().await;

        let status = match &outcome {
            Ok(result) => result.status().as_str(),
            Err(_) => "error",
        };
        let counter = match ctx.kind() {
            OperationKind::Command => "cqrs_commands_dispatched_total",
            OperationKind::Query => "cqrs_queries_dispatched_total",
        };

        metrics::counter!(counter, "operation" => ctx.operation_name(), "status" => status)
            .increment(1);
        metrics::histogram!(
            "cqrs_dispatch_duration_seconds",
            "bus" => ctx.kind().as_str(),
            "operation" => ctx.operation_name()
        )
        .record(started.elapsed().as_secs_f64());

        outcome
    }
}
