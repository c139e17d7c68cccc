use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::{DispatchContext, DispatchResult, Middleware, Next};

/// Logs the start and outcome of every dispatch.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    log_errors: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes the result's error map in the failure log line.
    pub fn with_error_details(mut self) -> Self {
        self.log_errors = true;
        self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, ctx: &DispatchContext, next: Next<'_>) -> DispatchResult {
        let operation_id = ctx.metadata().operation_id();
        tracing::info!(
            bus = %ctx.kind(),
            operation = ctx.operation_name(),
            handler = ctx.handler_name(),
            %operation_id,
            user_id = ctx.metadata().user_id(),
            "dispatch started"
        );

        let started = Instant::now();
        let outcome = next().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(result) if result.status().is_success() => tracing::info!(
                bus = %ctx.kind(),
                operation = ctx.operation_name(),
                %operation_id,
                status = %result.status(),
                elapsed_ms,
                "dispatch completed"
            ),
            Ok(result) if self.log_errors => {
                let errors = Value::Object(result.errors().clone());
                tracing::warn!(
                    bus = %ctx.kind(),
                    operation = ctx.operation_name(),
                    %operation_id,
                    status = %result.status(),
                    %errors,
                    elapsed_ms,
                    "dispatch completed with failure"
                )
            }
            Ok(result) => tracing::warn!(
                bus = %ctx.kind(),
                operation = ctx.operation_name(),
                %operation_id,
                status = %result.status(),
                elapsed_ms,
                "dispatch completed with failure"
            ),
            Err(err) => tracing::error!(
                bus = %ctx.kind(),
                operation = ctx.operation_name(),
                %operation_id,
                error = %err,
                elapsed_ms,
                "dispatch failed"
            ),
        }

        outcome
    }
}
