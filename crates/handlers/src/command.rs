//! Command handler contract and execution lifecycle.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::short_type_name;
use operations::{Command, CommandResult, CqrsError, DetailMap, OperationKind};
use tracing::Instrument;

use crate::outcome::{DispatchState, classify, log_failure};

/// Deadline applied to command handlers that do not override [`CommandHandler::timeout`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the command's own validation and raises it as an error.
pub fn validate_command<C: Command>(command: &C) -> Result<(), CqrsError> {
    let errors = command.validate();
    if errors.is_empty() {
        return Ok(());
    }
    Err(CqrsError::CommandValidation {
        command_name: command.name().to_string(),
        errors,
        operation_id: Some(command.metadata().operation_id()),
    })
}

/// Business logic for one command type.
///
/// Only [`handle`](CommandHandler::handle) is required. The other methods are
/// lifecycle hooks with permissive defaults; they are called by
/// [`CommandLifecycle`] in a fixed order and never by the bus directly.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    /// Executes the command and produces its output.
    async fn handle(&self, command: &C) -> Result<C::Output, CqrsError>;

    /// Validates the command. Defaults to the command's own rules.
    async fn validate(&self, command: &C) -> Result<(), CqrsError> {
        validate_command(command)
    }

    /// Checks the caller may run the command. Allows everything by default.
    async fn authorize(&self, _command: &C) -> Result<(), CqrsError> {
        Ok(())
    }

    /// Describes the entities a successful execution touched.
    async fn affected_entities(&self, _command: &C, _output: &C::Output) -> Option<DetailMap> {
        None
    }

    /// Runs [`handle`](CommandHandler::handle) under `timeout`.
    ///
    /// The lifecycle calls this with its configured deadline. Decorators that
    /// call `handle` more than once override it to apply the deadline to
    /// each call.
    async fn handle_within(&self, command: &C, timeout: Duration) -> Result<C::Output, CqrsError> {
        // The handler future is dropped when the deadline passes, which cancels it.
        match tokio::time::timeout(timeout, self.handle(command)).await {
            Ok(output) => output,
            Err(_) => Err(CqrsError::HandlerTimeout {
                operation_name: command.name().to_string(),
                timeout,
                operation_id: Some(command.metadata().operation_id()),
            }),
        }
    }

    /// Deadline for a single [`handle`](CommandHandler::handle) call.
    fn timeout(&self) -> Duration {
        DEFAULT_COMMAND_TIMEOUT
    }

    /// Handler name reported in logs and registry listings.
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

#[async_trait]
impl<C, H> CommandHandler<C> for Arc<H>
where
    C: Command,
    H: CommandHandler<C> + ?Sized,
{
    async fn handle(&self, command: &C) -> Result<C::Output, CqrsError> {
        (**self).handle(command).await
    }

    async fn validate(&self, command: &C) -> Result<(), CqrsError> {
        (**self).validate(command).await
    }

    async fn authorize(&self, command: &C) -> Result<(), CqrsError> {
        (**self).authorize(command).await
    }

    async fn affected_entities(&self, command: &C, output: &C::Output) -> Option<DetailMap> {
        (**self).affected_entities(command, output).await
    }

    async fn handle_within(&self, command: &C, timeout: Duration) -> Result<C::Output, CqrsError> {
        (**self).handle_within(command, timeout).await
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Something the command bus can dispatch a command to.
#[async_trait]
pub trait CommandExecutor<C: Command>: Send + Sync + 'static {
    /// Runs the full lifecycle. Never returns an error; failures are
    /// reported through the result status.
    async fn execute(&self, command: &C) -> CommandResult<C::Output>;

    fn handler_name(&self) -> &'static str;
}

/// Runs a [`CommandHandler`] through the fixed command lifecycle:
/// validate, authorize, execute under a deadline, wrap the outcome.
pub struct CommandLifecycle<C, H> {
    handler: H,
    timeout: Option<Duration>,
    _command: PhantomData<fn(&C)>,
}

impl<C, H> CommandLifecycle<C, H>
where
    C: Command,
    H: CommandHandler<C>,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            timeout: None,
            _command: PhantomData,
        }
    }

    /// Overrides the handler's own deadline. The value is handed to
    /// [`CommandHandler::handle_within`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Returns the deadline in effect for each execution.
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| self.handler.timeout())
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn run_steps(&self, command: &C) -> Result<C::Output, CqrsError> {
        tracing::trace!(state = %DispatchState::Received, "command dispatch state");

        self.handler.validate(command).await?;
        tracing::debug!(state = %DispatchState::Validated, "command.validation.completed");

        self.handler.authorize(command).await?;
        tracing::debug!(state = %DispatchState::Authorized, "command.authorization.completed");

        let timeout = self.timeout();
        tracing::trace!(state = %DispatchState::Executing, timeout_secs = timeout.as_secs_f64(), "command dispatch state");

        self.handler.handle_within(command, timeout).await
    }
}

#[async_trait]
impl<C, H> CommandExecutor<C> for CommandLifecycle<C, H>
where
    C: Command,
    H: CommandHandler<C>,
{
    async fn execute(&self, command: &C) -> CommandResult<C::Output> {
        let metadata = command.metadata().clone();
        let command_name = command.name();
        let span = tracing::info_span!(
            "command.handle",
            cqrs.operation_type = "command",
            cqrs.command_name = command_name,
            cqrs.operation_id = %metadata.operation_id(),
            cqrs.handler = self.handler.name(),
            cqrs.user_id = metadata.user_id(),
            cqrs.status = tracing::field::Empty,
            cqrs.execution_time_ms = tracing::field::Empty,
        );

        async {
            let started = Instant::now();
            let outcome = self.run_steps(command).await;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            span.record("cqrs.execution_time_ms", elapsed_ms);
            metrics::histogram!("cqrs_handler_duration_seconds", "operation" => command_name)
                .record(elapsed.as_secs_f64());

            match outcome {
                Ok(output) => {
                    span.record("cqrs.status", "success");
                    tracing::info!(
                        state = %DispatchState::Completed,
                        execution_time_ms = elapsed_ms,
                        "command.execution.completed"
                    );
                    let affected = self.handler.affected_entities(command, &output).await;
                    CommandResult::success(output, metadata).with_affected_entities(affected)
                }
                Err(err) => {
                    let failure = classify(OperationKind::Command, &err);
                    span.record("cqrs.status", failure.status.as_str());
                    log_failure(
                        OperationKind::Command,
                        command_name,
                        &err,
                        &failure,
                        elapsed_ms,
                    );
                    CommandResult::failure(failure.status, failure.errors, metadata)
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
