//! Command bus.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::short_type_name;
use futures_util::FutureExt;
use handlers::CommandExecutor;
use operations::{
    Command, CommandResult, CqrsError, OperationKind, OperationResult, OperationStatus, Result,
};
use tracing::Instrument;

use crate::binding::CommandBinding;
use crate::dispatch::BusCore;
use crate::middleware::{DispatchContext, Middleware, Next};
use crate::registry::HandlerInfo;

/// Routes each command type to its single registered executor.
pub struct CommandBus {
    core: BusCore,
}

impl CommandBus {
    /// Creates an initialized bus. With `allow_override`, registering a
    /// second handler for a command replaces the first instead of failing.
    pub fn new(allow_override: bool) -> Self {
        Self {
            core: BusCore::new(OperationKind::Command, allow_override),
        }
    }

    /// Registers the executor for command type `C`.
    pub fn register_handler<C, E>(&self, executor: E) -> Result<()>
    where
        C: Command,
        E: CommandExecutor<C>,
    {
        let handler = executor.handler_name();
        let executor: Arc<dyn CommandExecutor<C>> = Arc::new(executor);
        self.core.registry.insert(
            TypeId::of::<C>(),
            short_type_name::<C>(),
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
        I: IntoIterator<Item = CommandBinding>,
    {
        for binding in bindings {
            binding.register(self)?;
        }
        Ok(())
    }

    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.core.add_middleware(middleware);
    }

    /// Dispatches a command to its handler through the middleware chain.
    ///
    /// Returns `Err` only when the bus is shut down or no handler is
    /// registered for `C`; every other failure is reported in the result.
    pub async fn execute<C: Command>(&self, command: C) -> Result<CommandResult<C::Output>> {
        let operation_id = command.metadata().operation_id();
        let command_type = command.name();

        self.core.ensure_initialized()?;
        tracing::debug!(%operation_id, command_type, "executing command");

        let executor = self
            .core
            .registry
            .get::<Arc<dyn CommandExecutor<C>>>(TypeId::of::<C>())
            .ok_or_else(|| {
                tracing::error!(%operation_id, command_type, "no handler registered for command");
                CqrsError::CommandHandlerNotFound {
                    command_type: command_type.to_string(),
                    operation_id: Some(operation_id),
                }
            })?;
        let handler_class = executor.handler_name();
        tracing::debug!(%operation_id, command_type, handler_class, "command handler found");

        let span = tracing::info_span!(
            "command_bus.execute",
            cqrs.bus_type = "command",
            cqrs.command_type = command_type,
            cqrs.operation_id = %operation_id,
            cqrs.handler_class = handler_class,
        );
        let ctx = DispatchContext::new(
            OperationKind::Command,
            command_type,
            handler_class,
            command.metadata().clone(),
        );

        let command = &command;
        let terminal: Next<'_> = Box::new(move || {
            async move {
                let result = executor.execute(command).await;
                Ok(Box::new(result) as Box<dyn OperationResult>)
            }
            .boxed()
        });

        let outcome = self.core.dispatch(&ctx, terminal).instrument(span).await;
        let result = self
            .core
            .downcast::<CommandResult<C::Output>>(outcome, "a CommandResult")
            .unwrap_or_else(|err| {
                tracing::error!(
                    %operation_id,
                    command_type,
                    error_type = err.kind(),
                    error = %err,
                    "unexpected error during command execution"
                );
                CommandResult::failure(
                    OperationStatus::Failed,
                    self.core.unexpected_failure(&err),
                    command.metadata().clone(),
                )
            });

        tracing::debug!(%operation_id, command_type, status = %result.status(), "command execution completed");
        Ok(result)
    }

    /// Command name to handler name for every registration.
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

impl Default for CommandBus {
    fn default() -> Self {
        Self::new(false)
    }
}
