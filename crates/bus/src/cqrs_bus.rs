//! Facade over the command and query buses.

use std::collections::BTreeMap;
use std::sync::Arc;

use handlers::{CommandExecutor, QueryExecutor};
use operations::{Command, CommandResult, Query, QueryResult, Result};
use serde::Serialize;

use crate::binding::{CommandBinding, QueryBinding};
use crate::command_bus::CommandBus;
use crate::middleware::Middleware;
use crate::query_bus::QueryBus;
use crate::registry::HandlerInfo;

/// Operation name to handler name, per bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisteredHandlers {
    pub commands: BTreeMap<String, String>,
    pub queries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandlerCounts {
    pub commands: usize,
    pub queries: usize,
    pub total: usize,
}

/// Registration details, including when each handler was registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandlerListing {
    pub commands: Vec<HandlerInfo>,
    pub queries: Vec<HandlerInfo>,
}

/// Single entry point for dispatching commands and queries.
///
/// The bus is an ordinary value: construct one per process (or per test)
/// and share it behind an `Arc`.
pub struct CqrsBus {
    commands: CommandBus,
    queries: QueryBus,
}

impl CqrsBus {
    pub fn new(allow_override: bool) -> Self {
        Self {
            commands: CommandBus::new(allow_override),
            queries: QueryBus::new(allow_override),
        }
    }

    pub fn command_bus(&self) -> &CommandBus {
        &self.commands
    }

    pub fn query_bus(&self) -> &QueryBus {
        &self.queries
    }

    pub async fn execute_command<C: Command>(&self, command: C) -> Result<CommandResult<C::Output>> {
        self.commands.execute(command).await
    }

    pub async fn execute_query<Q: Query>(&self, query: Q) -> Result<QueryResult<Q::Output>> {
        self.queries.execute(query).await
    }

    pub fn register_command_handler<C, E>(&self, executor: E) -> Result<()>
    where
        C: Command,
        E: CommandExecutor<C>,
    {
        self.commands.register_handler::<C, E>(executor)
    }

    pub fn register_command_handlers<I>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = CommandBinding>,
    {
        self.commands.register_handlers(bindings)
    }

    pub fn register_query_handler<Q, E>(&self, executor: E) -> Result<()>
    where
        Q: Query,
        E: QueryExecutor<Q>,
    {
        self.queries.register_handler::<Q, E>(executor)
    }

    pub fn register_query_handlers<I>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = QueryBinding>,
    {
        self.queries.register_handlers(bindings)
    }

    pub fn add_command_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.commands.add_middleware(middleware);
    }

    pub fn add_query_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.queries.add_middleware(middleware);
    }

    pub fn get_registered_handlers(&self) -> RegisteredHandlers {
        RegisteredHandlers {
            commands: self.commands.registered_handlers(),
            queries: self.queries.registered_handlers(),
        }
    }

    pub fn get_handler_count(&self) -> HandlerCounts {
        let commands = self.commands.handler_count();
        let queries = self.queries.handler_count();
        HandlerCounts {
            commands,
            queries,
            total: commands + queries,
        }
    }

    pub fn handler_info(&self) -> HandlerListing {
        HandlerListing {
            commands: self.commands.handler_info(),
            queries: self.queries.handler_info(),
        }
    }

    /// True while both buses accept dispatches.
    pub fn is_initialized(&self) -> bool {
        self.commands.is_initialized() && self.queries.is_initialized()
    }

    /// Shuts down both buses.
    #[tracing::instrument(skip(self))]
    pub fn shutdown(&self) {
        self.commands.shutdown();
        self.queries.shutdown();
        tracing::info!("cqrs bus shut down");
    }
}

impl Default for CqrsBus {
    fn default() -> Self {
        Self::new(false)
    }
}
