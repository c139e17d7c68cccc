//! Type-erased registrations for batch wiring.

use common::short_type_name;
use handlers::{CommandExecutor, QueryExecutor};
use operations::{Command, Query, Result};

use crate::command_bus::CommandBus;
use crate::query_bus::QueryBus;

type Register<B> = Box<dyn FnOnce(&B) -> Result<()> + Send>;

/// A command executor paired with its command type, ready to register.
///
/// Lets executors for different command types travel in one collection.
pub struct CommandBinding {
    operation: &'static str,
    register: Register<CommandBus>,
}

impl CommandBinding {
    pub fn new<C, E>(executor: E) -> Self
    where
        C: Command,
        E: CommandExecutor<C>,
    {
        Self {
            operation: short_type_name::<C>(),
            register: Box::new(move |bus: &CommandBus| bus.register_handler::<C, E>(executor)),
        }
    }

    /// Name of the command type this binding registers.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub(crate) fn register(self, bus: &CommandBus) -> Result<()> {
        (self.register)(bus)
    }
}

impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// A query executor paired with its query type, ready to register.
pub struct QueryBinding {
    operation: &'static str,
    register: Register<QueryBus>,
}

impl QueryBinding {
    pub fn new<Q, E>(executor: E) -> Self
    where
        Q: Query,
        E: QueryExecutor<Q>,
    {
        Self {
            operation: short_type_name::<Q>(),
            register: Box::new(move |bus: &QueryBus| bus.register_handler::<Q, E>(executor)),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub(crate) fn register(self, bus: &QueryBus) -> Result<()> {
        (self.register)(bus)
    }
}

impl std::fmt::Debug for QueryBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBinding")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}
