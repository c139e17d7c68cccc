//! Handler contracts and the execution lifecycle shared by all handlers.
//!
//! Concrete handlers implement only the business step
//! ([`CommandHandler::handle`] / [`QueryHandler::handle`]). The lifecycle
//! runners ([`CommandLifecycle`], [`QueryLifecycle`]) wrap every call in the
//! same template: validate, authorize, (query) cache check, execute under a
//! deadline, (query) cache store, wrap the outcome in a result envelope.

pub mod command;
pub mod outcome;
pub mod query;

pub use command::{
    CommandExecutor, CommandHandler, CommandLifecycle, DEFAULT_COMMAND_TIMEOUT, validate_command,
};
pub use outcome::DispatchState;
pub use query::{
    DEFAULT_QUERY_TIMEOUT, QueryExecutor, QueryHandler, QueryLifecycle, validate_query,
};
