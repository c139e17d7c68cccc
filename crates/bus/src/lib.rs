//! In-process command and query dispatch.
//!
//! A [`CqrsBus`] owns one [`CommandBus`] and one [`QueryBus`]. Each bus maps
//! an operation type to exactly one executor (usually a
//! [`handlers::CommandLifecycle`] or [`handlers::QueryLifecycle`]) and runs
//! every dispatch through its [`Middleware`] chain.
//!
//! Configuration mistakes (missing handler, duplicate registration, dispatch
//! after shutdown) are returned as `Err`. Everything that happens once a
//! handler is found, including panics, is reported in the result envelope.

pub mod binding;
pub mod command_bus;
mod dispatch;
pub mod cqrs_bus;
pub mod middleware;
pub mod query_bus;
pub mod registry;

pub use binding::{CommandBinding, QueryBinding};
pub use command_bus::CommandBus;
pub use cqrs_bus::{CqrsBus, HandlerCounts, HandlerListing, RegisteredHandlers};
pub use middleware::{
    DispatchContext, DispatchResult, LoggingMiddleware, MetricsMiddleware, Middleware, Next,
};
pub use query_bus::QueryBus;
pub use registry::HandlerInfo;
