//! Wrappers that add cross-cutting behavior to handlers.
//!
//! Every decorator is a plain struct that owns the handler it wraps and
//! implements the same handler trait, so decorators stack by nesting:
//!
//! ```ignore
//! let handler = RetryOnFailure::new(Transactional::new(CreateWidgetHandler::new(repo)));
//! command_handler::<CreateWidget, _>(handler).install(&bus);
//! ```
//!
//! Hooks a decorator does not change are forwarded to the inner handler,
//! including `name()`, so registrations keep reporting the business handler.

pub mod authorize;
pub mod cache;
pub mod filter;
pub mod registration;
pub mod retry;
pub mod transactional;
pub mod validate;

pub use authorize::{Authorize, PermissionSource, StaticPermissions};
pub use cache::{CacheStore, CachedQuery, InMemoryCacheStore};
pub use filter::ErrorFilter;
pub use registration::{CommandRegistration, QueryRegistration, command_handler, query_handler};
pub use retry::RetryOnFailure;
pub use transactional::{
    IsolationLevel, Transactional, TracingTransaction, TracingTransactionManager,
    TransactionManager,
};
pub use validate::ValidateInput;
