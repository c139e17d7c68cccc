//! Sample widget domain for the CQRS runtime.
//!
//! A small in-memory catalogue of widgets with commands to create and
//! rename them and queries to fetch or list them. Used by the end-to-end
//! tests and the demo binary.

pub mod command_handlers;
pub mod commands;
pub mod error;
pub mod model;
pub mod queries;
pub mod query_handlers;
pub mod repository;
pub mod wiring;

pub use command_handlers::{CreateWidgetHandler, RenameWidgetHandler};
pub use commands::{CreateWidget, DeleteWidget, RenameWidget};
pub use error::WidgetError;
pub use model::Widget;
pub use queries::{GetWidget, ListWidgets, WidgetPage};
pub use query_handlers::{GetWidgetHandler, ListWidgetsHandler};
pub use repository::WidgetRepository;
pub use wiring::{WIDGET_CACHE_TTL, register_widget_handlers};
