//! Widget domain errors.

use operations::CqrsError;
use thiserror::Error;

/// Errors raised by the widget repository.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// No widget with the given id.
    #[error("Widget not found: {0}")]
    NotFound(String),

    /// Another widget already uses the name.
    #[error("Widget name already taken: {0}")]
    NameTaken(String),

    /// The widget changed since the caller read it.
    #[error("Widget {id} is at version {actual}, expected {expected}")]
    VersionMismatch { id: String, expected: u64, actual: u64 },
}

impl From<WidgetError> for CqrsError {
    fn from(err: WidgetError) -> Self {
        match err {
            WidgetError::NotFound(id) => CqrsError::resource_not_found("Widget", id),
            WidgetError::NameTaken(name) => {
                CqrsError::business_rule("unique_widget_name", format!("name '{name}' is taken"))
            }
            WidgetError::VersionMismatch {
                id,
                expected,
                actual,
            } => CqrsError::concurrency(id, Some(expected.to_string()), Some(actual.to_string())),
        }
    }
}
