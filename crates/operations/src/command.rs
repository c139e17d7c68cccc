//! Command contract.

use crate::metadata::OperationMetadata;
use crate::validation::ValidationErrors;

/// An intent to change system state.
///
/// Commands are constructed by a caller right before dispatch, never mutated
/// afterwards, and dropped once the bus has returned a result. They are
/// routed by their concrete type, so each command type has exactly one
/// handler.
pub trait Command: Send + Sync + 'static {
    /// The payload a successful execution produces.
    type Output: Send + Sync + 'static;

    /// Returns the metadata created with the command.
    fn metadata(&self) -> &OperationMetadata;

    /// Validates the command's fields. An empty map means valid.
    fn validate(&self) -> ValidationErrors;

    /// Returns the command name used in logs and error messages.
    fn name(&self) -> &'static str {
        common::short_type_name::<Self>()
    }

    /// Returns the id of the aggregate this command targets, if any.
    fn aggregate_id(&self) -> Option<String> {
        None
    }
}
