//! Error taxonomy shared by every layer of the dispatch runtime.

use std::time::Duration;

use common::{OperationId, short_type_name};
use serde_json::{Value, json};
use thiserror::Error;

use crate::kind::OperationKind;
use crate::validation::ValidationErrors;

/// Structured detail attached to errors and results.
pub type DetailMap = serde_json::Map<String, Value>;

/// Errors raised while registering, dispatching or handling operations.
///
/// Configuration errors (`CommandHandlerNotFound`, `QueryHandlerNotFound`,
/// `DuplicateHandler`, `BusNotInitialized`) are returned to the caller as
/// `Err`. Everything else is caught by the handler lifecycle and turned into
/// a result envelope.
#[derive(Debug, Error)]
pub enum CqrsError {
    /// No handler is registered for the dispatched command type.
    #[error("No handler found for command: {command_type}")]
    CommandHandlerNotFound {
        command_type: String,
        operation_id: Option<OperationId>,
    },

    /// No handler is registered for the dispatched query type.
    #[error("No handler found for query: {query_type}")]
    QueryHandlerNotFound {
        query_type: String,
        operation_id: Option<OperationId>,
    },

    /// The command failed its validation rules.
    #[error("Command validation failed: {command_name}")]
    CommandValidation {
        command_name: String,
        errors: ValidationErrors,
        operation_id: Option<OperationId>,
    },

    /// The query failed its validation rules.
    #[error("Query validation failed: {query_name}")]
    QueryValidation {
        query_name: String,
        errors: ValidationErrors,
        operation_id: Option<OperationId>,
    },

    /// Command execution failed for a reason the handler described.
    #[error("Command execution failed: {command_name} - {reason}")]
    CommandExecution {
        command_name: String,
        reason: String,
        operation_id: Option<OperationId>,
    },

    /// Query execution failed for a reason the handler described.
    #[error("Query execution failed: {query_name} - {reason}")]
    QueryExecution {
        query_name: String,
        reason: String,
        operation_id: Option<OperationId>,
    },

    /// A second handler was registered for an operation type.
    #[error(
        "Duplicate {kind} handler registration for {operation_type}. Existing: {existing_handler}, New: {new_handler}"
    )]
    DuplicateHandler {
        kind: OperationKind,
        operation_type: String,
        existing_handler: String,
        new_handler: String,
    },

    /// The bus was shut down (or never initialized).
    #[error("{} bus is not initialized", .kind.label())]
    BusNotInitialized { kind: OperationKind },

    /// The handler did not finish within its deadline.
    #[error("Handler execution timed out after {}s: {operation_name}", .timeout.as_secs_f64())]
    HandlerTimeout {
        operation_name: String,
        timeout: Duration,
        operation_id: Option<OperationId>,
    },

    /// An optimistic concurrency check failed.
    #[error(
        "Concurrency conflict detected for resource: {resource_id}{}",
        version_suffix(.expected_version.as_deref(), .actual_version.as_deref())
    )]
    Concurrency {
        resource_id: String,
        expected_version: Option<String>,
        actual_version: Option<String>,
        operation_id: Option<OperationId>,
    },

    /// The caller is not allowed to run the operation.
    #[error("User not authorized to execute: {operation_name}")]
    Authorization {
        operation_name: String,
        user_id: Option<String>,
        required_permissions: Vec<String>,
        operation_id: Option<OperationId>,
    },

    /// A resource the handler needed does not exist.
    #[error("{resource_type} not found: {resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
        operation_id: Option<OperationId>,
    },

    /// A business invariant rejected the operation.
    #[error("Business rule violation: {rule_name} - {message}")]
    BusinessRuleViolation {
        rule_name: String,
        message: String,
        context: DetailMap,
        operation_id: Option<OperationId>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other failure, captured with the name of its source type.
    #[error("{message}")]
    Unexpected { kind: String, message: String },
}

fn version_suffix(expected: Option<&str>, actual: Option<&str>) -> String {
    match (expected, actual) {
        (Some(expected), Some(actual)) => {
            format!(" (expected version: {expected}, actual: {actual})")
        }
        _ => String::new(),
    }
}

impl CqrsError {
    /// Wraps a foreign error, keeping its type name as the error kind.
    pub fn unexpected<E: std::error::Error>(err: E) -> Self {
        Self::Unexpected {
            kind: short_type_name::<E>().to_string(),
            message: err.to_string(),
        }
    }

    /// Builds an `Unexpected` error from a kind name and message.
    pub fn other(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unexpected {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a `ResourceNotFound` error.
    pub fn resource_not_found(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self::ResourceNotFound {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            operation_id: None,
        }
    }

    /// Creates a `BusinessRuleViolation` error with an empty context.
    pub fn business_rule(rule_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation {
            rule_name: rule_name.into(),
            message: message.into(),
            context: DetailMap::new(),
            operation_id: None,
        }
    }

    /// Creates a `Concurrency` error, optionally with the conflicting versions.
    pub fn concurrency(
        resource_id: impl Into<String>,
        expected_version: Option<String>,
        actual_version: Option<String>,
    ) -> Self {
        Self::Concurrency {
            resource_id: resource_id.into(),
            expected_version,
            actual_version,
            operation_id: None,
        }
    }

    /// Returns the stable kind name used in result envelopes and logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::CommandHandlerNotFound { .. } => "CommandHandlerNotFoundError",
            Self::QueryHandlerNotFound { .. } => "QueryHandlerNotFoundError",
            Self::CommandValidation { .. } => "CommandValidationError",
            Self::QueryValidation { .. } => "QueryValidationError",
            Self::CommandExecution { .. } => "CommandExecutionError",
            Self::QueryExecution { .. } => "QueryExecutionError",
            Self::DuplicateHandler { .. } => "DuplicateHandlerError",
            Self::BusNotInitialized { .. } => "BusNotInitializedError",
            Self::HandlerTimeout { .. } => "HandlerTimeoutError",
            Self::Concurrency { .. } => "ConcurrencyError",
            Self::Authorization { .. } => "AuthorizationError",
            Self::ResourceNotFound { .. } => "ResourceNotFoundError",
            Self::BusinessRuleViolation { .. } => "BusinessRuleViolationError",
            Self::Serialization(_) => "SerializationError",
            Self::Unexpected { kind, .. } => kind.as_str(),
        }
    }

    /// Returns the id of the operation the error belongs to, when known.
    pub fn operation_id(&self) -> Option<OperationId> {
        match self {
            Self::CommandHandlerNotFound { operation_id, .. }
            | Self::QueryHandlerNotFound { operation_id, .. }
            | Self::CommandValidation { operation_id, .. }
            | Self::QueryValidation { operation_id, .. }
            | Self::CommandExecution { operation_id, .. }
            | Self::QueryExecution { operation_id, .. }
            | Self::HandlerTimeout { operation_id, .. }
            | Self::Concurrency { operation_id, .. }
            | Self::Authorization { operation_id, .. }
            | Self::ResourceNotFound { operation_id, .. }
            | Self::BusinessRuleViolation { operation_id, .. } => *operation_id,
            Self::DuplicateHandler { .. }
            | Self::BusNotInitialized { .. }
            | Self::Serialization(_)
            | Self::Unexpected { .. } => None,
        }
    }

    /// Attaches an operation id if the variant carries one and it is unset.
    pub fn with_operation_id(mut self, id: OperationId) -> Self {
        match &mut self {
            Self::CommandHandlerNotFound { operation_id, .. }
            | Self::QueryHandlerNotFound { operation_id, .. }
            | Self::CommandValidation { operation_id, .. }
            | Self::QueryValidation { operation_id, .. }
            | Self::CommandExecution { operation_id, .. }
            | Self::QueryExecution { operation_id, .. }
            | Self::HandlerTimeout { operation_id, .. }
            | Self::Concurrency { operation_id, .. }
            | Self::Authorization { operation_id, .. }
            | Self::ResourceNotFound { operation_id, .. }
            | Self::BusinessRuleViolation { operation_id, .. } => {
                operation_id.get_or_insert(id);
            }
            Self::DuplicateHandler { .. }
            | Self::BusNotInitialized { .. }
            | Self::Serialization(_)
            | Self::Unexpected { .. } => {}
        }
        self
    }

    /// Returns the structured detail for this error.
    pub fn details(&self) -> DetailMap {
        let value = match self {
            Self::CommandHandlerNotFound { command_type, .. } => {
                json!({ "command_type": command_type })
            }
            Self::QueryHandlerNotFound { query_type, .. } => json!({ "query_type": query_type }),
            Self::CommandValidation {
                command_name,
                errors,
                ..
            } => json!({ "validation_errors": errors, "command_name": command_name }),
            Self::QueryValidation {
                query_name, errors, ..
            } => json!({ "validation_errors": errors, "query_name": query_name }),
            Self::CommandExecution {
                command_name,
                reason,
                ..
            } => json!({ "command_name": command_name, "execution_error": reason }),
            Self::QueryExecution {
                query_name, reason, ..
            } => json!({ "query_name": query_name, "execution_error": reason }),
            Self::DuplicateHandler {
                kind,
                operation_type,
                existing_handler,
                new_handler,
            } => json!({
                "handler_type": kind.as_str(),
                "operation_type": operation_type,
                "existing_handler": existing_handler,
                "new_handler": new_handler,
            }),
            Self::BusNotInitialized { kind } => json!({ "bus_type": kind.label() }),
            Self::HandlerTimeout {
                operation_name,
                timeout,
                ..
            } => json!({
                "operation_name": operation_name,
                "timeout_seconds": timeout.as_secs_f64(),
            }),
            Self::Concurrency {
                resource_id,
                expected_version,
                actual_version,
                ..
            } => {
                let mut details = json!({ "resource_id": resource_id });
                if let (Some(expected), Some(actual)) = (expected_version, actual_version) {
                    details["expected_version"] = json!(expected);
                    details["actual_version"] = json!(actual);
                }
                details
            }
            Self::Authorization {
                operation_name,
                user_id,
                required_permissions,
                ..
            } => json!({
                "operation_name": operation_name,
                "user_id": user_id,
                "required_permissions": required_permissions,
            }),
            Self::ResourceNotFound {
                resource_type,
                resource_id,
                ..
            } => json!({ "resource_type": resource_type, "resource_id": resource_id }),
            Self::BusinessRuleViolation {
                rule_name,
                message,
                context,
                ..
            } => json!({
                "rule_name": rule_name,
                "violation_message": message,
                "context": context,
            }),
            Self::Serialization(err) => json!({ "error": err.to_string() }),
            Self::Unexpected { kind, .. } => json!({ "source_type": kind }),
        };

        match value {
            Value::Object(map) => map,
            _ => DetailMap::new(),
        }
    }

    /// Serializes the error into a flat map for logging or transport.
    pub fn to_map(&self) -> DetailMap {
        let mut map = DetailMap::new();
        map.insert("error_type".into(), json!(self.kind()));
        map.insert("message".into(), json!(self.to_string()));
        map.insert("details".into(), Value::Object(self.details()));
        map.insert(
            "operation_id".into(),
            json!(self.operation_id().map(|id| id.to_string())),
        );
        map
    }
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, CqrsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_states_duration() {
        let err = CqrsError::HandlerTimeout {
            operation_name: "SlowCommand".into(),
            timeout: Duration::from_secs(1),
            operation_id: None,
        };
        assert_eq!(
            err.to_string(),
            "Handler execution timed out after 1s: SlowCommand"
        );
        assert_eq!(err.details()["timeout_seconds"], json!(1.0));
    }

    #[test]
    fn test_duplicate_handler_names_both_handlers() {
        let err = CqrsError::DuplicateHandler {
            kind: OperationKind::Command,
            operation_type: "CreateWidget".into(),
            existing_handler: "FirstHandler".into(),
            new_handler: "SecondHandler".into(),
        };
        let message = err.to_string();
        assert!(message.contains("Existing: FirstHandler"));
        assert!(message.contains("New: SecondHandler"));
        assert_eq!(err.details()["handler_type"], json!("command"));
    }

    #[test]
    fn test_bus_not_initialized_message() {
        let err = CqrsError::BusNotInitialized {
            kind: OperationKind::Query,
        };
        assert_eq!(err.to_string(), "Query bus is not initialized");
        assert_eq!(err.kind(), "BusNotInitializedError");
    }

    #[test]
    fn test_concurrency_message_includes_versions_when_both_known() {
        let err = CqrsError::concurrency("widget-1", Some("3".into()), Some("4".into()));
        assert_eq!(
            err.to_string(),
            "Concurrency conflict detected for resource: widget-1 (expected version: 3, actual: 4)"
        );

        let err = CqrsError::concurrency("widget-1", Some("3".into()), None);
        assert_eq!(
            err.to_string(),
            "Concurrency conflict detected for resource: widget-1"
        );
        assert!(!err.details().contains_key("expected_version"));
    }

    #[test]
    fn test_with_operation_id_fills_only_empty_slots() {
        let first = OperationId::new();
        let second = OperationId::new();

        let err = CqrsError::resource_not_found("Widget", "w1").with_operation_id(first);
        assert_eq!(err.operation_id(), Some(first));

        let err = err.with_operation_id(second);
        assert_eq!(err.operation_id(), Some(first));

        let err = CqrsError::other("IoError", "disk full").with_operation_id(first);
        assert_eq!(err.operation_id(), None);
    }

    #[test]
    fn test_unexpected_keeps_source_type_name() {
        #[derive(Debug, thiserror::Error)]
        #[error("socket closed")]
        struct SocketClosed;

        let err = CqrsError::unexpected(SocketClosed);
        assert_eq!(err.kind(), "SocketClosed");
        assert_eq!(err.to_string(), "socket closed");
    }

    #[test]
    fn test_to_map_contains_kind_message_and_details() {
        let id = OperationId::new();
        let err = CqrsError::business_rule("stock", "not enough widgets").with_operation_id(id);
        let map = err.to_map();

        assert_eq!(map["error_type"], json!("BusinessRuleViolationError"));
        assert_eq!(
            map["message"],
            json!("Business rule violation: stock - not enough widgets")
        );
        assert_eq!(map["details"]["rule_name"], json!("stock"));
        assert_eq!(map["operation_id"], json!(id.to_string()));
    }
}
