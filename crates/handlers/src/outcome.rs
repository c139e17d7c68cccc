//! Per-dispatch state machine and failure classification.

use std::time::Duration;

use operations::{CqrsError, DetailMap, OperationKind, OperationStatus};
use serde_json::{Value, json};

/// States a single dispatch moves through.
///
/// `CacheChecked` and `CacheStored` only occur for queries. Any state may
/// move straight to one of the failure states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Received,
    Validated,
    Authorized,
    CacheChecked,
    Executing,
    CacheStored,
    Completed,
    Failed,
    ValidationError,
    Unauthorized,
    TimedOut,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Completed
                | DispatchState::Failed
                | DispatchState::ValidationError
                | DispatchState::Unauthorized
                | DispatchState::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Received => "RECEIVED",
            DispatchState::Validated => "VALIDATED",
            DispatchState::Authorized => "AUTHORIZED",
            DispatchState::CacheChecked => "CACHE_CHECKED",
            DispatchState::Executing => "EXECUTING",
            DispatchState::CacheStored => "CACHE_STORED",
            DispatchState::Completed => "COMPLETED",
            DispatchState::Failed => "FAILED",
            DispatchState::ValidationError => "VALIDATION_ERROR",
            DispatchState::Unauthorized => "UNAUTHORIZED",
            DispatchState::TimedOut => "TIMED_OUT",
        }
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failed dispatch is reported in its result envelope.
#[derive(Debug)]
pub(crate) struct Failure {
    pub status: OperationStatus,
    pub errors: DetailMap,
    pub state: DispatchState,
}

pub(crate) fn timeout_message(timeout: Duration) -> String {
    format!("Execution timed out after {}s", timeout.as_secs_f64())
}

/// Maps an error caught by the lifecycle to the status and error map the
/// caller sees. Raw error detail beyond kind and message is never exposed.
pub(crate) fn classify(kind: OperationKind, err: &CqrsError) -> Failure {
    match err {
        CqrsError::CommandValidation { errors, .. } | CqrsError::QueryValidation { errors, .. } => {
            Failure {
                status: OperationStatus::ValidationError,
                errors: errors.to_detail_map(),
                state: DispatchState::ValidationError,
            }
        }
        CqrsError::Authorization { .. } => Failure {
            status: OperationStatus::Unauthorized,
            errors: message_map(err.to_string()),
            state: DispatchState::Unauthorized,
        },
        CqrsError::HandlerTimeout { timeout, .. } => Failure {
            status: OperationStatus::Failed,
            errors: message_map(timeout_message(*timeout)),
            state: DispatchState::TimedOut,
        },
        _ => {
            let mut errors = message_map(format!("{} execution failed", kind.label()));
            errors.insert("error_type".into(), json!(err.kind()));
            errors.insert("error_details".into(), json!(err.to_string()));
            Failure {
                status: OperationStatus::Failed,
                errors,
                state: DispatchState::Failed,
            }
        }
    }
}

fn message_map(message: String) -> DetailMap {
    let mut map = DetailMap::new();
    map.insert("message".into(), Value::String(message));
    map
}

/// Emits the structured log line for a failed dispatch.
pub(crate) fn log_failure(
    kind: OperationKind,
    operation_name: &str,
    err: &CqrsError,
    failure: &Failure,
    elapsed_ms: f64,
) {
    let operation_id = err.operation_id().map(|id| id.to_string());
    match failure.state {
        DispatchState::ValidationError => {
            let validation_errors = Value::Object(failure.errors.clone());
            tracing::warn!(
                operation_id = operation_id.as_deref(),
                operation = operation_name,
                %validation_errors,
                "{} validation failed",
                kind.as_str()
            )
        }
        DispatchState::Unauthorized => tracing::warn!(
            operation_id = operation_id.as_deref(),
            operation = operation_name,
            error = %err,
            "{} authorization failed",
            kind.as_str()
        ),
        DispatchState::TimedOut => {
            metrics::counter!("cqrs_handler_timeouts_total", "operation" => operation_name.to_string())
                .increment(1);
            tracing::error!(
                operation_id = operation_id.as_deref(),
                operation = operation_name,
                error = %err,
                "{}.execution.timeout",
                kind.as_str()
            )
        }
        _ => tracing::error!(
            operation_id = operation_id.as_deref(),
            operation = operation_name,
            error_type = err.kind(),
            error = ?err,
            execution_time_ms = elapsed_ms,
            "{} execution failed",
            kind.as_str()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operations::ValidationErrors;

    #[test]
    fn test_terminal_states() {
        assert!(DispatchState::Completed.is_terminal());
        assert!(DispatchState::TimedOut.is_terminal());
        assert!(!DispatchState::Executing.is_terminal());
        assert!(!DispatchState::CacheChecked.is_terminal());
    }

    #[test]
    fn test_validation_errors_become_field_map() {
        let err = CqrsError::CommandValidation {
            command_name: "CreateWidget".into(),
            errors: ValidationErrors::new().with("name", "required"),
            operation_id: None,
        };
        let failure = classify(OperationKind::Command, &err);

        assert_eq!(failure.status, OperationStatus::ValidationError);
        assert_eq!(failure.errors["name"], json!("required"));
        assert_eq!(failure.errors.len(), 1);
    }

    #[test]
    fn test_timeout_message_states_seconds() {
        let err = CqrsError::HandlerTimeout {
            operation_name: "GetWidget".into(),
            timeout: Duration::from_millis(1500),
            operation_id: None,
        };
        let failure = classify(OperationKind::Query, &err);

        assert_eq!(failure.status, OperationStatus::Failed);
        assert_eq!(failure.state, DispatchState::TimedOut);
        assert_eq!(
            failure.errors["message"],
            json!("Execution timed out after 1.5s")
        );
    }

    #[test]
    fn test_business_errors_expose_kind_and_message_only() {
        let err = CqrsError::resource_not_found("Widget", "w1");
        let failure = classify(OperationKind::Query, &err);

        assert_eq!(failure.status, OperationStatus::Failed);
        assert_eq!(failure.errors["message"], json!("Query execution failed"));
        assert_eq!(failure.errors["error_type"], json!("ResourceNotFoundError"));
        assert_eq!(failure.errors["error_details"], json!("Widget not found: w1"));
        assert_eq!(failure.errors.len(), 3);
    }

    #[test]
    fn test_failures_are_logged_for_every_state() {
        let validation = CqrsError::QueryValidation {
            query_name: "ListWidgets".into(),
            errors: ValidationErrors::new().with("page", "must be at least 1"),
            operation_id: None,
        };
        let timeout = CqrsError::HandlerTimeout {
            operation_name: "ListWidgets".into(),
            timeout: Duration::from_secs(1),
            operation_id: None,
        };
        let other = CqrsError::other("IoError", "disk full");

        for err in [validation, timeout, other] {
            let failure = classify(OperationKind::Query, &err);
            log_failure(OperationKind::Query, "ListWidgets", &err, &failure, 1.0);
        }
    }

    #[test]
    fn test_authorization_becomes_unauthorized() {
        let err = CqrsError::Authorization {
            operation_name: "RenameWidget".into(),
            user_id: None,
            required_permissions: vec![],
            operation_id: None,
        };
        let failure = classify(OperationKind::Command, &err);

        assert_eq!(failure.status, OperationStatus::Unauthorized);
        assert_eq!(
            failure.errors["message"],
            json!("User not authorized to execute: RenameWidget")
        );
    }
}
