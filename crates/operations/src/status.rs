//! Operation outcome status.

use serde::{Deserialize, Serialize};

/// Outcome of a dispatched command or query.
///
/// `Success` is the only status for which result data is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Failed,
    ValidationError,
    NotFound,
    Unauthorized,
    Conflict,
}

impl OperationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Success)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Failed => "failed",
            OperationStatus::ValidationError => "validation_error",
            OperationStatus::NotFound => "not_found",
            OperationStatus::Unauthorized => "unauthorized",
            OperationStatus::Conflict => "conflict",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_to_snake_case() {
        let json = serde_json::to_string(&OperationStatus::ValidationError).unwrap();
        assert_eq!(json, "\"validation_error\"");
    }

    #[test]
    fn test_only_success_is_success() {
        assert!(OperationStatus::Success.is_success());
        for status in [
            OperationStatus::Failed,
            OperationStatus::ValidationError,
            OperationStatus::NotFound,
            OperationStatus::Unauthorized,
            OperationStatus::Conflict,
        ] {
            assert!(!status.is_success());
        }
    }
}
