//! Command/query discriminator.

use serde::{Deserialize, Serialize};

/// Which side of the bus an operation or handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Command,
    Query,
}

impl OperationKind {
    /// Lowercase name, used in tracing attributes and error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Command => "command",
            OperationKind::Query => "query",
        }
    }

    /// Capitalized name, used in human-readable messages.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Command => "Command",
            OperationKind::Query => "Query",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
