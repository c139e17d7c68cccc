//! Metadata attached to every command and query.

use chrono::{DateTime, Utc};
use common::OperationId;
use serde::{Deserialize, Serialize};

/// Identity and tracing information for one operation.
///
/// Created once when the operation is constructed and never mutated; the
/// handler lifecycle copies it into the result envelope so callers can
/// correlate results with requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetadata {
    operation_id: OperationId,
    timestamp: DateTime<Utc>,
    user_id: Option<String>,
    correlation_id: Option<String>,
    source: Option<String>,
    version: Option<String>,
}

impl OperationMetadata {
    /// Creates metadata with a fresh id and the current time.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates metadata for an operation issued by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::builder().user_id(user_id).build()
    }

    /// Creates a new metadata builder.
    pub fn builder() -> OperationMetadataBuilder {
        OperationMetadataBuilder::default()
    }

    pub fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl Default for OperationMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`OperationMetadata`].
#[derive(Debug, Default)]
pub struct OperationMetadataBuilder {
    operation_id: Option<OperationId>,
    timestamp: Option<DateTime<Utc>>,
    user_id: Option<String>,
    correlation_id: Option<String>,
    source: Option<String>,
    version: Option<String>,
}

impl OperationMetadataBuilder {
    /// Sets the operation ID. If not set, a new ID will be generated.
    pub fn operation_id(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the id of the user issuing the operation.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the correlation id used to trace the operation across hops.
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sets the name of the component that issued the operation.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the contract version of the operation.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn build(self) -> OperationMetadata {
        OperationMetadata {
            operation_id: self.operation_id.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            user_id: self.user_id,
            correlation_id: self.correlation_id,
            source: self.source,
            version: self.version,
        }
    }
}
