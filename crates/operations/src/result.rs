//! Result envelopes returned from every dispatch.

use std::any::Any;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DetailMap;
use crate::metadata::OperationMetadata;
use crate::status::OperationStatus;
use crate::validation::ValidationErrors;

fn message_map(message: impl Into<String>) -> DetailMap {
    let mut errors = DetailMap::new();
    errors.insert("message".into(), Value::String(message.into()));
    errors
}

fn failure_status(status: OperationStatus) -> OperationStatus {
    // A failure can never carry the success status.
    if status.is_success() {
        OperationStatus::Failed
    } else {
        status
    }
}

/// Type-erased view of a result envelope.
///
/// Middleware sees results through this trait because the bus chain is
/// shared by every operation type; the bus downcasts back to the concrete
/// envelope once the chain completes.
pub trait OperationResult: Any + Send {
    fn status(&self) -> OperationStatus;

    fn errors(&self) -> &DetailMap;

    fn metadata(&self) -> &OperationMetadata;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Result of a command execution.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult<T> {
    status: OperationStatus,
    data: Option<T>,
    errors: DetailMap,
    metadata: OperationMetadata,
    affected_entities: Option<DetailMap>,
}

impl<T> CommandResult<T> {
    /// Creates a successful command result.
    pub fn success(data: T, metadata: OperationMetadata) -> Self {
        Self {
            status: OperationStatus::Success,
            data: Some(data),
            errors: DetailMap::new(),
            metadata,
            affected_entities: None,
        }
    }

    /// Creates a failed command result. A `Success` status is coerced to `Failed`.
    pub fn failure(status: OperationStatus, errors: DetailMap, metadata: OperationMetadata) -> Self {
        Self {
            status: failure_status(status),
            data: None,
            errors,
            metadata,
            affected_entities: None,
        }
    }

    /// Creates a validation error result carrying the field errors.
    pub fn validation_error(errors: &ValidationErrors, metadata: OperationMetadata) -> Self {
        Self::failure(
            OperationStatus::ValidationError,
            errors.to_detail_map(),
            metadata,
        )
    }

    /// Creates a not-found result.
    pub fn not_found(message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self::failure(OperationStatus::NotFound, message_map(message), metadata)
    }

    /// Creates an unauthorized result.
    pub fn unauthorized(message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self::failure(OperationStatus::Unauthorized, message_map(message), metadata)
    }

    /// Creates a conflict result.
    pub fn conflict(message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self::failure(OperationStatus::Conflict, message_map(message), metadata)
    }

    /// Attaches the entities the command created, updated or deleted.
    pub fn with_affected_entities(mut self, affected_entities: Option<DetailMap>) -> Self {
        self.affected_entities = affected_entities;
        self
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failure(&self) -> bool {
        !self.status.is_success()
    }

    /// Returns the payload. Always `None` unless the status is `Success`.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn errors(&self) -> &DetailMap {
        &self.errors
    }

    /// Returns the `message` entry of the error map, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.errors.get("message").and_then(Value::as_str)
    }

    pub fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    pub fn affected_entities(&self) -> Option<&DetailMap> {
        self.affected_entities.as_ref()
    }
}

impl<T: Send + 'static> OperationResult for CommandResult<T> {
    fn status(&self) -> OperationStatus {
        self.status
    }

    fn errors(&self) -> &DetailMap {
        &self.errors
    }

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Pagination details for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// One-based page number.
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_items: u64) -> Self {
        Self {
            page,
            page_size,
            total_items,
        }
    }

    /// Returns the number of pages needed for all items.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.page_size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Whether a query result was served from cache, and under which key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub hit: bool,
    pub key: Option<String>,
}

impl CacheInfo {
    pub fn hit(key: Option<String>) -> Self {
        Self { hit: true, key }
    }

    pub fn miss(key: Option<String>) -> Self {
        Self { hit: false, key }
    }
}

/// Result of a query execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult<T> {
    status: OperationStatus,
    data: Option<T>,
    errors: DetailMap,
    metadata: OperationMetadata,
    pagination: Option<Pagination>,
    cache_info: Option<CacheInfo>,
}

impl<T> QueryResult<T> {
    /// Creates a successful query result.
    pub fn success(data: T, metadata: OperationMetadata) -> Self {
        Self {
            status: OperationStatus::Success,
            data: Some(data),
            errors: DetailMap::new(),
            metadata,
            pagination: None,
            cache_info: None,
        }
    }

    /// Creates a failed query result. A `Success` status is coerced to `Failed`.
    pub fn failure(status: OperationStatus, errors: DetailMap, metadata: OperationMetadata) -> Self {
        Self {
            status: failure_status(status),
            data: None,
            errors,
            metadata,
            pagination: None,
            cache_info: None,
        }
    }

    /// Creates a validation error result carrying the field errors.
    pub fn validation_error(errors: &ValidationErrors, metadata: OperationMetadata) -> Self {
        Self::failure(
            OperationStatus::ValidationError,
            errors.to_detail_map(),
            metadata,
        )
    }

    /// Creates a not-found result.
    pub fn not_found(message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self::failure(OperationStatus::NotFound, message_map(message), metadata)
    }

    /// Creates an unauthorized result.
    pub fn unauthorized(message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self::failure(OperationStatus::Unauthorized, message_map(message), metadata)
    }

    /// Creates a conflict result.
    pub fn conflict(message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self::failure(OperationStatus::Conflict, message_map(message), metadata)
    }

    pub fn with_pagination(mut self, pagination: Option<Pagination>) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_cache_info(mut self, cache_info: CacheInfo) -> Self {
        self.cache_info = Some(cache_info);
        self
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failure(&self) -> bool {
        !self.status.is_success()
    }

    /// Returns the payload. Always `None` unless the status is `Success`.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn errors(&self) -> &DetailMap {
        &self.errors
    }

    /// Returns the `message` entry of the error map, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.errors.get("message").and_then(Value::as_str)
    }

    pub fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn cache_info(&self) -> Option<&CacheInfo> {
        self.cache_info.as_ref()
    }
}

impl<T: Send + 'static> OperationResult for QueryResult<T> {
    fn status(&self) -> OperationStatus {
        self.status
    }

    fn errors(&self) -> &DetailMap {
        &self.errors
    }

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
