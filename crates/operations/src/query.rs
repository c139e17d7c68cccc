//! Query contract.

use std::time::Duration;

use crate::metadata::OperationMetadata;
use crate::validation::ValidationErrors;

/// An intent to read system state without side effects.
pub trait Query: Send + Sync + 'static {
    /// The data a successful execution returns.
    type Output: Send + Sync + 'static;

    /// Returns the metadata created with the query.
    fn metadata(&self) -> &OperationMetadata;

    /// Validates the query parameters. An empty map means valid.
    fn validate(&self) -> ValidationErrors;

    /// Returns the query name used in logs and error messages.
    fn name(&self) -> &'static str {
        common::short_type_name::<Self>()
    }

    /// Returns the cache key for this query, if it is cacheable.
    fn cache_key(&self) -> Option<String> {
        None
    }

    /// Returns how long a cached result for this query stays valid.
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }
}
