//! Error predicates for retry and rollback decisions.

use std::fmt;
use std::sync::Arc;

use operations::CqrsError;

/// Decides whether an error should trigger a retry or a rollback.
#[derive(Clone)]
pub struct ErrorFilter {
    predicate: Arc<dyn Fn(&CqrsError) -> bool + Send + Sync>,
    description: String,
}

impl ErrorFilter {
    /// Matches every error.
    pub fn all() -> Self {
        Self {
            predicate: Arc::new(|_| true),
            description: "all".to_string(),
        }
    }

    /// Matches errors whose [`CqrsError::kind`] is one of `kinds`.
    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kinds: Vec<String> = kinds.into_iter().map(Into::into).collect();
        let description = kinds.join("|");
        Self {
            predicate: Arc::new(move |err| kinds.iter().any(|kind| kind == err.kind())),
            description,
        }
    }

    /// Matches errors accepted by `predicate`.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&CqrsError) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            description: "custom".to_string(),
        }
    }

    pub fn matches(&self, err: &CqrsError) -> bool {
        (self.predicate)(err)
    }
}

impl Default for ErrorFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for ErrorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorFilter").field(&self.description).finish()
    }
}
