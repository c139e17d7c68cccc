//! Widget queries.

use std::time::Duration;

use operations::{OperationMetadata, Query, ValidationErrors};
use serde::{Deserialize, Serialize};

use crate::model::Widget;

/// Fetches one widget by id.
#[derive(Debug, Clone, Serialize)]
pub struct GetWidget {
    pub id: String,
    #[serde(skip)]
    metadata: OperationMetadata,
}

impl GetWidget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: OperationMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Query for GetWidget {
    type Output = Widget;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check(!self.id.is_empty(), "id", "required");
        errors
    }

    fn cache_ttl(&self) -> Option<Duration> {
        Some(Duration::from_secs(300))
    }
}

/// Lists widgets one page at a time.
#[derive(Debug, Clone, Serialize)]
pub struct ListWidgets {
    /// One-based.
    pub page: u32,
    pub page_size: u32,
    #[serde(skip)]
    metadata: OperationMetadata,
}

impl ListWidgets {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            metadata: OperationMetadata::new(),
        }
    }
}

impl Query for ListWidgets {
    type Output = WidgetPage;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check(self.page >= 1, "page", "must be at least 1");
        errors.check(
            (1..=Self::MAX_PAGE_SIZE).contains(&self.page_size),
            "page_size",
            format!("must be between 1 and {}", Self::MAX_PAGE_SIZE),
        );
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPage {
    pub items: Vec<Widget>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds_are_validated() {
        let errors = ListWidgets::new(0, 500).validate();
        assert_eq!(errors.get("page"), Some("must be at least 1"));
        assert_eq!(errors.get("page_size"), Some("must be between 1 and 100"));
        assert!(ListWidgets::new(1, 20).validate().is_empty());
    }
}
