//! The widget entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    /// Bumped on every change, starting at 1.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Widget {
    /// Creates a widget with a generated id.
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self::with_id(format!("w-{}", Uuid::new_v4()), name, color)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, color: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            color,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
