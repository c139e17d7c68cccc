//! Widget commands.

use operations::{Command, OperationMetadata, ValidationErrors};

use crate::model::Widget;

const MAX_NAME_LEN: usize = 64;

fn check_name(errors: &mut ValidationErrors, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add("name", format!("must be at most {MAX_NAME_LEN} characters"));
    }
}

/// Creates a widget.
#[derive(Debug, Clone)]
pub struct CreateWidget {
    pub name: String,
    pub color: Option<String>,
    metadata: OperationMetadata,
}

impl CreateWidget {
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            name: name.into(),
            color,
            metadata: OperationMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Command for CreateWidget {
    type Output = Widget;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        if let Some(color) = &self.color {
            errors.check(
                color.len() == 7 && color.starts_with('#'),
                "color",
                "must be a hex color like #aabbcc",
            );
        }
        errors
    }
}

/// Renames a widget, optionally guarded by the version the caller last saw.
#[derive(Debug, Clone)]
pub struct RenameWidget {
    pub id: String,
    pub name: String,
    pub expected_version: Option<u64>,
    metadata: OperationMetadata,
}

impl RenameWidget {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            expected_version: None,
            metadata: OperationMetadata::new(),
        }
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Command for RenameWidget {
    type Output = Widget;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check(!self.id.is_empty(), "id", "required");
        check_name(&mut errors, &self.name);
        errors
    }

    fn aggregate_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

/// Deletes a widget. No handler ships for it.
#[derive(Debug, Clone)]
pub struct DeleteWidget {
    pub id: String,
    metadata: OperationMetadata,
}

impl DeleteWidget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: OperationMetadata::new(),
        }
    }
}

impl Command for DeleteWidget {
    type Output = ();

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check(!self.id.is_empty(), "id", "required");
        errors
    }

    fn aggregate_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}
