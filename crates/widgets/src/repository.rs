//! In-memory widget storage.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::WidgetError;
use crate::model::Widget;

/// Shared widget store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct WidgetRepository {
    widgets: Arc<RwLock<HashMap<String, Widget>>>,
}

impl WidgetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new widget. Names are unique.
    pub async fn insert(&self, widget: Widget) -> Result<Widget, WidgetError> {
        let mut widgets = self.widgets.write().await;
        if widgets.values().any(|existing| existing.name == widget.name) {
            return Err(WidgetError::NameTaken(widget.name));
        }
        widgets.insert(widget.id.clone(), widget.clone());
        Ok(widget)
    }

    pub async fn get(&self, id: &str) -> Result<Widget, WidgetError> {
        self.widgets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WidgetError::NotFound(id.to_string()))
    }

    /// Renames a widget, checking `expected_version` when given.
    pub async fn rename(
        &self,
        id: &str,
        name: String,
        expected_version: Option<u64>,
    ) -> Result<Widget, WidgetError> {
        let mut widgets = self.widgets.write().await;
        if widgets
            .values()
            .any(|existing| existing.name == name && existing.id != id)
        {
            return Err(WidgetError::NameTaken(name));
        }

        let widget = widgets
            .get_mut(id)
            .ok_or_else(|| WidgetError::NotFound(id.to_string()))?;
        if let Some(expected) = expected_version
            && expected != widget.version
        {
            return Err(WidgetError::VersionMismatch {
                id: id.to_string(),
                expected,
                actual: widget.version,
            });
        }
        widget.rename(name);
        Ok(widget.clone())
    }

    /// Returns one page of widgets ordered by creation time, plus the total count.
    pub async fn page(&self, page: u32, page_size: u32) -> (Vec<Widget>, u64) {
        let widgets = self.widgets.read().await;
        let mut all: Vec<&Widget> = widgets.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let skip = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        let items = all
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect();
        (items, widgets.len() as u64)
    }

    pub async fn len(&self) -> usize {
        self.widgets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.widgets.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_names_are_unique() {
        let repo = WidgetRepository::new();
        repo.insert(Widget::new("gear", None)).await.unwrap();

        let err = repo.insert(Widget::new("gear", None)).await.unwrap_err();

        assert!(matches!(err, WidgetError::NameTaken(name) if name == "gear"));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_rename_checks_expected_version() {
        let repo = WidgetRepository::new();
        repo.insert(Widget::with_id("w1", "gear", None)).await.unwrap();

        let renamed = repo.rename("w1", "cog".into(), Some(1)).await.unwrap();
        assert_eq!((renamed.name.as_str(), renamed.version), ("cog", 2));

        let err = repo.rename("w1", "sprocket".into(), Some(1)).await.unwrap_err();
        assert!(matches!(
            err,
            WidgetError::VersionMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_pages_are_one_based() {
        let repo = WidgetRepository::new();
        for id in ["a", "b", "c"] {
            repo.insert(Widget::with_id(id, id, None)).await.unwrap();
        }

        let (first, total) = repo.page(1, 2).await;
        let (second, _) = repo.page(2, 2).await;

        assert_eq!(total, 3);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(repo.page(3, 2).await.0.is_empty());
    }
}
