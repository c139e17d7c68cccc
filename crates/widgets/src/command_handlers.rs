//! Handlers for widget commands.

use async_trait::async_trait;
use handlers::CommandHandler;
use operations::{CqrsError, DetailMap};
use serde_json::json;

use crate::commands::{CreateWidget, RenameWidget};
use crate::model::Widget;
use crate::repository::WidgetRepository;

fn touched(widget: &Widget) -> Option<DetailMap> {
    let mut entities = DetailMap::new();
    entities.insert("widgets".into(), json!([widget.id]));
    Some(entities)
}

pub struct CreateWidgetHandler {
    repo: WidgetRepository,
}

impl CreateWidgetHandler {
    pub fn new(repo: WidgetRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CommandHandler<CreateWidget> for CreateWidgetHandler {
    async fn handle(&self, command: &CreateWidget) -> Result<Widget, CqrsError> {
        let widget = Widget::new(command.name.trim(), command.color.clone());
        let widget = self.repo.insert(widget).await?;
        tracing::info!(widget_id = %widget.id, name = %widget.name, "widget created");
        Ok(widget)
    }

    async fn affected_entities(&self, _command: &CreateWidget, widget: &Widget) -> Option<DetailMap> {
        touched(widget)
    }
}

pub struct RenameWidgetHandler {
    repo: WidgetRepository,
}

impl RenameWidgetHandler {
    pub fn new(repo: WidgetRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CommandHandler<RenameWidget> for RenameWidgetHandler {
    async fn handle(&self, command: &RenameWidget) -> Result<Widget, CqrsError> {
        let widget = self
            .repo
            .rename(
                &command.id,
                command.name.trim().to_string(),
                command.expected_version,
            )
            .await?;
        tracing::info!(widget_id = %widget.id, version = widget.version, "widget renamed");
        Ok(widget)
    }

    async fn affected_entities(&self, _command: &RenameWidget, widget: &Widget) -> Option<DetailMap> {
        touched(widget)
    }
}
