//! Handlers for widget queries.

use async_trait::async_trait;
use handlers::QueryHandler;
use operations::{CqrsError, Pagination};

use crate::model::Widget;
use crate::queries::{GetWidget, ListWidgets, WidgetPage};
use crate::repository::WidgetRepository;

pub struct GetWidgetHandler {
    repo: WidgetRepository,
}

impl GetWidgetHandler {
    pub fn new(repo: WidgetRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl QueryHandler<GetWidget> for GetWidgetHandler {
    async fn handle(&self, query: &GetWidget) -> Result<Widget, CqrsError> {
        Ok(self.repo.get(&query.id).await?)
    }
}

pub struct ListWidgetsHandler {
    repo: WidgetRepository,
}

impl ListWidgetsHandler {
    pub fn new(repo: WidgetRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl QueryHandler<ListWidgets> for ListWidgetsHandler {
    async fn handle(&self, query: &ListWidgets) -> Result<WidgetPage, CqrsError> {
        let (items, total) = self.repo.page(query.page, query.page_size).await;
        Ok(WidgetPage { items, total })
    }

    async fn pagination(&self, query: &ListWidgets, page: &WidgetPage) -> Option<Pagination> {
        Some(Pagination::new(query.page, query.page_size, page.total))
    }

    fn cache_enabled(&self) -> bool {
        false
    }
}
