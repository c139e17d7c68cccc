//! End-to-end scenarios: widgets dispatched through a fully wired bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bus::{CqrsBus, LoggingMiddleware, MetricsMiddleware};
use decorators::{CachedQuery, InMemoryCacheStore, RetryOnFailure, command_handler, query_handler};
use handlers::{CommandHandler, QueryHandler};
use operations::{CqrsError, OperationMetadata, OperationStatus};
use serde_json::json;
use widgets::{
    CreateWidget, CreateWidgetHandler, DeleteWidget, GetWidget, GetWidgetHandler, ListWidgets,
    RenameWidget, Widget, WidgetRepository, register_widget_handlers,
};

async fn wired() -> (CqrsBus, WidgetRepository) {
    let bus = CqrsBus::default();
    bus.add_command_middleware(Arc::new(LoggingMiddleware::new()));
    bus.add_query_middleware(Arc::new(MetricsMiddleware::new()));
    let repo = WidgetRepository::new();
    repo.insert(Widget::with_id("w1", "gear", None)).await.unwrap();
    register_widget_handlers(&bus, repo.clone(), InMemoryCacheStore::new()).unwrap();
    (bus, repo)
}

/// Counts `handle` calls on the way through.
struct Counting<H> {
    inner: H,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl QueryHandler<GetWidget> for Counting<GetWidgetHandler> {
    async fn handle(&self, query: &GetWidget) -> Result<Widget, CqrsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.handle(query).await
    }
}

/// Takes two seconds to create anything.
struct SlowCreate;

#[async_trait]
impl CommandHandler<CreateWidget> for SlowCreate {
    async fn handle(&self, command: &CreateWidget) -> Result<Widget, CqrsError> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(Widget::new(command.name.clone(), None))
    }
}

/// Fails twice, then creates the widget.
struct Unsteady {
    calls: Arc<AtomicUsize>,
    inner: CreateWidgetHandler,
}

#[async_trait]
impl CommandHandler<CreateWidget> for Unsteady {
    async fn handle(&self, command: &CreateWidget) -> Result<Widget, CqrsError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call < 3 {
            return Err(CqrsError::other("ConnectionError", format!("attempt {call} failed")));
        }
        self.inner.handle(command).await
    }
}

#[tokio::test]
async fn test_missing_name_is_a_validation_error() {
    let (bus, repo) = wired().await;

    let result = bus.execute_command(CreateWidget::new("", None)).await.unwrap();

    assert_eq!(result.status(), OperationStatus::ValidationError);
    assert_eq!(json!(result.errors()), json!({"name": "required"}));
    assert!(result.data().is_none());
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_repeated_get_is_served_from_cache() {
    let bus = CqrsBus::default();
    let repo = WidgetRepository::new();
    repo.insert(Widget::with_id("w1", "gear", None)).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = CachedQuery::new(Counting {
        inner: GetWidgetHandler::new(repo),
        calls: Arc::clone(&calls),
    })
    .ttl(Duration::from_secs(300))
    .vary_by(["id"]);
    query_handler::<GetWidget, _>(handler).install(&bus);

    let first = bus.execute_query(GetWidget::new("w1")).await.unwrap();
    let second = bus.execute_query(GetWidget::new("w1")).await.unwrap();

    assert!(!first.cache_info().unwrap().hit);
    assert!(second.cache_info().unwrap().hit);
    assert_eq!(first.data(), second.data());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_handler_times_out() {
    let bus = CqrsBus::default();
    command_handler::<CreateWidget, _>(SlowCreate)
        .timeout(Duration::from_secs(1))
        .install(&bus);

    let result = bus
        .execute_command(CreateWidget::new("gear", None))
        .await
        .unwrap();

    assert_eq!(result.status(), OperationStatus::Failed);
    assert!(
        result
            .error_message()
            .is_some_and(|message| message.contains("timed out after 1"))
    );
}

#[tokio::test]
async fn test_unregistered_command_is_an_error() {
    let (bus, _) = wired().await;

    let err = bus.execute_command(DeleteWidget::new("w1")).await.unwrap_err();

    assert!(matches!(err, CqrsError::CommandHandlerNotFound { .. }));
    assert!(err.to_string().contains("DeleteWidget"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_on_third_attempt() {
    let bus = CqrsBus::default();
    let repo = WidgetRepository::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = RetryOnFailure::new(Unsteady {
        calls: Arc::clone(&calls),
        inner: CreateWidgetHandler::new(repo.clone()),
    });
    command_handler::<CreateWidget, _>(handler).install(&bus);

    let result = bus
        .execute_command(CreateWidget::new("gear", None))
        .await
        .unwrap();

    assert_eq!(result.status(), OperationStatus::Success);
    assert_eq!(result.data().map(|widget| widget.name.as_str()), Some("gear"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(repo.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_builder_timeout_bounds_each_retry_attempt() {
    let bus = CqrsBus::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = RetryOnFailure::new(Unsteady {
        calls: Arc::clone(&calls),
        inner: CreateWidgetHandler::new(WidgetRepository::new()),
    });
    // Backoff sleeps of 1s and 2s add up to more than the timeout.
    command_handler::<CreateWidget, _>(handler)
        .timeout(Duration::from_secs(2))
        .install(&bus);

    let result = bus
        .execute_command(CreateWidget::new("gear", None))
        .await
        .unwrap();

    assert_eq!(result.status(), OperationStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rename_requires_a_user() {
    let (bus, _) = wired().await;

    let anonymous = bus
        .execute_command(RenameWidget::new("w1", "cog"))
        .await
        .unwrap();
    let signed_in = bus
        .execute_command(
            RenameWidget::new("w1", "cog").with_metadata(OperationMetadata::for_user("alice")),
        )
        .await
        .unwrap();

    assert_eq!(anonymous.status(), OperationStatus::Unauthorized);
    assert_eq!(signed_in.status(), OperationStatus::Success);
    assert_eq!(signed_in.data().map(|widget| widget.version), Some(2));
}

#[tokio::test]
async fn test_cached_widget_is_not_evicted_by_rename() {
    let (bus, _) = wired().await;

    bus.execute_query(GetWidget::new("w1")).await.unwrap();
    bus.execute_command(
        RenameWidget::new("w1", "cog").with_metadata(OperationMetadata::for_user("alice")),
    )
    .await
    .unwrap();
    let after = bus.execute_query(GetWidget::new("w1")).await.unwrap();

    assert!(after.cache_info().unwrap().hit);
    assert_eq!(after.data().map(|widget| widget.name.as_str()), Some("gear"));
}

#[tokio::test]
async fn test_list_is_paginated_and_uncached() {
    let (bus, _) = wired().await;
    bus.execute_command(CreateWidget::new("cog", None)).await.unwrap();

    let result = bus.execute_query(ListWidgets::new(1, 1)).await.unwrap();

    assert_eq!(result.status(), OperationStatus::Success);
    assert_eq!(result.data().map(|page| page.total), Some(2));
    assert_eq!(result.pagination().map(|p| p.total_pages()), Some(2));
    assert!(result.cache_info().is_some_and(|info| !info.hit));
}
