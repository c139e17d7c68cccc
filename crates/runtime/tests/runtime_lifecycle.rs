//! Runtime init/shutdown against the widget domain.

use decorators::InMemoryCacheStore;
use operations::{CqrsError, OperationStatus};
use runtime::{Config, Runtime};
use widgets::{CreateWidget, WidgetRepository, register_widget_handlers};

#[tokio::test]
async fn test_init_installs_configured_middleware() {
    let runtime = Runtime::init(Config {
        metrics_enabled: true,
        ..Config::default()
    });

    let bus = runtime.bus();
    assert_eq!(
        bus.command_bus().middleware_names(),
        vec!["LoggingMiddleware", "MetricsMiddleware"]
    );
    assert!(bus.is_initialized());
}

#[tokio::test]
async fn test_dispatch_after_shutdown_fails() {
    let runtime = Runtime::init(Config::default());
    let bus = runtime.bus();
    register_widget_handlers(&bus, WidgetRepository::new(), InMemoryCacheStore::new()).unwrap();

    let before = bus.execute_command(CreateWidget::new("gear", None)).await.unwrap();
    runtime.shutdown();
    let after = bus.execute_command(CreateWidget::new("cog", None)).await;

    assert_eq!(before.status(), OperationStatus::Success);
    assert!(matches!(after, Err(CqrsError::BusNotInitialized { .. })));
}

#[tokio::test]
async fn test_override_setting_reaches_the_bus() {
    let runtime = Runtime::init(Config {
        allow_handler_override: true,
        log_dispatch: false,
        ..Config::default()
    });
    let bus = runtime.bus();
    let repo = WidgetRepository::new();

    register_widget_handlers(&bus, repo.clone(), InMemoryCacheStore::new()).unwrap();
    register_widget_handlers(&bus, repo, InMemoryCacheStore::new()).unwrap();

    assert_eq!(bus.get_handler_count().total, 4);
    assert!(bus.command_bus().middleware_names().is_empty());
}
