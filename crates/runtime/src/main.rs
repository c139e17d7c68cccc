//! Demo binary: wires the widget domain onto a bus and dispatches a few
//! operations.

use decorators::InMemoryCacheStore;
use operations::OperationMetadata;
use runtime::{Config, Runtime};
use serde::Serialize;
use widgets::{
    CreateWidget, DeleteWidget, GetWidget, ListWidgets, RenameWidget, WidgetRepository,
    register_widget_handlers,
};

fn report<T: Serialize>(label: &str, result: &T) {
    match serde_json::to_string(result) {
        Ok(json) => tracing::info!(operation = label, result = %json, "dispatched"),
        Err(err) => tracing::warn!(operation = label, error = %err, "result not serializable"),
    }
}

#[tokio::main]
async fn main() -> runtime::Result<()> {
    // 1. Load configuration and initialize telemetry
    let config = Config::from_env();
    let metrics_handle = runtime::telemetry::init(&config)?;

    // 2. Build the bus and register handlers
    let runtime = Runtime::init(config);
    let bus = runtime.bus();
    register_widget_handlers(&bus, WidgetRepository::new(), InMemoryCacheStore::new())?;
    tracing::info!(handlers = ?bus.get_registered_handlers(), "handlers ready");

    // 3. Dispatch
    let created = bus
        .execute_command(CreateWidget::new("sprocket", Some("#c0ffee".into())))
        .await?;
    report("CreateWidget", &created);

    let invalid = bus.execute_command(CreateWidget::new("", None)).await?;
    report("CreateWidget", &invalid);

    if let Some(widget) = created.data() {
        let id = widget.id.clone();
        for _ in 0..2 {
            let fetched = bus.execute_query(GetWidget::new(id.clone())).await?;
            report("GetWidget", &fetched);
        }

        let renamed = bus
            .execute_command(
                RenameWidget::new(id, "cog").with_metadata(OperationMetadata::for_user("demo")),
            )
            .await?;
        report("RenameWidget", &renamed);
    }

    let missing = bus.execute_query(GetWidget::new("w-missing")).await?;
    report("GetWidget", &missing);

    let page = bus.execute_query(ListWidgets::new(1, 10)).await?;
    report("ListWidgets", &page);

    if let Err(err) = bus.execute_command(DeleteWidget::new("w-missing")).await {
        tracing::warn!(error = %err, kind = err.kind(), "dispatch rejected");
    }

    // 4. Shut down
    if let Some(handle) = metrics_handle {
        tracing::info!(metrics = %handle.render(), "metrics snapshot");
    }
    runtime.shutdown();
    tracing::info!("demo finished");
    Ok(())
}
