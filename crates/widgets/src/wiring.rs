//! Registers the widget handlers on a bus.

use std::time::Duration;

use bus::CqrsBus;
use decorators::{
    Authorize, CachedQuery, InMemoryCacheStore, Transactional, command_handler, query_handler,
};
use operations::Result;

use crate::command_handlers::{CreateWidgetHandler, RenameWidgetHandler};
use crate::commands::{CreateWidget, RenameWidget};
use crate::queries::{GetWidget, ListWidgets};
use crate::query_handlers::{GetWidgetHandler, ListWidgetsHandler};
use crate::repository::WidgetRepository;

/// How long a fetched widget stays cached.
pub const WIDGET_CACHE_TTL: Duration = Duration::from_secs(300);

/// Registers every widget handler on `bus`, sharing `repo` and `cache`.
///
/// - `CreateWidget` runs inside a transaction.
/// - `RenameWidget` requires an authenticated caller.
/// - `GetWidget` is cached per id.
///
/// `DeleteWidget` is left unregistered. Renames do not evict cached
/// `GetWidget` results, so reads can be stale until the TTL passes.
pub fn register_widget_handlers(
    bus: &CqrsBus,
    repo: WidgetRepository,
    cache: InMemoryCacheStore,
) -> Result<()> {
    bus.register_command_handlers([
        command_handler::<CreateWidget, _>(Transactional::new(CreateWidgetHandler::new(
            repo.clone(),
        )))
        .timeout(Duration::from_secs(5))
        .binding(),
        command_handler::<RenameWidget, _>(Authorize::new(RenameWidgetHandler::new(repo.clone())))
            .binding(),
    ])?;

    bus.register_query_handlers([
        query_handler::<GetWidget, _>(
            CachedQuery::with_store(GetWidgetHandler::new(repo.clone()), cache)
                .ttl(WIDGET_CACHE_TTL)
                .vary_by(["id"]),
        )
        .binding(),
        query_handler::<ListWidgets, _>(ListWidgetsHandler::new(repo)).binding(),
    ])?;

    tracing::info!(handlers = ?bus.get_handler_count(), "widget handlers registered");
    Ok(())
}
