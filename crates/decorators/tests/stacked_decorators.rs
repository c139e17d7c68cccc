//! Decorators nested around one handler and dispatched through the bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bus::CqrsBus;
use decorators::{
    Authorize, CachedQuery, ErrorFilter, RetryOnFailure, StaticPermissions, Transactional,
    ValidateInput, command_handler, query_handler,
};
use handlers::{CommandHandler, QueryHandler};
use operations::{
    Command, CqrsError, OperationMetadata, OperationStatus, Query, ValidationErrors,
};
use serde::Serialize;
use serde_json::json;

struct Deposit {
    amount: i64,
    metadata: OperationMetadata,
}

impl Command for Deposit {
    type Output = i64;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        ValidationErrors::new()
    }
}

/// Fails with a concurrency conflict on the first call.
#[derive(Default)]
struct DepositHandler {
    calls: AtomicU32,
}

#[async_trait]
impl CommandHandler<Deposit> for DepositHandler {
    async fn handle(&self, command: &Deposit) -> Result<i64, CqrsError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(CqrsError::concurrency("account-1", None, None));
        }
        Ok(command.amount)
    }
}

#[derive(Serialize)]
struct Balance {
    account: String,
    #[serde(skip)]
    metadata: OperationMetadata,
}

impl Balance {
    fn of(account: &str, user_id: &str) -> Self {
        Self {
            account: account.to_string(),
            metadata: OperationMetadata::for_user(user_id),
        }
    }
}

impl Query for Balance {
    type Output = i64;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        ValidationErrors::new()
    }
}

#[derive(Default)]
struct BalanceHandler {
    calls: AtomicU32,
}

#[async_trait]
impl QueryHandler<Balance> for BalanceHandler {
    async fn handle(&self, _query: &Balance) -> Result<i64, CqrsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(100)
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_around_transaction_recovers_from_conflict() {
    let bus = CqrsBus::default();
    let handler = RetryOnFailure::new(Transactional::new(DepositHandler::default()))
        .delay(Duration::from_millis(50))
        .retry_on(ErrorFilter::kinds(["ConcurrencyError"]));
    command_handler::<Deposit, _>(handler).install(&bus);

    let result = bus
        .execute_command(Deposit {
            amount: 25,
            metadata: OperationMetadata::new(),
        })
        .await
        .unwrap();

    assert_eq!(result.status(), OperationStatus::Success);
    assert_eq!(result.data(), Some(&25));
    assert_eq!(
        bus.get_registered_handlers().commands["Deposit"],
        "DepositHandler"
    );
}

#[tokio::test]
async fn test_authorized_cached_query_runs_handler_once() {
    let bus = CqrsBus::default();
    let inner = Arc::new(BalanceHandler::default());
    let permissions = Arc::new(StaticPermissions::new().grant("alice", ["accounts:read"]));
    let handler = CachedQuery::new(
        Authorize::new(Arc::clone(&inner))
            .permissions(["accounts:read"])
            .permission_source(permissions),
    )
    .vary_by(["account"]);
    query_handler::<Balance, _>(handler).install(&bus);

    let first = bus.execute_query(Balance::of("acc-1", "alice")).await.unwrap();
    let second = bus.execute_query(Balance::of("acc-1", "alice")).await.unwrap();

    assert_eq!(first.data(), Some(&100));
    assert!(!first.cache_info().is_some_and(|info| info.hit));
    assert_eq!(second.data(), Some(&100));
    let info = second.cache_info().expect("cache info on a hit");
    assert!(info.hit);
    assert_eq!(info.key.as_deref(), Some("Balance:account=acc-1"));
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authorization_runs_before_the_cache() {
    let bus = CqrsBus::default();
    let permissions = Arc::new(StaticPermissions::new().grant("alice", ["accounts:read"]));
    let handler = CachedQuery::new(
        Authorize::new(BalanceHandler::default())
            .permissions(["accounts:read"])
            .permission_source(permissions),
    );
    query_handler::<Balance, _>(handler).install(&bus);

    bus.execute_query(Balance::of("acc-1", "alice")).await.unwrap();
    let denied = bus.execute_query(Balance::of("acc-1", "mallory")).await.unwrap();

    assert_eq!(denied.status(), OperationStatus::Unauthorized);
    assert!(denied.data().is_none());
}

#[tokio::test]
async fn test_extra_validation_wraps_the_whole_stack() {
    let bus = CqrsBus::default();
    let handler = ValidateInput::new(CachedQuery::new(BalanceHandler::default())).with_validator(
        |query: &Balance| {
            let mut errors = ValidationErrors::new();
            errors.check(query.account.starts_with("acc-"), "account", "unknown format");
            errors
        },
    );
    query_handler::<Balance, _>(handler).install(&bus);

    let result = bus.execute_query(Balance::of("x", "alice")).await.unwrap();

    assert_eq!(result.status(), OperationStatus::ValidationError);
    assert_eq!(result.errors()["account"], json!("unknown format"));
}
