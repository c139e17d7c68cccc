//! Transaction bracketing for command handlers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use handlers::CommandHandler;
use operations::{Command, CqrsError, DetailMap};
use uuid::Uuid;

/// Isolation level requested when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ_UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ_COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE_READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit-of-work boundary used by [`Transactional`].
///
/// A transaction that is dropped without `commit` or `rollback` is
/// abandoned; what that means is up to the implementation.
#[async_trait]
pub trait TransactionManager: Send + Sync + 'static {
    type Transaction: Send;

    async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<Self::Transaction, CqrsError>;

    async fn commit(&self, transaction: Self::Transaction) -> Result<(), CqrsError>;

    async fn rollback(&self, transaction: Self::Transaction) -> Result<(), CqrsError>;
}

/// Transaction handle issued by [`TracingTransactionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingTransaction {
    pub id: Uuid,
    pub isolation: Option<IsolationLevel>,
}

/// Manager with no backing store that only records transaction events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransactionManager;

#[async_trait]
impl TransactionManager for TracingTransactionManager {
    type Transaction = TracingTransaction;

    async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<TracingTransaction, CqrsError> {
        let transaction = TracingTransaction {
            id: Uuid::new_v4(),
            isolation,
        };
        tracing::debug!(
            transaction_id = %transaction.id,
            isolation_level = isolation.map_or("default", |level| level.as_str()),
            "transaction.started"
        );
        Ok(transaction)
    }

    async fn commit(&self, transaction: TracingTransaction) -> Result<(), CqrsError> {
        tracing::debug!(transaction_id = %transaction.id, "transaction.committed");
        Ok(())
    }

    async fn rollback(&self, transaction: TracingTransaction) -> Result<(), CqrsError> {
        tracing::debug!(transaction_id = %transaction.id, "transaction.rolled_back");
        Ok(())
    }
}

/// Runs the wrapped handler's `handle` inside a transaction.
///
/// On success the transaction is committed (unless `commit_on_success` is
/// off, in which case it is left to the manager). On failure it is rolled
/// back when the error matches the rollback filter. Any other error
/// abandons the transaction, leaving it to the manager, and is logged.
/// The handler's error is always returned.
pub struct Transactional<H, T = TracingTransactionManager> {
    inner: H,
    manager: T,
    isolation: Option<IsolationLevel>,
    rollback_on: crate::ErrorFilter,
    commit_on_success: bool,
}

impl<H> Transactional<H, TracingTransactionManager> {
    pub fn new(inner: H) -> Self {
        Self::with_manager(inner, TracingTransactionManager)
    }
}

impl<H, T: TransactionManager> Transactional<H, T> {
    pub fn with_manager(inner: H, manager: T) -> Self {
        Self {
            inner,
            manager,
            isolation: None,
            rollback_on: crate::ErrorFilter::all(),
            commit_on_success: true,
        }
    }

    pub fn isolation_level(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    /// Restricts rollback to errors matching `filter`.
    pub fn rollback_on(mut self, filter: crate::ErrorFilter) -> Self {
        self.rollback_on = filter;
        self
    }

    pub fn commit_on_success(mut self, commit: bool) -> Self {
        self.commit_on_success = commit;
        self
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn manager(&self) -> &T {
        &self.manager
    }

    async fn transact<O, F>(&self, work: F) -> Result<O, CqrsError>
    where
        F: Future<Output = Result<O, CqrsError>> + Send,
    {
        tracing::debug!(
            isolation_level = self.isolation.map_or("default", |level| level.as_str()),
            commit_on_success = self.commit_on_success,
            "transactional handler"
        );
        let transaction = self.manager.begin(self.isolation).await?;

        match work.await {
            Ok(output) => {
                if self.commit_on_success {
                    self.manager.commit(transaction).await?;
                }
                Ok(output)
            }
            Err(err) if self.rollback_on.matches(&err) => {
                if let Err(rollback_err) = self.manager.rollback(transaction).await {
                    tracing::error!(error = %rollback_err, "transaction rollback failed");
                }
                tracing::warn!(
                    reason = %err,
                    exception_type = err.kind(),
                    "transaction rolled back"
                );
                Err(err)
            }
            Err(err) => {
                drop(transaction);
                tracing::warn!(
                    reason = %err,
                    exception_type = err.kind(),
                    "transaction left to the manager after a non-rollback error"
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<C, H, T> CommandHandler<C> for Transactional<H, T>
where
    C: Command,
    H: CommandHandler<C>,
    T: TransactionManager,
{
    async fn handle(&self, command: &C) -> Result<C::Output, CqrsError> {
        self.transact(self.inner.handle(command)).await
    }

    async fn handle_within(&self, command: &C, timeout: Duration) -> Result<C::Output, CqrsError> {
        self.transact(self.inner.handle_within(command, timeout)).await
    }

    async fn validate(&self, command: &C) -> Result<(), CqrsError> {
        self.inner.validate(command).await
    }

    async fn authorize(&self, command: &C) -> Result<(), CqrsError> {
        self.inner.authorize(command).await
    }

    async fn affected_entities(&self, command: &C, output: &C::Output) -> Option<DetailMap> {
        self.inner.affected_entities(command, output).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
