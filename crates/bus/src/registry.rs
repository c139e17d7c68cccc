//! Type-keyed handler registry.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use operations::{CqrsError, OperationKind, Result};
use serde::Serialize;

/// Public description of one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerInfo {
    pub operation: String,
    pub handler: String,
    pub registered_at: DateTime<Utc>,
}

struct Entry {
    // Always an `Arc<dyn CommandExecutor<C>>` or `Arc<dyn QueryExecutor<Q>>`
    // for the operation type the entry is keyed by.
    executor: Box<dyn Any + Send + Sync>,
    operation: &'static str,
    handler: &'static str,
    registered_at: DateTime<Utc>,
}

/// Maps an operation type to its single executor.
pub(crate) struct HandlerRegistry {
    kind: OperationKind,
    allow_override: bool,
    entries: RwLock<HashMap<TypeId, Entry>>,
}

impl HandlerRegistry {
    pub(crate) fn new(kind: OperationKind, allow_override: bool) -> Self {
        Self {
            kind,
            allow_override,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn allow_override(&self) -> bool {
        self.allow_override
    }

    /// Registers `executor` under `key`.
    ///
    /// A second registration for the same key fails with `DuplicateHandler`
    /// unless overrides are allowed, in which case it replaces the first.
    pub(crate) fn insert(
        &self,
        key: TypeId,
        operation: &'static str,
        handler: &'static str,
        executor: Box<dyn Any + Send + Sync>,
    ) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(&key) {
            if !self.allow_override {
                return Err(CqrsError::DuplicateHandler {
                    kind: self.kind,
                    operation_type: operation.to_string(),
                    existing_handler: existing.handler.to_string(),
                    new_handler: handler.to_string(),
                });
            }
            tracing::warn!(
                bus = %self.kind,
                operation,
                existing_handler = existing.handler,
                new_handler = handler,
                "overriding registered handler"
            );
        }

        entries.insert(
            key,
            Entry {
                executor,
                operation,
                handler,
                registered_at: Utc::now(),
            },
        );
        tracing::info!(bus = %self.kind, operation, handler, "handler registered");
        Ok(())
    }

    /// Returns a clone of the executor stored under `key`.
    ///
    /// The read lock is released before the caller uses the executor.
    pub(crate) fn get<E: Any + Clone>(&self, key: TypeId) -> Option<E> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&key)
            .and_then(|entry| entry.executor.downcast_ref::<E>())
            .cloned()
    }

    pub(crate) fn names(&self) -> BTreeMap<String, String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .map(|entry| (entry.operation.to_string(), entry.handler.to_string()))
            .collect()
    }

    pub(crate) fn info(&self) -> Vec<HandlerInfo> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut info: Vec<HandlerInfo> = entries
            .values()
            .map(|entry| HandlerInfo {
                operation: entry.operation.to_string(),
                handler: entry.handler.to_string(),
                registered_at: entry.registered_at,
            })
            .collect();
        info.sort_by(|a, b| a.operation.cmp(&b.operation));
        info
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
