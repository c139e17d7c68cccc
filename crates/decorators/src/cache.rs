//! Query result caching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use handlers::QueryHandler;
use operations::{CqrsError, Pagination, Query};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key-value store holding serialized query outputs.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Value>, CqrsError>;

    /// Stores `value`; with a `ttl` it expires after that long.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CqrsError>;

    async fn delete(&self, key: &str) -> Result<(), CqrsError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache store with per-entry expiry.
///
/// Expired entries are dropped lazily when read.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CqrsError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CqrsError> {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CqrsError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Caches the wrapped handler's outputs in a [`CacheStore`].
///
/// The key is the prefix (the query name unless set) followed by
/// `field=value` for every `vary_by` field present in the query's serialized
/// form, joined with `:`. Writes never invalidate cached reads; entries live
/// until their TTL runs out or the store is cleared.
pub struct CachedQuery<H, S = InMemoryCacheStore> {
    inner: H,
    store: S,
    ttl: Option<Duration>,
    prefix: Option<String>,
    vary_by: Vec<String>,
    cache_null_results: bool,
}

impl<H> CachedQuery<H, InMemoryCacheStore> {
    pub fn new(inner: H) -> Self {
        Self::with_store(inner, InMemoryCacheStore::new())
    }
}

impl<H, S: CacheStore> CachedQuery<H, S> {
    pub fn with_store(inner: H, store: S) -> Self {
        Self {
            inner,
            store,
            ttl: None,
            prefix: None,
            vary_by: Vec::new(),
            cache_null_results: false,
        }
    }

    /// Entry lifetime. Falls back to the query's own `cache_ttl()`.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Query fields whose values become part of the key.
    pub fn vary_by<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.vary_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Also caches outputs that serialize to `null`.
    pub fn cache_null_results(mut self, cache: bool) -> Self {
        self.cache_null_results = cache;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Builds the cache key for `query`.
    pub fn key_for<Q: Query + Serialize>(&self, query: &Q) -> Result<String, CqrsError> {
        let prefix = self
            .prefix
            .clone()
            .unwrap_or_else(|| query.name().to_string());
        let mut parts = vec![prefix];

        if !self.vary_by.is_empty() {
            let fields = serde_json::to_value(query)?;
            for field in &self.vary_by {
                if let Some(value) = fields.get(field) {
                    parts.push(format!("{field}={}", render(value)));
                }
            }
        }

        Ok(parts.join(":"))
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl<Q, H, S> QueryHandler<Q> for CachedQuery<H, S>
where
    Q: Query + Serialize,
    Q::Output: Serialize + DeserializeOwned,
    H: QueryHandler<Q>,
    S: CacheStore,
{
    async fn handle(&self, query: &Q) -> Result<Q::Output, CqrsError> {
        self.inner.handle(query).await
    }

    async fn handle_within(&self, query: &Q, timeout: Duration) -> Result<Q::Output, CqrsError> {
        self.inner.handle_within(query, timeout).await
    }

    async fn validate(&self, query: &Q) -> Result<(), CqrsError> {
        self.inner.validate(query).await
    }

    async fn authorize(&self, query: &Q) -> Result<(), CqrsError> {
        self.inner.authorize(query).await
    }

    async fn cached_result(&self, query: &Q) -> Result<Option<Q::Output>, CqrsError> {
        let key = self.key_for(query)?;
        match self.store.get(&key).await? {
            Some(value) => {
                tracing::debug!(key = %key, "query.cache.hit");
                Ok(Some(serde_json::from_value(value)?))
            }
            None => {
                tracing::debug!(key = %key, "query.cache.miss");
                Ok(None)
            }
        }
    }

    async fn cache_result(&self, query: &Q, output: &Q::Output) -> Result<(), CqrsError> {
        let value = serde_json::to_value(output)?;
        if value.is_null() && !self.cache_null_results {
            return Ok(());
        }

        let key = self.key_for(query)?;
        let ttl = self.ttl.or_else(|| query.cache_ttl());
        self.store.set(&key, value, ttl).await?;
        tracing::debug!(
            key = %key,
            ttl_seconds = ttl.map(|ttl| ttl.as_secs_f64()),
            "query.cache.stored"
        );
        Ok(())
    }

    fn cache_key(&self, query: &Q) -> Option<String> {
        self.key_for(query).ok()
    }

    async fn pagination(&self, query: &Q, output: &Q::Output) -> Option<Pagination> {
        self.inner.pagination(query, output).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn cache_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
