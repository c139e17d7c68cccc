//! Caller authorization.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use handlers::{CommandHandler, QueryHandler};
use operations::{
    Command, CqrsError, DetailMap, OperationId, OperationMetadata, Pagination, Query,
};

/// Looks up what a user is allowed to do.
#[async_trait]
pub trait PermissionSource: Send + Sync + 'static {
    async fn permissions(&self, user_id: &str) -> Result<Vec<String>, CqrsError>;

    async fn is_admin(&self, _user_id: &str) -> Result<bool, CqrsError> {
        Ok(false)
    }
}

/// Fixed permission table, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    grants: HashMap<String, Vec<String>>,
    admins: HashSet<String>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I, P>(mut self, user_id: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.grants
            .entry(user_id.into())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn admin(mut self, user_id: impl Into<String>) -> Self {
        self.admins.insert(user_id.into());
        self
    }
}

#[async_trait]
impl PermissionSource for StaticPermissions {
    async fn permissions(&self, user_id: &str) -> Result<Vec<String>, CqrsError> {
        Ok(self.grants.get(user_id).cloned().unwrap_or_default())
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool, CqrsError> {
        Ok(self.admins.contains(user_id))
    }
}

/// Requires an authenticated caller before the wrapped handler's own
/// authorization runs.
///
/// Without a [`PermissionSource`] only the presence of a user id is checked.
/// With one, every required permission must be granted; admins pass
/// regardless unless the override is disabled.
pub struct Authorize<H> {
    inner: H,
    permissions: Vec<String>,
    resource_field: Option<&'static str>,
    allow_admin_override: bool,
    source: Option<Arc<dyn PermissionSource>>,
}

impl<H> Authorize<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            permissions: Vec::new(),
            resource_field: None,
            allow_admin_override: true,
            source: None,
        }
    }

    pub fn permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Name of the field holding the targeted resource id. Recorded on the
    /// authorization log line.
    pub fn resource_field(mut self, field: &'static str) -> Self {
        self.resource_field = Some(field);
        self
    }

    pub fn allow_admin_override(mut self, allow: bool) -> Self {
        self.allow_admin_override = allow;
        self
    }

    pub fn permission_source(mut self, source: Arc<dyn PermissionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    fn denied(
        &self,
        operation_name: &str,
        user_id: Option<&str>,
        operation_id: OperationId,
    ) -> CqrsError {
        CqrsError::Authorization {
            operation_name: operation_name.to_string(),
            user_id: user_id.map(str::to_string),
            required_permissions: self.permissions.clone(),
            operation_id: Some(operation_id),
        }
    }

    async fn check(
        &self,
        operation_name: &str,
        metadata: &OperationMetadata,
    ) -> Result<(), CqrsError> {
        let operation_id = metadata.operation_id();
        let Some(user_id) = metadata.user_id() else {
            return Err(self.denied(operation_name, None, operation_id));
        };

        tracing::debug!(
            auth.user_id = user_id,
            auth.required_permissions = ?self.permissions,
            auth.resource_field = self.resource_field,
            "authorizing operation"
        );

        let Some(source) = &self.source else {
            return Ok(());
        };
        if self.permissions.is_empty() {
            return Ok(());
        }
        if self.allow_admin_override && source.is_admin(user_id).await? {
            tracing::debug!(auth.user_id = user_id, "admin override");
            return Ok(());
        }

        let granted = source.permissions(user_id).await?;
        let missing: Vec<&String> = self
            .permissions
            .iter()
            .filter(|required| !granted.contains(*required))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!(auth.user_id = user_id, missing = ?missing, "missing permissions");
            Err(self.denied(operation_name, Some(user_id), operation_id))
        }
    }
}

#[async_trait]
impl<C, H> CommandHandler<C> for Authorize<H>
where
    C: Command,
    H: CommandHandler<C>,
{
    async fn handle(&self, command: &C) -> Result<C::Output, CqrsError> {
        self.inner.handle(command).await
    }

    async fn handle_within(&self, command: &C, timeout: Duration) -> Result<C::Output, CqrsError> {
        self.inner.handle_within(command, timeout).await
    }

    async fn validate(&self, command: &C) -> Result<(), CqrsError> {
        self.inner.validate(command).await
    }

    async fn authorize(&self, command: &C) -> Result<(), CqrsError> {
        self.check(command.name(), command.metadata()).await?;
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

#[async_trait]
impl<Q, H> QueryHandler<Q> for Authorize<H>
where
    Q: Query,
    H: QueryHandler<Q>,
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
        self.check(query.name(), query.metadata()).await?;
        self.inner.authorize(query).await
    }

    async fn cached_result(&self, query: &Q) -> Result<Option<Q::Output>, CqrsError> {
        self.inner.cached_result(query).await
    }

    async fn cache_result(&self, query: &Q, output: &Q::Output) -> Result<(), CqrsError> {
        self.inner.cache_result(query, output).await
    }

    fn cache_key(&self, query: &Q) -> Option<String> {
        self.inner.cache_key(query)
    }

    async fn pagination(&self, query: &Q, output: &Q::Output) -> Option<Pagination> {
        self.inner.pagination(query, output).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn cache_enabled(&self) -> bool {
        self.inner.cache_enabled()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
