//! Extra input validation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use handlers::{CommandHandler, QueryHandler};
use operations::{Command, CqrsError, DetailMap, Pagination, Query, ValidationErrors};
use serde::Serialize;
use serde::de::DeserializeOwned;

type Validator<O> = Arc<dyn Fn(&O) -> ValidationErrors + Send + Sync>;
type SchemaCheck<O> = Arc<dyn Fn(&O) -> Result<(), String> + Send + Sync>;

/// Adds checks on top of the wrapped handler's validation.
///
/// The inner validation runs first, then the validator function, then the
/// schema check. The first one to fail stops the chain.
pub struct ValidateInput<O, H> {
    inner: H,
    validator: Option<Validator<O>>,
    schema: Option<SchemaCheck<O>>,
}

impl<O: 'static, H> ValidateInput<O, H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            validator: None,
            schema: None,
        }
    }

    /// Adds a validator; a non-empty result fails validation.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&O) -> ValidationErrors + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Requires the operation's serialized form to deserialize as `S`.
    ///
    /// A failure is reported under the `schema` field.
    pub fn with_schema<S>(mut self) -> Self
    where
        O: Serialize,
        S: DeserializeOwned,
    {
        self.schema = Some(Arc::new(|operation: &O| {
            let value = serde_json::to_value(operation).map_err(|err| err.to_string())?;
            serde_json::from_value::<S>(value)
                .map(|_| ())
                .map_err(|err| err.to_string())
        }));
        self
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    fn extra_errors(&self, operation: &O) -> ValidationErrors {
        if let Some(validator) = &self.validator {
            let errors = validator(operation);
            if !errors.is_empty() {
                return errors;
            }
        }
        if let Some(schema) = &self.schema
            && let Err(reason) = schema(operation)
        {
            return ValidationErrors::new().with("schema", reason);
        }
        ValidationErrors::new()
    }
}

#[async_trait]
impl<C, H> CommandHandler<C> for ValidateInput<C, H>
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
        self.inner.validate(command).await?;

        let errors = self.extra_errors(command);
        if errors.is_empty() {
            return Ok(());
        }
        Err(CqrsError::CommandValidation {
            command_name: command.name().to_string(),
            errors,
            operation_id: Some(command.metadata().operation_id()),
        })
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

#[async_trait]
impl<Q, H> QueryHandler<Q> for ValidateInput<Q, H>
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
        self.inner.validate(query).await?;

        let errors = self.extra_errors(query);
        if errors.is_empty() {
            return Ok(());
        }
        Err(CqrsError::QueryValidation {
            query_name: query.name().to_string(),
            errors,
            operation_id: Some(query.metadata().operation_id()),
        })
    }

    async fn authorize(&self, query: &Q) -> Result<(), CqrsError> {
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
