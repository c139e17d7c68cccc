//! Builders that turn a handler into a registered executor.
//!
//! ```ignore
//! command_handler::<CreateWidget, _>(CreateWidgetHandler::new(repo))
//!     .timeout(Duration::from_secs(5))
//!     .install(&bus);
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use bus::{CommandBinding, CqrsBus, QueryBinding};
use common::short_type_name;
use handlers::{CommandHandler, CommandLifecycle, QueryHandler, QueryLifecycle};
use operations::{Command, Query};

/// Starts configuring `handler` as the executor for commands of type `C`.
pub fn command_handler<C, H>(handler: H) -> CommandRegistration<C, H>
where
    C: Command,
    H: CommandHandler<C>,
{
    CommandRegistration {
        handler,
        timeout: None,
        auto_register: true,
        _command: PhantomData,
    }
}

/// Starts configuring `handler` as the executor for queries of type `Q`.
pub fn query_handler<Q, H>(handler: H) -> QueryRegistration<Q, H>
where
    Q: Query,
    H: QueryHandler<Q>,
{
    QueryRegistration {
        handler,
        timeout: None,
        cache_enabled: None,
        auto_register: true,
        _query: PhantomData,
    }
}

pub struct CommandRegistration<C, H> {
    handler: H,
    timeout: Option<Duration>,
    auto_register: bool,
    _command: PhantomData<fn(&C)>,
}

impl<C, H> CommandRegistration<C, H>
where
    C: Command,
    H: CommandHandler<C>,
{
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// When off, [`install`](Self::install) hands the lifecycle back
    /// instead of registering it.
    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    pub fn build(self) -> CommandLifecycle<C, H> {
        let lifecycle = CommandLifecycle::new(self.handler);
        match self.timeout {
            Some(timeout) => lifecycle.with_timeout(timeout),
            None => lifecycle,
        }
    }

    pub fn binding(self) -> CommandBinding {
        CommandBinding::new::<C, _>(self.build())
    }

    /// Registers the handler on `bus`.
    ///
    /// A failed registration is logged and swallowed. Returns the lifecycle
    /// only when auto-registration is off.
    pub fn install(self, bus: &CqrsBus) -> Option<CommandLifecycle<C, H>> {
        if !self.auto_register {
            return Some(self.build());
        }

        let lifecycle = self.build();
        let handler = lifecycle.handler().name();
        match bus.register_command_handler::<C, _>(lifecycle) {
            Ok(()) => {
                tracing::info!(
                    command_type = short_type_name::<C>(),
                    handler,
                    "handler auto-registered"
                );
            }
            Err(err) => {
                tracing::warn!(
                    command_type = short_type_name::<C>(),
                    handler,
                    error = %err,
                    "failed to auto-register command handler"
                );
            }
        }
        None
    }
}

pub struct QueryRegistration<Q, H> {
    handler: H,
    timeout: Option<Duration>,
    cache_enabled: Option<bool>,
    auto_register: bool,
    _query: PhantomData<fn(&Q)>,
}

impl<Q, H> QueryRegistration<Q, H>
where
    Q: Query,
    H: QueryHandler<Q>,
{
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    pub fn build(self) -> QueryLifecycle<Q, H> {
        let mut lifecycle = QueryLifecycle::new(self.handler);
        if let Some(timeout) = self.timeout {
            lifecycle.set_timeout(timeout);
        }
        match self.cache_enabled {
            Some(true) => lifecycle.enable_cache(),
            Some(false) => lifecycle.disable_cache(),
            None => {}
        }
        lifecycle
    }

    pub fn binding(self) -> QueryBinding {
        QueryBinding::new::<Q, _>(self.build())
    }

    pub fn install(self, bus: &CqrsBus) -> Option<QueryLifecycle<Q, H>> {
        if !self.auto_register {
            return Some(self.build());
        }

        let lifecycle = self.build();
        let handler = lifecycle.handler().name();
        match bus.register_query_handler::<Q, _>(lifecycle) {
            Ok(()) => {
                tracing::info!(query_type = short_type_name::<Q>(), handler, "handler auto-registered");
            }
            Err(err) => {
                tracing::warn!(
                    query_type = short_type_name::<Q>(),
                    handler,
                    error = %err,
                    "failed to auto-register query handler"
                );
            }
        }
        None
    }
}
