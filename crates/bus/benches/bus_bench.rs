use std::sync::Arc;

use async_trait::async_trait;
use bus::{CqrsBus, LoggingMiddleware, MetricsMiddleware};
use criterion::{Criterion, criterion_group, criterion_main};
use handlers::{CommandHandler, CommandLifecycle, QueryHandler, QueryLifecycle};
use operations::{Command, CqrsError, OperationMetadata, Query, ValidationErrors};

struct Increment {
    by: u64,
    metadata: OperationMetadata,
}

impl Increment {
    fn new(by: u64) -> Self {
        Self {
            by,
            metadata: OperationMetadata::new(),
        }
    }
}

impl Command for Increment {
    type Output = u64;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check(self.by > 0, "by", "must be positive");
        errors
    }
}

struct Current {
    metadata: OperationMetadata,
}

impl Query for Current {
    type Output = u64;

    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn validate(&self) -> ValidationErrors {
        ValidationErrors::new()
    }
}

struct IncrementHandler;

#[async_trait]
impl CommandHandler<Increment> for IncrementHandler {
    async fn handle(&self, command: &Increment) -> Result<u64, CqrsError> {
        Ok(command.by + 1)
    }
}

struct CurrentHandler;

#[async_trait]
impl QueryHandler<Current> for CurrentHandler {
    async fn handle(&self, _query: &Current) -> Result<u64, CqrsError> {
        Ok(7)
    }
}

fn make_bus() -> CqrsBus {
    let bus = CqrsBus::default();
    bus.register_command_handler(CommandLifecycle::new(IncrementHandler))
        .unwrap();
    bus.register_query_handler(QueryLifecycle::new(CurrentHandler))
        .unwrap();
    bus
}

fn bench_execute_command(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = make_bus();

    c.bench_function("bus/execute_command", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = bus.execute_command(Increment::new(1)).await.unwrap();
                assert!(result.is_success());
            });
        });
    });
}

fn bench_execute_command_with_middleware(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = make_bus();
    bus.add_command_middleware(Arc::new(LoggingMiddleware::new()));
    bus.add_command_middleware(Arc::new(MetricsMiddleware::new()));

    c.bench_function("bus/execute_command_with_middleware", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = bus.execute_command(Increment::new(1)).await.unwrap();
                assert!(result.is_success());
            });
        });
    });
}

fn bench_validation_failure(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = make_bus();

    c.bench_function("bus/execute_command_validation_failure", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = bus.execute_command(Increment::new(0)).await.unwrap();
                assert!(result.is_failure());
            });
        });
    });
}

fn bench_execute_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = make_bus();

    c.bench_function("bus/execute_query", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = bus
                    .execute_query(Current {
                        metadata: OperationMetadata::new(),
                    })
                    .await
                    .unwrap();
                assert_eq!(result.data(), Some(&7));
            });
        });
    });
}

criterion_group!(
    benches,
    bench_execute_command,
    bench_execute_command_with_middleware,
    bench_validation_failure,
    bench_execute_query
);
criterion_main!(benches);
