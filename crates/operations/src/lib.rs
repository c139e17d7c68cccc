//! Operation model for the dispatch runtime.
//!
//! This crate provides the contracts every other crate builds on:
//! - [`Command`] and [`Query`] traits describing write and read intents
//! - [`OperationMetadata`] carried by every operation and echoed in results
//! - [`CommandResult`] and [`QueryResult`] envelopes with named constructors
//! - [`CqrsError`], the closed error taxonomy

pub mod command;
pub mod error;
pub mod kind;
pub mod metadata;
pub mod query;
pub mod result;
pub mod status;
pub mod validation;

pub use command::Command;
pub use common::{OperationId, short_type_name};
pub use error::{CqrsError, DetailMap, Result};
pub use kind::OperationKind;
pub use metadata::{OperationMetadata, OperationMetadataBuilder};
pub use query::Query;
pub use result::{CacheInfo, CommandResult, OperationResult, Pagination, QueryResult};
pub use status::OperationStatus;
pub use validation::ValidationErrors;
