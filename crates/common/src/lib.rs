//! Shared identifiers used across the dispatch runtime crates.

mod types;

pub use types::{OperationId, short_type_name};
