//! Error types for query compilation

use thiserror::Error;

/// Query compilation and backend interaction errors.
///
/// Builder-layer failures indicate a malformed condition definition and
/// abort the current compilation; they are not recoverable at this level.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Condition is null or doesn't have a resolved type, impossible to build filter")]
    UnresolvedCondition,

    #[error("No query builder registered for routing key '{routing_key}' (condition type '{type_id}')")]
    NoBuilderForType { routing_key: String, type_id: String },

    #[error("Condition type '{type_id}' has neither a routing key nor a parent condition")]
    NoRoutingKey { type_id: String },

    #[error("Missing required parameter '{name}' for condition type '{type_id}'")]
    MissingParameter { name: String, type_id: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported comparison operator: {0}")]
    UnsupportedOperator(String),

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;
