//! Error types for in-memory evaluation

use cohort_query::QueryError;
use thiserror::Error;

/// Evaluation errors. A missing evaluator registration is a deployment
/// fault and fails the evaluation; an unresolved condition type does not
/// reach this level (the dispatcher evaluates it to `false`).
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("No evaluator registered for routing key '{routing_key}' (condition type '{type_id}')")]
    NoEvaluatorForType { routing_key: String, type_id: String },

    #[error("Condition type '{type_id}' has neither a routing key nor a parent condition")]
    NoRoutingKey { type_id: String },

    #[error("Missing required parameter '{name}' for condition type '{type_id}'")]
    MissingParameter { name: String, type_id: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported comparison operator: {0}")]
    UnsupportedOperator(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type Result<T> = std::result::Result<T, EvalError>;
