//! Error types for Cohort Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid date expression: {0}")]
    InvalidDateExpression(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
