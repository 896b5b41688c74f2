//! Shared value types

pub mod date_math;
pub mod value;

pub use value::ParamValue;
