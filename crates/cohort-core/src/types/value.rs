//! Parameter values attached to conditions
//!
//! Condition parameters are dynamically shaped: scalars, dates, nested
//! conditions, ordered sequences or maps. `ParamValue` is the tagged union
//! each builder and evaluator pattern-matches against, so a condition with
//! the wrong parameter shape fails with a typed error instead of a cast
//! failure.

use crate::condition::Condition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single condition parameter value.
///
/// The `Date` variant is listed before `String` on purpose: with untagged
/// deserialization an ISO-8601 timestamp becomes a `Date`, everything else
/// stays a plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Date value
    Date(DateTime<Utc>),
    /// String value
    String(String),
    /// Nested condition
    Condition(Box<Condition>),
    /// Ordered sequence of values
    List(Vec<ParamValue>),
    /// Nested map of values
    Map(HashMap<String, ParamValue>),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(i) => Some(*i),
            ParamValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric coercion across integer, float and numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            ParamValue::Condition(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, ParamValue>> {
        match self {
            ParamValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Date coercion: native dates, ISO-8601 strings, epoch milliseconds and
    /// date-math expressions (`now-30d`).
    pub fn to_date(&self) -> Option<DateTime<Utc>> {
        super::date_math::coerce_date(self)
    }

    /// Renders scalars as the string the comparison layer works with.
    pub fn to_display_string(&self) -> String {
        match self {
            ParamValue::Null => String::new(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Integer(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Date(d) => d.to_rfc3339(),
            ParamValue::String(s) => s.clone(),
            other => format!("{:?}", other),
        }
    }
}

/// Picks the first non-null value among typed parameter slots.
pub fn first_non_null<'a, I>(slots: I) -> Option<&'a ParamValue>
where
    I: IntoIterator<Item = Option<&'a ParamValue>>,
{
    slots
        .into_iter()
        .flatten()
        .find(|value| !value.is_null())
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Date(value)
    }
}

impl From<Condition> for ParamValue {
    fn from(value: Condition) -> Self {
        ParamValue::Condition(Box::new(value))
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(value: Vec<ParamValue>) -> Self {
        ParamValue::List(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value.into_iter().map(ParamValue::String).collect())
    }
}
