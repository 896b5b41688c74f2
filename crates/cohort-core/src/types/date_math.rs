//! Date coercion and a reduced date-math expression parser
//!
//! Date-valued parameters arrive in several shapes: native dates, ISO-8601
//! strings, epoch milliseconds, or rolling expressions such as `now-30d`
//! used by time-window filters. Only the `now` anchor with a single
//! `+`/`-` offset is supported; that is all the condition layer produces.

use crate::error::{CoreError, Result};
use crate::types::ParamValue;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Parses a date-math expression relative to `now`.
///
/// Supported forms: `now`, `now-30d`, `now+12h`, with units `s`, `m`, `h`,
/// `d` and `w`.
pub fn parse_date_math(expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let invalid = || CoreError::InvalidDateExpression(expression.to_string());
    let rest = expression.strip_prefix("now").ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok(now);
    }
    let (sign, offset) = match rest.as_bytes()[0] {
        b'+' => (1i64, &rest[1..]),
        b'-' => (-1i64, &rest[1..]),
        _ => return Err(invalid()),
    };
    if offset.len() < 2 {
        return Err(invalid());
    }
    let (amount, unit) = offset.split_at(offset.len() - 1);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let duration = match unit {
        "s" => Duration::seconds(amount),
        "m" => Duration::minutes(amount),
        "h" => Duration::hours(amount),
        "d" => Duration::days(amount),
        "w" => Duration::weeks(amount),
        _ => return Err(invalid()),
    };
    Ok(now + duration * sign as i32)
}

/// Coerces a parameter value to a date, if it has any date shape at all.
pub fn coerce_date(value: &ParamValue) -> Option<DateTime<Utc>> {
    match value {
        ParamValue::Date(d) => Some(*d),
        ParamValue::String(s) => {
            if s.starts_with("now") {
                parse_date_math(s, Utc::now()).ok()
            } else {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Utc))
                    .ok()
            }
        }
        ParamValue::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
        ParamValue::Float(millis) => Utc.timestamp_millis_opt(*millis as i64).single(),
        _ => None,
    }
}
