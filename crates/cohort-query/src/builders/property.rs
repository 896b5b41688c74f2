//! Property comparison builder
//!
//! One builder handles the whole comparison operator table against a named
//! property. Expected values arrive in typed slots (string, integer,
//! double, date, date expression); the first non-null slot wins and the
//! single-valued and multi-valued families are never mixed in one
//! condition.

use super::missing_parameter;
use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::{QueryError, Result};
use crate::query::{DistanceUnit, GeoPoint, Query};
use chrono::{Duration, TimeZone, Utc};
use cohort_core::types::value::first_non_null;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

pub struct PropertyConditionQueryBuilder;

impl ConditionQueryBuilder for PropertyConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        let operator = condition
            .string_parameter("comparisonOperator")
            .ok_or_else(|| missing_parameter(condition, "comparisonOperator"))?;
        let name = condition
            .string_parameter("propertyName")
            .ok_or_else(|| missing_parameter(condition, "propertyName"))?;

        let value = single_value(condition);
        let values = multi_values(condition);
        let text = condition.string_parameter("propertyValue");

        let query = match operator {
            "equals" => Query::term(name, require_value(value, name, operator)?.clone()),
            "notEquals" => Query::not(Query::term(
                name,
                require_value(value, name, operator)?.clone(),
            )),
            "greaterThan" => Query::range(name)
                .gt(require_value(value, name, operator)?.clone())
                .build(),
            "greaterThanOrEqualTo" => Query::range(name)
                .gte(require_value(value, name, operator)?.clone())
                .build(),
            "lessThan" => Query::range(name)
                .lt(require_value(value, name, operator)?.clone())
                .build(),
            "lessThanOrEqualTo" => Query::range(name)
                .lte(require_value(value, name, operator)?.clone())
                .build(),
            "between" => {
                let bounds = require_values(values, name, operator)?;
                if bounds.len() != 2 {
                    return Err(QueryError::InvalidParameter(format!(
                        "Operator 'between' on property '{}' requires exactly 2 values, got {}",
                        name,
                        bounds.len()
                    )));
                }
                Query::range(name)
                    .gte(bounds[0].clone())
                    .lte(bounds[1].clone())
                    .build()
            }
            "exists" => Query::exists(name),
            "missing" => Query::not(Query::exists(name)),
            "contains" => {
                let text = require_text(text, name, operator)?;
                Query::regexp(name, format!(".*{}.*", text))
            }
            "notContains" => {
                let text = require_text(text, name, operator)?;
                Query::not(Query::regexp(name, format!(".*{}.*", text)))
            }
            "startsWith" => Query::prefix(name, require_text(text, name, operator)?),
            "endsWith" => {
                let text = require_text(text, name, operator)?;
                Query::regexp(name, format!(".*{}", text))
            }
            "matchesRegex" => Query::regexp(name, require_text(text, name, operator)?),
            "in" => Query::terms(name, require_values(values, name, operator)?.to_vec()),
            "notIn" => Query::not(Query::terms(
                name,
                require_values(values, name, operator)?.to_vec(),
            )),
            "all" => {
                let mut bool_query = Query::bool();
                for value in require_values(values, name, operator)? {
                    bool_query = bool_query.must(Query::term(name, value.clone()));
                }
                bool_query.build()
            }
            "inContains" => {
                let mut bool_query = Query::bool();
                for value in require_values(values, name, operator)? {
                    bool_query = bool_query.should(Query::regexp(
                        name,
                        format!(".*{}.*", value.to_display_string()),
                    ));
                }
                bool_query.build()
            }
            "hasSomeOf" => {
                let mut bool_query = Query::bool();
                for value in require_values(values, name, operator)? {
                    bool_query = bool_query.should(Query::term(name, value.clone()));
                }
                bool_query.build()
            }
            "hasNoneOf" => {
                let mut bool_query = Query::bool();
                for value in require_values(values, name, operator)? {
                    bool_query = bool_query.must_not(Query::term(name, value.clone()));
                }
                bool_query.build()
            }
            "isDay" => day_range(require_value(value, name, operator)?, name)?,
            "isNotDay" => Query::not(day_range(require_value(value, name, operator)?, name)?),
            "distance" => geo_distance(condition, name)?,
            other => return Err(QueryError::UnsupportedOperator(other.to_string())),
        };
        Ok(Some(query))
    }
}

fn single_value(condition: &Condition) -> Option<&ParamValue> {
    first_non_null([
        condition.parameter("propertyValue"),
        condition.parameter("propertyValueInteger"),
        condition.parameter("propertyValueDouble"),
        condition.parameter("propertyValueDate"),
        condition.parameter("propertyValueDateExpr"),
    ])
}

fn multi_values(condition: &Condition) -> Option<&[ParamValue]> {
    first_non_null([
        condition.parameter("propertyValues"),
        condition.parameter("propertyValuesInteger"),
        condition.parameter("propertyValuesDouble"),
        condition.parameter("propertyValuesDate"),
        condition.parameter("propertyValuesDateExpr"),
    ])
    .and_then(ParamValue::as_list)
}

fn require_value<'a>(
    value: Option<&'a ParamValue>,
    name: &str,
    operator: &str,
) -> Result<&'a ParamValue> {
    value.ok_or_else(|| {
        QueryError::InvalidParameter(format!(
            "Missing value for condition using comparisonOperator '{}' on property '{}'",
            operator, name
        ))
    })
}

fn require_values<'a>(
    values: Option<&'a [ParamValue]>,
    name: &str,
    operator: &str,
) -> Result<&'a [ParamValue]> {
    values.ok_or_else(|| {
        QueryError::InvalidParameter(format!(
            "Missing values for condition using comparisonOperator '{}' on property '{}'",
            operator, name
        ))
    })
}

fn require_text<'a>(text: Option<&'a str>, name: &str, operator: &str) -> Result<&'a str> {
    text.ok_or_else(|| {
        QueryError::InvalidParameter(format!(
            "Missing string value for condition using comparisonOperator '{}' on property '{}'",
            operator, name
        ))
    })
}

/// Truncates the value to its day and builds the half-open day range,
/// `[midnight, next midnight)`, matching the calendar-day comparison the
/// in-memory evaluator performs.
fn day_range(value: &ParamValue, name: &str) -> Result<Query> {
    let date = value.to_date().ok_or_else(|| {
        QueryError::InvalidParameter(format!(
            "Value for isDay on property '{}' is not a date",
            name
        ))
    })?;
    let day_start = Utc.from_utc_datetime(
        &date
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time"),
    );
    let next_day_start = day_start + Duration::days(1);
    Ok(Query::range(name)
        .gte(day_start)
        .lt(next_day_start)
        .build())
}

fn geo_distance(condition: &Condition, name: &str) -> Result<Query> {
    let center = match condition.parameter("center") {
        Some(ParamValue::String(s)) => GeoPoint::parse(s),
        Some(ParamValue::Map(m)) => {
            let lat = m.get("lat").and_then(ParamValue::as_f64);
            let lon = m.get("lon").and_then(ParamValue::as_f64);
            lat.zip(lon).map(|(lat, lon)| GeoPoint::new(lat, lon))
        }
        _ => None,
    }
    .ok_or_else(|| missing_parameter(condition, "center"))?;
    let distance = condition
        .parameter("distance")
        .and_then(ParamValue::as_f64)
        .ok_or_else(|| missing_parameter(condition, "distance"))?;
    let unit = match condition.string_parameter("unit") {
        Some(unit) => DistanceUnit::parse(unit)
            .ok_or_else(|| QueryError::InvalidParameter(format!("Unknown distance unit '{}'", unit)))?,
        None => DistanceUnit::default(),
    };

    Ok(Query::GeoDistance {
        field: name.to_string(),
        center,
        distance,
        unit,
    })
}
