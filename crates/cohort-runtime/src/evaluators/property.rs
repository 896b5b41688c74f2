//! Property comparison evaluator
//!
//! In-memory twin of the property query builder: the same operator table,
//! applied to a live item instead of compiled to a backend query. Values
//! are coerced before comparison: dates compare as instants (date-math
//! expressions included), numbers numerically, everything else as strings.
//!
//! A property the item does not carry satisfies only `missing`; every
//! other operator evaluates to `false` on an absent value.

use super::missing_parameter;
use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::{EvalError, Result};
use cohort_core::item::Item;
use cohort_core::types::value::first_non_null;
use cohort_core::{Condition, ParamValue};
use cohort_query::{DistanceUnit, GeoPoint};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::slice;

pub struct PropertyConditionEvaluator;

impl ConditionEvaluator for PropertyConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let operator = condition
            .string_parameter("comparisonOperator")
            .ok_or_else(|| missing_parameter(condition, "comparisonOperator"))?;
        let name = condition
            .string_parameter("propertyName")
            .ok_or_else(|| missing_parameter(condition, "propertyName"))?;

        let actual = item.property(name).filter(|value| !value.is_null());
        match operator {
            "missing" => return Ok(actual.is_none()),
            "exists" => return Ok(actual.is_some()),
            _ => {}
        }
        let actual = match actual {
            Some(actual) => actual,
            None => return Ok(false),
        };

        let expected = single_expected(condition);
        let expected_values = multi_expected(condition);

        let matched = match operator {
            "equals" => equals_any(&actual, require_expected(expected, name, operator)?),
            "notEquals" => !equals_any(&actual, require_expected(expected, name, operator)?),
            "greaterThan" => ordered(
                &actual,
                require_expected(expected, name, operator)?,
                &[Ordering::Greater],
            ),
            "greaterThanOrEqualTo" => ordered(
                &actual,
                require_expected(expected, name, operator)?,
                &[Ordering::Greater, Ordering::Equal],
            ),
            "lessThan" => ordered(
                &actual,
                require_expected(expected, name, operator)?,
                &[Ordering::Less],
            ),
            "lessThanOrEqualTo" => ordered(
                &actual,
                require_expected(expected, name, operator)?,
                &[Ordering::Less, Ordering::Equal],
            ),
            "between" => {
                let bounds = require_expected_values(expected_values, name, operator)?;
                if bounds.len() != 2 {
                    return Err(EvalError::InvalidParameter(format!(
                        "Operator 'between' on property '{}' requires exactly 2 values, got {}",
                        name,
                        bounds.len()
                    )));
                }
                ordered(&actual, &bounds[0], &[Ordering::Greater, Ordering::Equal])
                    && ordered(&actual, &bounds[1], &[Ordering::Less, Ordering::Equal])
            }
            "contains" => {
                let expected = require_expected(expected, name, operator)?;
                match &actual {
                    ParamValue::List(elements) => {
                        elements.iter().any(|element| values_equal(element, expected))
                    }
                    scalar => scalar
                        .to_display_string()
                        .contains(&expected.to_display_string()),
                }
            }
            "notContains" => {
                let expected = require_expected(expected, name, operator)?;
                !actual
                    .to_display_string()
                    .contains(&expected.to_display_string())
            }
            "startsWith" => actual.to_display_string().starts_with(
                &require_expected(expected, name, operator)?.to_display_string(),
            ),
            "endsWith" => actual.to_display_string().ends_with(
                &require_expected(expected, name, operator)?.to_display_string(),
            ),
            "matchesRegex" => {
                let pattern = require_expected(expected, name, operator)?.to_display_string();
                let regex = Regex::new(&pattern).map_err(|e| {
                    EvalError::InvalidParameter(format!("Invalid regex '{}': {}", pattern, e))
                })?;
                regex.is_match(&actual.to_display_string())
            }
            "in" | "hasSomeOf" => intersects(
                &actual,
                require_expected_values(expected_values, name, operator)?,
            ),
            "notIn" | "hasNoneOf" => !intersects(
                &actual,
                require_expected_values(expected_values, name, operator)?,
            ),
            "all" => {
                // Every actual value must appear among the expected ones.
                let expected = require_expected_values(expected_values, name, operator)?;
                as_values(&actual)
                    .iter()
                    .all(|a| expected.iter().any(|e| values_equal(a, e)))
            }
            "inContains" => {
                let expected = require_expected_values(expected_values, name, operator)?;
                let haystack = actual.to_display_string();
                expected
                    .iter()
                    .any(|e| haystack.contains(&e.to_display_string()))
            }
            "isDay" => same_day(&actual, require_expected(expected, name, operator)?, name)?,
            "isNotDay" => !same_day(&actual, require_expected(expected, name, operator)?, name)?,
            "distance" => within_distance(condition, &actual)?,
            other => return Err(EvalError::UnsupportedOperator(other.to_string())),
        };
        Ok(matched)
    }
}

fn single_expected(condition: &Condition) -> Option<&ParamValue> {
    first_non_null([
        condition.parameter("propertyValue"),
        condition.parameter("propertyValueInteger"),
        condition.parameter("propertyValueDouble"),
        condition.parameter("propertyValueDate"),
        condition.parameter("propertyValueDateExpr"),
    ])
}

fn multi_expected(condition: &Condition) -> Option<&[ParamValue]> {
    first_non_null([
        condition.parameter("propertyValues"),
        condition.parameter("propertyValuesInteger"),
        condition.parameter("propertyValuesDouble"),
        condition.parameter("propertyValuesDate"),
        condition.parameter("propertyValuesDateExpr"),
    ])
    .and_then(ParamValue::as_list)
}

fn require_expected<'a>(
    expected: Option<&'a ParamValue>,
    name: &str,
    operator: &str,
) -> Result<&'a ParamValue> {
    expected.ok_or_else(|| {
        EvalError::InvalidParameter(format!(
            "Missing value for condition using comparisonOperator '{}' on property '{}'",
            operator, name
        ))
    })
}

fn require_expected_values<'a>(
    expected: Option<&'a [ParamValue]>,
    name: &str,
    operator: &str,
) -> Result<&'a [ParamValue]> {
    expected.ok_or_else(|| {
        EvalError::InvalidParameter(format!(
            "Missing values for condition using comparisonOperator '{}' on property '{}'",
            operator, name
        ))
    })
}

/// Coercing comparison: instants when either side is a date, numbers when
/// either side is numeric, strings otherwise.
fn compare(actual: &ParamValue, expected: &ParamValue) -> Option<Ordering> {
    if matches!(actual, ParamValue::Date(_)) || matches!(expected, ParamValue::Date(_)) {
        return Some(actual.to_date()?.cmp(&expected.to_date()?));
    }
    if matches!(actual, ParamValue::Integer(_) | ParamValue::Float(_))
        || matches!(expected, ParamValue::Integer(_) | ParamValue::Float(_))
    {
        return actual.as_f64()?.partial_cmp(&expected.as_f64()?);
    }
    Some(actual.to_display_string().cmp(&expected.to_display_string()))
}

fn values_equal(actual: &ParamValue, expected: &ParamValue) -> bool {
    compare(actual, expected) == Some(Ordering::Equal)
}

fn ordered(actual: &ParamValue, expected: &ParamValue, accepted: &[Ordering]) -> bool {
    compare(actual, expected).is_some_and(|ordering| accepted.contains(&ordering))
}

fn equals_any(actual: &ParamValue, expected: &ParamValue) -> bool {
    as_values(actual)
        .iter()
        .any(|element| values_equal(element, expected))
}

/// A scalar acts as a single-element sequence for the multivalue operators.
fn as_values(value: &ParamValue) -> &[ParamValue] {
    match value {
        ParamValue::List(elements) => elements,
        scalar => slice::from_ref(scalar),
    }
}

fn intersects(actual: &ParamValue, expected: &[ParamValue]) -> bool {
    as_values(actual)
        .iter()
        .any(|a| expected.iter().any(|e| values_equal(a, e)))
}

fn same_day(actual: &ParamValue, expected: &ParamValue, name: &str) -> Result<bool> {
    let expected = expected.to_date().ok_or_else(|| {
        EvalError::InvalidParameter(format!(
            "Value for isDay on property '{}' is not a date",
            name
        ))
    })?;
    Ok(actual
        .to_date()
        .is_some_and(|actual| actual.date_naive() == expected.date_naive()))
}

fn within_distance(condition: &Condition, actual: &ParamValue) -> Result<bool> {
    let position = match actual {
        ParamValue::String(s) => GeoPoint::parse(s),
        ParamValue::Map(m) => {
            let lat = m.get("lat").and_then(ParamValue::as_f64);
            let lon = m.get("lon").and_then(ParamValue::as_f64);
            lat.zip(lon).map(|(lat, lon)| GeoPoint::new(lat, lon))
        }
        _ => None,
    };
    let position = match position {
        Some(position) => position,
        None => return Ok(false),
    };

    let center = condition
        .string_parameter("center")
        .and_then(GeoPoint::parse)
        .ok_or_else(|| missing_parameter(condition, "center"))?;
    let distance = condition
        .parameter("distance")
        .and_then(ParamValue::as_f64)
        .ok_or_else(|| missing_parameter(condition, "distance"))?;
    let unit = match condition.string_parameter("unit") {
        Some(unit) => DistanceUnit::parse(unit).ok_or_else(|| {
            EvalError::InvalidParameter(format!("Unknown distance unit '{}'", unit))
        })?,
        None => DistanceUnit::default(),
    };

    Ok(haversine_meters(&position, &center) <= unit.to_meters(distance))
}

fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let half_dlat = (lat2 - lat1) / 2.0;
    let half_dlon = (b.lon - a.lon).to_radians() / 2.0;
    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cohort_core::condition::ConditionBuilder;
    use cohort_core::item::{Event, Profile};
    use cohort_core::DefinitionsService;

    fn eval(condition: &Condition, item: &dyn Item) -> Result<bool> {
        let mut context = HashMap::new();
        ConditionEvaluatorDispatcher::with_default_evaluators().eval_with_context(
            condition,
            item,
            &mut context,
        )
    }

    #[test]
    fn equals_coerces_numeric_types() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let profile = Profile::new("p1").with_property("age", 30.0);

        let condition = builder
            .profile_property("properties.age")
            .equal_to_integer(30)
            .build();
        assert!(eval(&condition, &profile).unwrap());
    }

    #[test]
    fn missing_property_satisfies_only_missing() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let profile = Profile::new("p1");

        assert!(eval(
            &builder.profile_property("properties.country").missing().build(),
            &profile
        )
        .unwrap());
        assert!(!eval(
            &builder.profile_property("properties.country").exists().build(),
            &profile
        )
        .unwrap());
        assert!(!eval(
            &builder
                .profile_property("properties.country")
                .equal_to("DE")
                .build(),
            &profile
        )
        .unwrap());
    }

    #[test]
    fn between_is_inclusive_on_both_ends() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder
            .profile_property("properties.age")
            .between_integers(18, 35)
            .build();

        assert!(eval(&condition, &Profile::new("p").with_property("age", 18i64)).unwrap());
        assert!(eval(&condition, &Profile::new("p").with_property("age", 35i64)).unwrap());
        assert!(!eval(&condition, &Profile::new("p").with_property("age", 36i64)).unwrap());
    }

    #[test]
    fn date_comparison_supports_date_math_expressions() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder
            .session_property("timeStamp")
            .comparison("greaterThan")
            .date_expr_value("now-1d")
            .build();

        let mut recent = cohort_core::item::Session::new("s1", "p1");
        recent.time_stamp = Some(Utc::now());
        assert!(eval(&condition, &recent).unwrap());

        let mut stale = cohort_core::item::Session::new("s2", "p1");
        stale.time_stamp = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert!(!eval(&condition, &stale).unwrap());
    }

    #[test]
    fn multivalue_operators_over_segments() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let profile = Profile::new("p1").with_segment("vip").with_segment("beta");

        let some_of = |values: Vec<&str>| {
            builder
                .profile_property("segments")
                .comparison("hasSomeOf")
                .build()
                .with_parameter(
                    "propertyValues",
                    ParamValue::List(values.into_iter().map(ParamValue::from).collect()),
                )
        };
        assert!(eval(&some_of(vec!["vip", "other"]), &profile).unwrap());
        assert!(!eval(&some_of(vec!["other"]), &profile).unwrap());

        // `all`: every actual segment must be listed.
        let all = builder
            .profile_property("segments")
            .comparison("all")
            .build()
            .with_parameter(
                "propertyValues",
                ParamValue::List(vec![
                    ParamValue::from("vip"),
                    ParamValue::from("beta"),
                    ParamValue::from("extra"),
                ]),
            );
        assert!(eval(&all, &profile).unwrap());

        let not_all = builder
            .profile_property("segments")
            .comparison("all")
            .build()
            .with_parameter(
                "propertyValues",
                ParamValue::List(vec![ParamValue::from("vip")]),
            );
        assert!(!eval(&not_all, &profile).unwrap());
    }

    #[test]
    fn string_operators() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let event = Event::new("e1", "view", "p1").with_property("pagePath", "/products/shoes");

        let starts = builder
            .event_property("properties.pagePath")
            .comparison("startsWith")
            .string_value("/products")
            .build();
        assert!(eval(&starts, &event).unwrap());

        let contains = builder
            .event_property("properties.pagePath")
            .comparison("contains")
            .string_value("shoe")
            .build();
        assert!(eval(&contains, &event).unwrap());

        let regex = builder
            .event_property("properties.pagePath")
            .comparison("matchesRegex")
            .string_value("^/products/[a-z]+$")
            .build();
        assert!(eval(&regex, &event).unwrap());
    }

    #[test]
    fn is_day_matches_the_calendar_day() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder
            .session_property("timeStamp")
            .comparison("isDay")
            .date_value(Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap())
            .build();

        let mut same = cohort_core::item::Session::new("s1", "p1");
        same.time_stamp = Some(Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap());
        assert!(eval(&condition, &same).unwrap());

        let mut other = cohort_core::item::Session::new("s2", "p1");
        other.time_stamp = Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 1).unwrap());
        assert!(!eval(&condition, &other).unwrap());
    }

    #[test]
    fn distance_within_radius() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        // Notre-Dame to the Louvre is roughly 2.5 km.
        let profile = Profile::new("p1").with_property("location", "48.8530, 2.3499");
        let condition = builder
            .profile_property("properties.location")
            .comparison("distance")
            .build()
            .with_parameter("center", "48.8606, 2.3376")
            .with_parameter("distance", 5.0);
        assert!(eval(&condition, &profile).unwrap());

        let condition = condition.with_parameter("distance", 1.0);
        assert!(!eval(&condition, &profile).unwrap());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder
            .profile_property("properties.country")
            .comparison("resembles")
            .string_value("DE")
            .build();
        let profile = Profile::new("p1").with_property("country", "DE");
        assert!(matches!(
            eval(&condition, &profile),
            Err(EvalError::UnsupportedOperator(_))
        ));
    }
}
