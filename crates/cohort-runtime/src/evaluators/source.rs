//! Event source evaluator

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use cohort_core::item::Item;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

/// Matches events against source metadata parameters. `"*"` is a
/// wildcard; an absent parameter does not constrain. All present
/// non-wildcard parameters must match.
pub struct SourceEventPropertyConditionEvaluator;

const SOURCE_FIELDS: &[(&str, &str)] = &[
    ("id", "source.itemId"),
    ("path", "source.path"),
    ("scope", "source.scope"),
    ("url", "source.properties.url"),
];

impl ConditionEvaluator for SourceEventPropertyConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        for (parameter, field) in SOURCE_FIELDS {
            if let Some(expected) = condition.string_parameter(parameter) {
                if expected == "*" {
                    continue;
                }
                let matches = item
                    .property(field)
                    .and_then(|actual| actual.as_str().map(|actual| actual == expected))
                    .unwrap_or(false);
                if !matches {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
