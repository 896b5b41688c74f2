//! Boolean combinator evaluator

use super::missing_parameter;
use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::{EvalError, Result};
use cohort_core::item::Item;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

/// Short-circuiting AND/OR over sub-conditions, evaluated in sequence
/// order. An empty AND holds, an empty OR does not.
pub struct BooleanConditionEvaluator;

impl ConditionEvaluator for BooleanConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let is_and = match condition
            .string_parameter("operator")
            .ok_or_else(|| missing_parameter(condition, "operator"))?
        {
            "and" => true,
            "or" => false,
            other => {
                return Err(EvalError::InvalidParameter(format!(
                    "Unknown boolean operator '{}'",
                    other
                )))
            }
        };
        let sub_conditions = condition
            .parameter("subConditions")
            .and_then(ParamValue::as_list)
            .ok_or_else(|| missing_parameter(condition, "subConditions"))?;

        for sub in sub_conditions {
            let sub = sub.as_condition().ok_or_else(|| {
                EvalError::InvalidParameter("subConditions entries must be conditions".to_string())
            })?;
            let matched = dispatcher.eval_with_context(sub, item, context)?;
            if matched != is_and {
                return Ok(matched);
            }
        }
        Ok(is_and)
    }
}
