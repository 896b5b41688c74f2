//! Negation evaluator

use super::missing_parameter;
use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use cohort_core::item::Item;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

pub struct NotConditionEvaluator;

impl ConditionEvaluator for NotConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let sub_condition = condition
            .parameter("subCondition")
            .and_then(ParamValue::as_condition)
            .ok_or_else(|| missing_parameter(condition, "subCondition"))?;
        Ok(!dispatcher.eval_with_context(sub_condition, item, context)?)
    }
}
