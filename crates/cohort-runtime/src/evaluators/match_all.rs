//! Match-all evaluator

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use cohort_core::item::Item;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

pub struct MatchAllConditionEvaluator;

impl ConditionEvaluator for MatchAllConditionEvaluator {
    fn eval(
        &self,
        _condition: &Condition,
        _item: &dyn Item,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        Ok(true)
    }
}
