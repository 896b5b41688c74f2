//! Id membership evaluator

use super::missing_parameter;
use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use cohort_core::item::Item;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

pub struct IdsConditionEvaluator;

impl ConditionEvaluator for IdsConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let ids = condition
            .parameter("ids")
            .and_then(ParamValue::as_list)
            .ok_or_else(|| missing_parameter(condition, "ids"))?;
        let matching = condition
            .parameter("match")
            .and_then(ParamValue::as_bool)
            .unwrap_or(true);

        let contained = ids.iter().any(|id| id.as_str() == Some(item.item_id()));
        Ok(contained == matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::condition::ConditionBuilder;
    use cohort_core::item::Profile;
    use cohort_core::DefinitionsService;

    #[test]
    fn membership_and_exclusion() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
        let p1 = Profile::new("p1");
        let p3 = Profile::new("p3");

        let included = builder.ids(vec!["p1".into(), "p2".into()], true);
        assert!(dispatcher.eval(&included, &p1).unwrap());
        assert!(!dispatcher.eval(&included, &p3).unwrap());

        let excluded = builder.ids(vec!["p1".into(), "p2".into()], false);
        assert!(!dispatcher.eval(&excluded, &p1).unwrap());
        assert!(dispatcher.eval(&excluded, &p3).unwrap());
    }
}
