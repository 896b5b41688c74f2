//! Negation builder

use super::missing_parameter;
use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::Result;
use crate::query::Query;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

/// Wraps the sub-condition's query in a `must_not` clause. If the
/// sub-condition does not apply, neither does the negation.
pub struct NotConditionQueryBuilder;

impl ConditionQueryBuilder for NotConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        let sub_condition = condition
            .parameter("subCondition")
            .and_then(ParamValue::as_condition)
            .ok_or_else(|| missing_parameter(condition, "subCondition"))?;

        Ok(dispatcher
            .build_filter_with_context(sub_condition, context)?
            .map(Query::not))
    }
}
