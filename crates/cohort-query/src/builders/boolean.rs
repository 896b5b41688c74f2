//! Boolean combinator builder

use super::missing_parameter;
use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::{QueryError, Result};
use crate::query::Query;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;
use tracing::info;

/// Builds `and`/`or` over a sequence of sub-conditions.
///
/// A single sub-condition bypasses the combinator entirely. For `and`,
/// pure range sub-queries go into the filter clause, everything else into
/// must; the two are logically identical. Sub-conditions that do not apply
/// in the current context are skipped.
pub struct BooleanConditionQueryBuilder;

impl ConditionQueryBuilder for BooleanConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        let operator = condition
            .string_parameter("operator")
            .ok_or_else(|| missing_parameter(condition, "operator"))?
            .to_lowercase();
        if operator != "and" && operator != "or" {
            return Err(QueryError::InvalidParameter(format!(
                "Boolean condition operator must be 'and' or 'or', got '{}'",
                operator
            )));
        }

        let sub_conditions = condition
            .parameter("subConditions")
            .and_then(ParamValue::as_list)
            .ok_or_else(|| missing_parameter(condition, "subConditions"))?;

        let mut built = Vec::with_capacity(sub_conditions.len());
        for sub in sub_conditions {
            let sub = sub.as_condition().ok_or_else(|| {
                QueryError::InvalidParameter(
                    "subConditions entries must be conditions".to_string(),
                )
            })?;
            match dispatcher.build_filter_with_context(sub, context)? {
                Some(query) => built.push(query),
                None => {
                    info!(
                        condition_type = %sub.condition_type_id,
                        "sub-condition did not apply, skipping"
                    );
                }
            }
        }

        if built.len() == 1 {
            return Ok(built.pop());
        }

        let mut bool_query = Query::bool();
        for query in built {
            bool_query = if operator == "and" {
                if query.is_pure_range() {
                    bool_query.filter(query)
                } else {
                    bool_query.must(query)
                }
            } else {
                bool_query.should(query)
            };
        }
        Ok(Some(bool_query.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::condition::ConditionBuilder;
    use cohort_core::DefinitionsService;

    fn build(condition: &Condition) -> Query {
        ConditionQueryDispatcher::with_default_builders()
            .build_filter(condition)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn single_sub_condition_bypasses_combinator() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder.and(vec![builder
            .profile_property("properties.country")
            .equal_to("DE")
            .build()]);

        assert_eq!(build(&condition), Query::term("properties.country", "DE"));
    }

    #[test]
    fn and_splits_pure_ranges_into_filter() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder.and(vec![
            builder
                .profile_property("properties.age")
                .between_integers(18, 35)
                .build(),
            builder
                .profile_property("properties.country")
                .equal_to("DE")
                .build(),
        ]);

        match build(&condition) {
            Query::Bool(bool_query) => {
                assert_eq!(bool_query.filter.len(), 1);
                assert!(bool_query.filter[0].is_pure_range());
                assert_eq!(bool_query.must.len(), 1);
                assert!(bool_query.should.is_empty());
            }
            other => panic!("expected bool query, got {:?}", other),
        }
    }

    #[test]
    fn or_collects_should_clauses() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let condition = builder.or(vec![
            builder
                .profile_property("properties.country")
                .equal_to("DE")
                .build(),
            builder
                .profile_property("properties.country")
                .equal_to("FR")
                .build(),
        ]);

        match build(&condition) {
            Query::Bool(bool_query) => {
                assert_eq!(bool_query.should.len(), 2);
                assert!(bool_query.must.is_empty());
            }
            other => panic!("expected bool query, got {:?}", other),
        }
    }

    #[test]
    fn inapplicable_sub_conditions_are_skipped() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        // The unresolved parameter:: placeholder drops the first clause.
        let condition = builder.or(vec![
            builder
                .profile_property("properties.country")
                .comparison("equals")
                .string_value("parameter::country")
                .build(),
            builder
                .profile_property("properties.city")
                .equal_to("Berlin")
                .build(),
        ]);

        let dispatcher = ConditionQueryDispatcher::with_default_builders();
        let mut context = HashMap::from([("unrelated".to_string(), ParamValue::Integer(1))]);
        let query = dispatcher
            .build_filter_with_context(&condition, &mut context)
            .unwrap()
            .unwrap();
        assert_eq!(query, Query::term("properties.city", "Berlin"));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let service = DefinitionsService::with_standard_types();
        let builder = ConditionBuilder::new(&service);
        let mut condition = builder.and(vec![builder.match_all()]);
        condition.set_parameter("operator", "xor");
        let dispatcher = ConditionQueryDispatcher::with_default_builders();
        assert!(matches!(
            dispatcher.build_filter(&condition),
            Err(QueryError::InvalidParameter(_))
        ));
    }
}
