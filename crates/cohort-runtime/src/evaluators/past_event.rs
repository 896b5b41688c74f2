//! Past event occurrence evaluator
//!
//! Evaluated against profiles. When the condition carries its generated
//! counter key, the per-profile counter under `systemProperties.pastEvents`
//! is read off the profile directly. Otherwise the event store is asked to
//! count the profile's events matching the event condition within the
//! requested time window.

use super::missing_parameter;
use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::{EvalError, Result};
use cohort_core::condition::ConditionBuilder;
use cohort_core::context::{contextual_condition, ScriptExecutor};
use cohort_core::item::{Event, Item};
use cohort_core::registry::DefinitionsService;
use cohort_core::{Condition, ParamValue};
use cohort_query::builders::PastEventConditionQueryBuilder;
use cohort_query::PersistenceService;
use std::collections::HashMap;
use std::sync::Arc;

pub struct PastEventConditionEvaluator {
    definitions: Arc<DefinitionsService>,
    persistence: Arc<dyn PersistenceService>,
    script_executor: Arc<dyn ScriptExecutor>,
}

impl PastEventConditionEvaluator {
    pub fn new(
        definitions: Arc<DefinitionsService>,
        persistence: Arc<dyn PersistenceService>,
        script_executor: Arc<dyn ScriptExecutor>,
    ) -> Self {
        Self {
            definitions,
            persistence,
            script_executor,
        }
    }

    fn counted_events(
        &self,
        condition: &Condition,
        profile_id: &str,
        context: &mut HashMap<String, ParamValue>,
    ) -> Result<u64> {
        let event_condition = condition
            .parameter("eventCondition")
            .and_then(ParamValue::as_condition)
            .ok_or_else(|| missing_parameter(condition, "eventCondition"))?;
        let event_condition =
            match contextual_condition(event_condition, context, self.script_executor.as_ref()) {
                Some(contextual) => contextual,
                None => return Ok(0),
            };

        let builder = ConditionBuilder::new(&self.definitions);
        let mut sub_conditions = vec![
            event_condition,
            builder.event_property("profileId").equal_to(profile_id).build(),
        ];
        if let Some(days) = condition
            .parameter("numberOfDays")
            .and_then(ParamValue::as_i64)
        {
            sub_conditions.push(
                builder
                    .event_property("timeStamp")
                    .comparison("greaterThan")
                    .date_expr_value(&format!("now-{days}d"))
                    .build(),
            );
        }
        if let Some(from) = condition.parameter("fromDate") {
            let from = from.to_date().ok_or_else(|| {
                EvalError::InvalidParameter("fromDate is not a date".to_string())
            })?;
            sub_conditions.push(
                builder
                    .event_property("timeStamp")
                    .comparison("greaterThanOrEqualTo")
                    .date_value(from)
                    .build(),
            );
        }
        if let Some(to) = condition.parameter("toDate") {
            let to = to
                .to_date()
                .ok_or_else(|| EvalError::InvalidParameter("toDate is not a date".to_string()))?;
            sub_conditions.push(
                builder
                    .event_property("timeStamp")
                    .comparison("lessThanOrEqualTo")
                    .date_value(to)
                    .build(),
            );
        }

        let scoped = builder.and(sub_conditions);
        Ok(self.persistence.query_count(&scoped, Event::ITEM_TYPE)?)
    }
}

impl ConditionEvaluator for PastEventConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let occurred = match condition
            .string_parameter("operator")
            .unwrap_or("eventsOccurred")
        {
            "eventsOccurred" => true,
            "eventsNotOccurred" => false,
            other => return Err(EvalError::UnsupportedOperator(other.to_string())),
        };
        let minimum = condition
            .parameter("minimumEventCount")
            .and_then(ParamValue::as_i64)
            .unwrap_or(1);
        let maximum = condition
            .parameter("maximumEventCount")
            .and_then(ParamValue::as_i64)
            .unwrap_or(i64::MAX);

        let counter_key = match condition.string_parameter("generatedPropertyKey") {
            Some(key) => {
                let computed = PastEventConditionQueryBuilder::generated_property_key(condition)?;
                (computed == key).then_some(computed)
            }
            None => None,
        };
        let count = match counter_key {
            // Maintained counter on the profile, no event store round trip.
            Some(key) => item
                .property(&format!("systemProperties.pastEvents.{key}"))
                .and_then(|value| value.as_i64())
                .unwrap_or(0),
            None => self.counted_events(condition, item.item_id(), context)? as i64,
        };

        Ok(if occurred {
            count >= minimum && count <= maximum
        } else {
            count == 0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::item::Profile;
    use cohort_query::{PartialList, QueryError, TermsAggregate};
    use std::sync::Mutex;

    /// Event store stub answering counts and recording the conditions it
    /// was asked about.
    struct CountingStore {
        count: u64,
        seen: Mutex<Vec<Condition>>,
    }

    impl CountingStore {
        fn new(count: u64) -> Self {
            Self {
                count,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl PersistenceService for CountingStore {
        fn query(
            &self,
            _condition: &Condition,
            _sort_by: Option<&str>,
            _item_type: &str,
            _offset: usize,
            _size: usize,
        ) -> std::result::Result<PartialList, QueryError> {
            Ok(PartialList::default())
        }

        fn query_count(
            &self,
            condition: &Condition,
            item_type: &str,
        ) -> std::result::Result<u64, QueryError> {
            assert_eq!(item_type, Event::ITEM_TYPE);
            self.seen.lock().unwrap().push(condition.clone());
            Ok(self.count)
        }

        fn aggregate_with_optimized_query(
            &self,
            _condition: &Condition,
            _aggregate: &TermsAggregate,
            _item_type: &str,
            _max_buckets: Option<usize>,
        ) -> std::result::Result<Vec<(String, u64)>, QueryError> {
            Ok(Vec::new())
        }

        fn get_single_values_metrics(
            &self,
            _condition: &Condition,
            _metrics: &[&str],
            _field: &str,
            _item_type: &str,
        ) -> std::result::Result<HashMap<String, f64>, QueryError> {
            Ok(HashMap::new())
        }
    }

    fn past_event_condition(service: &DefinitionsService) -> Condition {
        let builder = ConditionBuilder::new(service);
        builder
            .condition("pastEventCondition")
            .with_parameter(
                "eventCondition",
                builder.event_property("eventType").equal_to("purchase").build(),
            )
            .with_parameter("numberOfDays", 30i64)
    }

    fn dispatcher_with(
        service: &Arc<DefinitionsService>,
        store: Arc<CountingStore>,
    ) -> ConditionEvaluatorDispatcher {
        let mut dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
        dispatcher.register_past_event_evaluator(service.clone(), store);
        dispatcher
    }

    #[test]
    fn counts_profile_events_against_the_store() {
        let service = Arc::new(DefinitionsService::with_standard_types());
        let store = Arc::new(CountingStore::new(3));
        let dispatcher = dispatcher_with(&service, store.clone());

        let condition = past_event_condition(&service).with_parameter("minimumEventCount", 2i64);
        let profile = Profile::new("p1");
        assert!(dispatcher.eval(&condition, &profile).unwrap());

        // The store was queried with the profile pinned in.
        let seen = store.seen.lock().unwrap();
        let serialized = serde_json::to_string(&seen[0]).unwrap();
        assert!(serialized.contains("profileId"));
        assert!(serialized.contains("p1"));
        assert!(serialized.contains("purchase"));
    }

    #[test]
    fn bounds_are_inclusive() {
        let service = Arc::new(DefinitionsService::with_standard_types());
        let dispatcher = dispatcher_with(&service, Arc::new(CountingStore::new(5)));

        let profile = Profile::new("p1");
        let condition = past_event_condition(&service)
            .with_parameter("minimumEventCount", 5i64)
            .with_parameter("maximumEventCount", 5i64);
        assert!(dispatcher.eval(&condition, &profile).unwrap());

        let condition = past_event_condition(&service).with_parameter("minimumEventCount", 6i64);
        assert!(!dispatcher.eval(&condition, &profile).unwrap());
    }

    #[test]
    fn events_not_occurred_requires_a_zero_count() {
        let service = Arc::new(DefinitionsService::with_standard_types());

        let profile = Profile::new("p1");
        let condition =
            past_event_condition(&service).with_parameter("operator", "eventsNotOccurred");

        let dispatcher = dispatcher_with(&service, Arc::new(CountingStore::new(0)));
        assert!(dispatcher.eval(&condition, &profile).unwrap());

        let dispatcher = dispatcher_with(&service, Arc::new(CountingStore::new(1)));
        assert!(!dispatcher.eval(&condition, &profile).unwrap());
    }

    #[test]
    fn precomputed_counter_reads_the_profile_property() {
        let service = Arc::new(DefinitionsService::with_standard_types());
        let store = Arc::new(CountingStore::new(99));
        let dispatcher = dispatcher_with(&service, store.clone());

        let condition = past_event_condition(&service).with_parameter("minimumEventCount", 2i64);
        let key = PastEventConditionQueryBuilder::generated_property_key(&condition).unwrap();
        let condition = condition.with_parameter("generatedPropertyKey", key.as_str());

        let profile = Profile::new("p1").with_system_property(
            "pastEvents",
            ParamValue::Map(HashMap::from([(key, ParamValue::Integer(4))])),
        );
        assert!(dispatcher.eval(&condition, &profile).unwrap());
        // The event store was never consulted.
        assert!(store.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_counter_property_counts_as_zero() {
        let service = Arc::new(DefinitionsService::with_standard_types());
        let dispatcher = dispatcher_with(&service, Arc::new(CountingStore::new(99)));

        let condition = past_event_condition(&service);
        let key = PastEventConditionQueryBuilder::generated_property_key(&condition).unwrap();
        let condition = condition
            .with_parameter("generatedPropertyKey", key.as_str())
            .with_parameter("operator", "eventsNotOccurred");

        let profile = Profile::new("p1");
        assert!(dispatcher.eval(&condition, &profile).unwrap());
    }
}
