//! Past event occurrence builder
//!
//! Selects profiles by how many times a given event happened for them in a
//! time window. Two strategies:
//!
//! * fast path, when the condition carries its generated counter key: the
//!   per-profile counter maintained under `systemProperties.pastEvents` is
//!   range-checked directly, no event scan needed;
//! * slow path: the event condition is compiled and a per-profile terms
//!   aggregation collects the profile ids whose event count falls in the
//!   requested bounds, partitioned when the distinct profile cardinality
//!   exceeds one aggregation bucket.
//!
//! Partition buckets are consumed in backend order and scanning stops at
//! the first bucket below the minimum count, which assumes buckets sorted
//! descending by count.

use super::missing_parameter;
use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::{QueryError, Result};
use crate::persistence::{PersistenceService, TermsAggregate};
use crate::query::Query;
use cohort_core::condition::builder::ConditionBuilder;
use cohort_core::context::{contextual_condition, ScriptExecutor};
use cohort_core::registry::DefinitionsService;
use cohort_core::{Condition, Event, ParamValue, Profile};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

const PAST_EVENTS_PROPERTY_PREFIX: &str = "systemProperties.pastEvents.";
const PROFILE_ID_FIELD: &str = "profileId";
const PROFILE_ID_AGGREGATE_FIELD: &str = "profileId.keyword";
/// Synthetic bucket emitted by some backends for out-of-partition terms.
const FILTERED_BUCKET_KEY: &str = "_filtered";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    EventsOccurred,
    EventsNotOccurred,
}

pub struct PastEventConditionQueryBuilder {
    definitions: Arc<DefinitionsService>,
    persistence: Arc<dyn PersistenceService>,
    script_executor: Arc<dyn ScriptExecutor>,
    maximum_ids_query_count: usize,
    aggregate_query_bucket_size: u64,
    partitions_disabled: bool,
}

impl PastEventConditionQueryBuilder {
    pub fn new(
        definitions: Arc<DefinitionsService>,
        persistence: Arc<dyn PersistenceService>,
        script_executor: Arc<dyn ScriptExecutor>,
    ) -> Self {
        Self {
            definitions,
            persistence,
            script_executor,
            maximum_ids_query_count: 5000,
            aggregate_query_bucket_size: 5000,
            partitions_disabled: false,
        }
    }

    pub fn with_maximum_ids_query_count(mut self, count: usize) -> Self {
        self.maximum_ids_query_count = count;
        self
    }

    pub fn with_aggregate_query_bucket_size(mut self, size: u64) -> Self {
        self.aggregate_query_bucket_size = size;
        self
    }

    pub fn with_partitions_disabled(mut self, disabled: bool) -> Self {
        self.partitions_disabled = disabled;
        self
    }

    fn strategy(condition: &Condition) -> Result<Strategy> {
        match condition.string_parameter("operator").unwrap_or("eventsOccurred") {
            "eventsOccurred" => Ok(Strategy::EventsOccurred),
            "eventsNotOccurred" => Ok(Strategy::EventsNotOccurred),
            other => Err(QueryError::UnsupportedOperator(other.to_string())),
        }
    }

    fn count_bounds(condition: &Condition) -> (i64, i64) {
        let minimum = condition
            .parameter("minimumEventCount")
            .and_then(ParamValue::as_i64)
            .unwrap_or(1);
        let maximum = condition
            .parameter("maximumEventCount")
            .and_then(ParamValue::as_i64)
            .unwrap_or(i64::MAX);
        (minimum, maximum)
    }

    /// Stable key under which segment recalculation stores the per-profile
    /// event counter. Derived from the event condition and the time window,
    /// so a changed window gets a fresh counter.
    ///
    /// The event condition is hashed in its canonical sorted-key JSON form;
    /// structurally equal conditions produce the same key no matter how
    /// their parameter maps were populated.
    pub fn generated_property_key(condition: &Condition) -> Result<String> {
        let event_condition = condition
            .parameter("eventCondition")
            .and_then(ParamValue::as_condition)
            .ok_or_else(|| missing_parameter(condition, "eventCondition"))?;
        let serialized = serde_json::to_value(event_condition)
            .map_err(|e| QueryError::InvalidParameter(format!("unserializable eventCondition: {e}")))?
            .to_string();

        let mut hasher = DefaultHasher::new();
        serialized.hash(&mut hasher);
        condition
            .parameter("numberOfDays")
            .and_then(ParamValue::as_i64)
            .hash(&mut hasher);
        condition.string_parameter("fromDate").hash(&mut hasher);
        condition.string_parameter("toDate").hash(&mut hasher);
        Ok(format!("eventTriggered{:x}", hasher.finish()))
    }

    /// True when the condition carries the counter key it would hash to,
    /// meaning the counter property is being maintained for it.
    fn has_precomputed_counter(condition: &Condition) -> bool {
        match condition.string_parameter("generatedPropertyKey") {
            Some(key) => Self::generated_property_key(condition)
                .map(|computed| computed == key)
                .unwrap_or(false),
            None => false,
        }
    }

    fn counter_condition(&self, condition: &Condition, strategy: Strategy) -> Result<Condition> {
        let key = Self::generated_property_key(condition)?;
        let property = format!("{PAST_EVENTS_PROPERTY_PREFIX}{key}");
        let builder = ConditionBuilder::new(&self.definitions);
        let (minimum, maximum) = Self::count_bounds(condition);

        Ok(match strategy {
            Strategy::EventsOccurred => builder
                .profile_property(&property)
                .between_integers(minimum, maximum)
                .build(),
            // A never-counted profile has no counter property at all.
            Strategy::EventsNotOccurred => builder.or(vec![
                builder.profile_property(&property).missing().build(),
                builder.profile_property(&property).equal_to_integer(0).build(),
            ]),
        })
    }

    /// The event-scope condition for the slow path: the contextualized
    /// event condition constrained to the requested time window, optionally
    /// pinned to a single profile.
    fn event_scope_condition(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
        profile_id: Option<&str>,
    ) -> Result<Option<Condition>> {
        let event_condition = condition
            .parameter("eventCondition")
            .and_then(ParamValue::as_condition)
            .ok_or_else(|| missing_parameter(condition, "eventCondition"))?;
        let event_condition =
            match contextual_condition(event_condition, context, self.script_executor.as_ref()) {
                Some(contextual) => contextual,
                None => return Ok(None),
            };

        let builder = ConditionBuilder::new(&self.definitions);
        let mut sub_conditions = vec![event_condition];

        if let Some(profile_id) = profile_id {
            sub_conditions.push(
                builder
                    .event_property(PROFILE_ID_FIELD)
                    .equal_to(profile_id)
                    .build(),
            );
        }
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
                QueryError::InvalidParameter("fromDate is not a date".to_string())
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
                .ok_or_else(|| QueryError::InvalidParameter("toDate is not a date".to_string()))?;
            sub_conditions.push(
                builder
                    .event_property("timeStamp")
                    .comparison("lessThanOrEqualTo")
                    .date_value(to)
                    .build(),
            );
        }

        Ok(Some(if sub_conditions.len() == 1 {
            sub_conditions.remove(0)
        } else {
            builder.and(sub_conditions)
        }))
    }

    /// Profile ids whose matching event count falls within `[minimum,
    /// maximum]`, gathered from partitioned per-profile aggregations.
    /// Within a partition, scanning stops at the first bucket below the
    /// minimum.
    fn profile_ids_matching_event_count(
        &self,
        event_condition: &Condition,
        minimum: i64,
        maximum: i64,
    ) -> Result<Vec<String>> {
        if self.partitions_disabled {
            // Single capped aggregation, filtered locally with no ordering
            // assumption.
            let buckets = self.persistence.aggregate_with_optimized_query(
                event_condition,
                &TermsAggregate::new(PROFILE_ID_FIELD),
                Event::ITEM_TYPE,
                Some(self.aggregate_query_bucket_size as usize),
            )?;
            return Ok(buckets
                .into_iter()
                .filter(|(profile_id, count)| {
                    profile_id != FILTERED_BUCKET_KEY
                        && (*count as i64) >= minimum
                        && (*count as i64) <= maximum
                })
                .map(|(profile_id, _)| profile_id)
                .collect());
        }

        let metrics = self.persistence.get_single_values_metrics(
            event_condition,
            &["card"],
            PROFILE_ID_AGGREGATE_FIELD,
            Event::ITEM_TYPE,
        )?;
        let cardinality = metrics.get("_card").copied().unwrap_or(0.0) as u64;
        let num_partitions = cardinality / self.aggregate_query_bucket_size + 2;
        debug!(num_partitions, "aggregating past event counts per profile");

        let mut profile_ids = Vec::new();
        for partition in 0..num_partitions {
            let buckets = self.persistence.aggregate_with_optimized_query(
                event_condition,
                &TermsAggregate::partitioned(PROFILE_ID_FIELD, partition, num_partitions),
                Event::ITEM_TYPE,
                None,
            )?;
            for (profile_id, count) in buckets {
                if profile_id == FILTERED_BUCKET_KEY {
                    continue;
                }
                if (count as i64) < minimum {
                    break;
                }
                if (count as i64) <= maximum {
                    profile_ids.push(profile_id);
                }
            }
        }
        Ok(profile_ids)
    }

    fn matching_profile_ids(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
    ) -> Result<Option<Vec<String>>> {
        let event_condition = match self.event_scope_condition(condition, context, None)? {
            Some(event_condition) => event_condition,
            None => return Ok(None),
        };
        let (minimum, maximum) = Self::count_bounds(condition);
        let profile_ids = self.profile_ids_matching_event_count(&event_condition, minimum, maximum)?;
        if profile_ids.len() > self.maximum_ids_query_count {
            return Err(QueryError::UnsupportedOperation(format!(
                "too many profiles matched the past event condition: {} (limit {})",
                profile_ids.len(),
                self.maximum_ids_query_count
            )));
        }
        Ok(Some(profile_ids))
    }
}

impl ConditionQueryBuilder for PastEventConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        let strategy = Self::strategy(condition)?;

        if Self::has_precomputed_counter(condition) {
            let counter = self.counter_condition(condition, strategy)?;
            return dispatcher.build_filter_with_context(&counter, &mut HashMap::new());
        }

        match self.matching_profile_ids(condition, context)? {
            Some(profile_ids) => Ok(Some(Query::ids(
                profile_ids,
                strategy == Strategy::EventsOccurred,
            ))),
            None => Ok(None),
        }
    }

    fn count(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionQueryDispatcher,
    ) -> Result<u64> {
        let strategy = Self::strategy(condition)?;

        if Self::has_precomputed_counter(condition) {
            let counter = self.counter_condition(condition, strategy)?;
            return self.persistence.query_count(&counter, Profile::ITEM_TYPE);
        }

        let (minimum, maximum) = Self::count_bounds(condition);
        let occurred = if minimum == 1 && maximum == i64::MAX {
            // Distinct profiles with at least one matching event, no
            // aggregation scan needed.
            match self.event_scope_condition(condition, context, None)? {
                Some(event_condition) => {
                    let metrics = self.persistence.get_single_values_metrics(
                        &event_condition,
                        &["card"],
                        PROFILE_ID_AGGREGATE_FIELD,
                        Event::ITEM_TYPE,
                    )?;
                    metrics.get("_card").copied().unwrap_or(0.0) as u64
                }
                None => 0,
            }
        } else {
            match self.matching_profile_ids(condition, context)? {
                Some(profile_ids) => profile_ids.len() as u64,
                None => 0,
            }
        };

        match strategy {
            Strategy::EventsOccurred => Ok(occurred),
            Strategy::EventsNotOccurred => {
                let builder = ConditionBuilder::new(&self.definitions);
                let total = self
                    .persistence
                    .query_count(&builder.match_all(), Profile::ITEM_TYPE)?;
                Ok(total.saturating_sub(occurred))
            }
        }
    }
}
