//! Query builder dispatch
//!
//! Routes a resolved condition to the query builder registered for its
//! terminal type. Parent-chained types are walked child to parent, each
//! level merging its own parameter values into the accumulated context
//! before the parent condition is dispatched in its place.

use crate::builders;
use crate::error::{QueryError, Result};
use crate::query::Query;
use cohort_core::context::{contextual_condition, ContextLookupExecutor, ScriptExecutor};
use cohort_core::registry::DefinitionsService;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A per-type query builder. Builders receive the dispatcher so they can
/// recursively compile their sub-conditions.
///
/// `build_query` returns `Ok(None)` when the condition cannot apply in the
/// current context (an unresolved contextual placeholder); callers exclude
/// such conditions rather than defaulting them.
pub trait ConditionQueryBuilder: Send + Sync {
    fn build_query(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>>;

    /// Direct count, for builders that can answer more efficiently than
    /// running the compiled query.
    fn count(
        &self,
        condition: &Condition,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionQueryDispatcher,
    ) -> Result<u64> {
        Err(QueryError::UnsupportedOperation(format!(
            "count is not supported by the query builder for '{}'",
            condition.condition_type_id
        )))
    }
}

/// Registry and entry point for query compilation.
pub struct ConditionQueryDispatcher {
    query_builders: HashMap<String, Arc<dyn ConditionQueryBuilder>>,
    script_executor: Arc<dyn ScriptExecutor>,
}

impl ConditionQueryDispatcher {
    pub fn new(script_executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            query_builders: HashMap::new(),
            script_executor,
        }
    }

    /// Dispatcher with the standard builders registered, matching the
    /// routing keys of [`DefinitionsService::with_standard_types`].
    pub fn with_default_builders() -> Self {
        let mut dispatcher = Self::new(Arc::new(ContextLookupExecutor));
        dispatcher.add_query_builder("booleanCondition", Arc::new(builders::BooleanConditionQueryBuilder));
        dispatcher.add_query_builder("notCondition", Arc::new(builders::NotConditionQueryBuilder));
        dispatcher.add_query_builder("matchAllCondition", Arc::new(builders::MatchAllConditionQueryBuilder));
        dispatcher.add_query_builder("idsCondition", Arc::new(builders::IdsConditionQueryBuilder));
        dispatcher.add_query_builder("propertyCondition", Arc::new(builders::PropertyConditionQueryBuilder));
        dispatcher.add_query_builder(
            "sourceEventPropertyCondition",
            Arc::new(builders::SourceEventPropertyConditionQueryBuilder),
        );
        dispatcher
    }

    /// Registers the past-event builder, which needs live service handles.
    pub fn register_past_event_builder(
        &mut self,
        definitions: Arc<DefinitionsService>,
        persistence: Arc<dyn crate::persistence::PersistenceService>,
    ) {
        let builder = builders::PastEventConditionQueryBuilder::new(
            definitions,
            persistence,
            self.script_executor.clone(),
        );
        self.add_query_builder("pastEventCondition", Arc::new(builder));
    }

    /// Registers a builder under a routing key. The first registration for
    /// a key wins; later ones are ignored (registration order is the only
    /// priority there is).
    pub fn add_query_builder(
        &mut self,
        routing_key: impl Into<String>,
        builder: Arc<dyn ConditionQueryBuilder>,
    ) {
        let routing_key = routing_key.into();
        if self.query_builders.contains_key(&routing_key) {
            debug!(%routing_key, "query builder already registered, keeping first");
            return;
        }
        self.query_builders.insert(routing_key, builder);
    }

    pub fn remove_query_builder(&mut self, routing_key: &str) {
        self.query_builders.remove(routing_key);
    }

    /// Compiles a condition into a full query: `match_all` constrained by
    /// the condition's filter. An inapplicable condition degrades to a
    /// plain `match_all` with a warning.
    pub fn get_query(&self, condition: &Condition) -> Result<Query> {
        let filter = match self.build_filter(condition)? {
            Some(filter) => filter,
            None => {
                warn!(
                    condition_type = %condition.condition_type_id,
                    "condition did not apply in context, querying unconstrained"
                );
                Query::MatchAll
            }
        };
        Ok(Query::bool().must(Query::MatchAll).filter(filter).build())
    }

    /// Compiles a condition into a filter fragment with an empty context.
    pub fn build_filter(&self, condition: &Condition) -> Result<Option<Query>> {
        self.build_filter_with_context(condition, &mut HashMap::new())
    }

    /// Compiles a condition into a filter fragment, accumulating parameter
    /// context while walking up the parent chain.
    pub fn build_filter_with_context(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
    ) -> Result<Option<Query>> {
        let condition_type = condition
            .condition_type
            .as_deref()
            .ok_or(QueryError::UnresolvedCondition)?;

        if let Some(parent) = condition_type.parent_condition.as_deref() {
            // The parent condition is dispatched in place of the child;
            // the child only contributes its parameter values.
            context.extend(
                condition
                    .parameter_values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            return self.build_filter_with_context(parent, context);
        }

        let routing_key =
            condition_type
                .routing_key
                .as_deref()
                .ok_or_else(|| QueryError::NoRoutingKey {
                    type_id: condition_type.id.clone(),
                })?;
        let builder =
            self.query_builders
                .get(routing_key)
                .ok_or_else(|| QueryError::NoBuilderForType {
                    routing_key: routing_key.to_string(),
                    type_id: condition_type.id.clone(),
                })?;

        match contextual_condition(condition, context, self.script_executor.as_ref()) {
            Some(contextual) => builder.build_query(&contextual, context, self),
            None => {
                debug!(
                    condition_type = %condition.condition_type_id,
                    "contextual placeholder unresolved, dropping condition"
                );
                Ok(None)
            }
        }
    }

    /// Counts matching items through the terminal builder.
    pub fn count(
        &self,
        condition: &Condition,
        context: &mut HashMap<String, ParamValue>,
    ) -> Result<u64> {
        let condition_type = condition
            .condition_type
            .as_deref()
            .ok_or(QueryError::UnresolvedCondition)?;

        if let Some(parent) = condition_type.parent_condition.as_deref() {
            context.extend(
                condition
                    .parameter_values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            return self.count(parent, context);
        }

        let routing_key =
            condition_type
                .routing_key
                .as_deref()
                .ok_or_else(|| QueryError::NoRoutingKey {
                    type_id: condition_type.id.clone(),
                })?;
        let builder =
            self.query_builders
                .get(routing_key)
                .ok_or_else(|| QueryError::NoBuilderForType {
                    routing_key: routing_key.to_string(),
                    type_id: condition_type.id.clone(),
                })?;

        match contextual_condition(condition, context, self.script_executor.as_ref()) {
            Some(contextual) => builder.count(&contextual, context, self),
            None => Ok(0),
        }
    }
}
