//! Evaluator dispatch
//!
//! Mirror of the query-side dispatcher for in-memory evaluation: walks the
//! resolved parent chain, accumulates parameter context, applies
//! contextual substitution and routes the terminal condition to the
//! evaluator registered under its routing key.
//!
//! Unlike query compilation, an unresolved condition type is tolerated
//! here and evaluates to `false`: evaluation happens in request paths
//! where a half-registered type must not take the whole request down.

use crate::error::{EvalError, Result};
use crate::evaluators;
use cohort_core::context::{contextual_condition, ContextLookupExecutor, ScriptExecutor};
use cohort_core::item::Item;
use cohort_core::registry::DefinitionsService;
use cohort_core::{Condition, ParamValue};
use cohort_query::PersistenceService;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A per-type evaluator. Evaluators receive the dispatcher so they can
/// recursively evaluate their sub-conditions.
pub trait ConditionEvaluator: Send + Sync {
    fn eval(
        &self,
        condition: &Condition,
        item: &dyn Item,
        context: &mut HashMap<String, ParamValue>,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool>;
}

/// Registry and entry point for in-memory evaluation.
pub struct ConditionEvaluatorDispatcher {
    evaluators: HashMap<String, Arc<dyn ConditionEvaluator>>,
    script_executor: Arc<dyn ScriptExecutor>,
}

impl ConditionEvaluatorDispatcher {
    pub fn new(script_executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            evaluators: HashMap::new(),
            script_executor,
        }
    }

    /// Dispatcher with the standard evaluators registered, matching the
    /// routing keys of [`DefinitionsService::with_standard_types`].
    pub fn with_default_evaluators() -> Self {
        let mut dispatcher = Self::new(Arc::new(ContextLookupExecutor));
        dispatcher.add_evaluator("booleanCondition", Arc::new(evaluators::BooleanConditionEvaluator));
        dispatcher.add_evaluator("notCondition", Arc::new(evaluators::NotConditionEvaluator));
        dispatcher.add_evaluator("matchAllCondition", Arc::new(evaluators::MatchAllConditionEvaluator));
        dispatcher.add_evaluator("idsCondition", Arc::new(evaluators::IdsConditionEvaluator));
        dispatcher.add_evaluator("propertyCondition", Arc::new(evaluators::PropertyConditionEvaluator));
        dispatcher.add_evaluator(
            "sourceEventPropertyCondition",
            Arc::new(evaluators::SourceEventPropertyConditionEvaluator),
        );
        dispatcher
    }

    /// Registers the past-event evaluator, which needs live service handles.
    pub fn register_past_event_evaluator(
        &mut self,
        definitions: Arc<DefinitionsService>,
        persistence: Arc<dyn PersistenceService>,
    ) {
        let evaluator = evaluators::PastEventConditionEvaluator::new(
            definitions,
            persistence,
            self.script_executor.clone(),
        );
        self.add_evaluator("pastEventCondition", Arc::new(evaluator));
    }

    /// Registers an evaluator under a routing key. The first registration
    /// for a key wins; later ones are ignored.
    pub fn add_evaluator(
        &mut self,
        routing_key: impl Into<String>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) {
        let routing_key = routing_key.into();
        if self.evaluators.contains_key(&routing_key) {
            debug!(%routing_key, "evaluator already registered, keeping first");
            return;
        }
        self.evaluators.insert(routing_key, evaluator);
    }

    pub fn remove_evaluator(&mut self, routing_key: &str) {
        self.evaluators.remove(routing_key);
    }

    /// Evaluates a condition against an item with an empty context.
    pub fn eval(&self, condition: &Condition, item: &dyn Item) -> Result<bool> {
        self.eval_with_context(condition, item, &mut HashMap::new())
    }

    /// Evaluates a condition, accumulating parameter context while walking
    /// up the parent chain.
    pub fn eval_with_context(
        &self,
        condition: &Condition,
        item: &dyn Item,
        context: &mut HashMap<String, ParamValue>,
    ) -> Result<bool> {
        let condition_type = match condition.condition_type.as_deref() {
            Some(condition_type) => condition_type,
            None => {
                warn!(
                    condition_type = %condition.condition_type_id,
                    "condition type not resolved, evaluating to false"
                );
                return Ok(false);
            }
        };

        if let Some(parent) = condition_type.parent_condition.as_deref() {
            context.extend(
                condition
                    .parameter_values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            return self.eval_with_context(parent, item, context);
        }

        let routing_key =
            condition_type
                .routing_key
                .as_deref()
                .ok_or_else(|| EvalError::NoRoutingKey {
                    type_id: condition_type.id.clone(),
                })?;
        let evaluator =
            self.evaluators
                .get(routing_key)
                .ok_or_else(|| EvalError::NoEvaluatorForType {
                    routing_key: routing_key.to_string(),
                    type_id: condition_type.id.clone(),
                })?;

        match contextual_condition(condition, context, self.script_executor.as_ref()) {
            Some(contextual) => evaluator.eval(&contextual, item, context, self),
            None => {
                debug!(
                    condition_type = %condition.condition_type_id,
                    "contextual placeholder unresolved, evaluating to false"
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::condition::ConditionType;
    use cohort_core::item::Profile;
    use cohort_core::resolver::resolve_condition_type;

    #[test]
    fn unresolved_condition_evaluates_to_false() {
        let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
        let condition = Condition::new("anything");
        let profile = Profile::new("p1");
        assert!(!dispatcher.eval(&condition, &profile).unwrap());
    }

    #[test]
    fn missing_evaluator_is_a_fatal_error() {
        let service = DefinitionsService::new();
        service.set_condition_type(ConditionType::new("exotic").with_routing_key("exoticEvaluator"));
        let mut condition = Condition::new("exotic");
        assert!(resolve_condition_type(&service, &mut condition));

        let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
        let profile = Profile::new("p1");
        assert!(matches!(
            dispatcher.eval(&condition, &profile),
            Err(EvalError::NoEvaluatorForType { .. })
        ));
    }

    #[test]
    fn unresolved_placeholder_evaluates_to_false() {
        let service = DefinitionsService::with_standard_types();
        let mut condition = Condition::new("profilePropertyCondition")
            .with_parameter("propertyName", "properties.city")
            .with_parameter("comparisonOperator", "equals")
            .with_parameter("propertyValue", "parameter::city");
        assert!(resolve_condition_type(&service, &mut condition));

        let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
        let profile = Profile::new("p1").with_property("city", "Berlin");
        let mut context = HashMap::from([("other".to_string(), ParamValue::from("x"))]);
        assert!(!dispatcher
            .eval_with_context(&condition, &profile, &mut context)
            .unwrap());
    }

    #[test]
    fn parent_chain_evaluates_through_the_template() {
        let service = DefinitionsService::with_standard_types();
        let mut condition =
            Condition::new("eventTypeCondition").with_parameter("eventTypeId", "login");
        assert!(resolve_condition_type(&service, &mut condition));

        let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
        let login = cohort_core::item::Event::new("e1", "login", "p1");
        let view = cohort_core::item::Event::new("e2", "view", "p1");
        assert!(dispatcher.eval(&condition, &login).unwrap());
        assert!(!dispatcher.eval(&condition, &view).unwrap());
    }
}
