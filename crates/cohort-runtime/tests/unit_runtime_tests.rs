//! End-to-end evaluation tests
//!
//! Conditions arrive as JSON, get their types resolved and are evaluated
//! against in-memory profiles, sessions and events.

use cohort_core::condition::ConditionBuilder;
use cohort_core::item::{Event, Profile};
use cohort_core::resolver::resolve_condition_type;
use cohort_core::{Condition, DefinitionsService, ParamValue};
use cohort_runtime::{ConditionEvaluator, ConditionEvaluatorDispatcher, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn resolved(service: &DefinitionsService, json: &str) -> Condition {
    let mut condition: Condition = serde_json::from_str(json).expect("valid condition JSON");
    assert!(
        resolve_condition_type(service, &mut condition),
        "condition should resolve against the standard registry"
    );
    condition
}

#[test]
fn boolean_tree_from_json_evaluates_against_a_profile() -> anyhow::Result<()> {
    let service = DefinitionsService::with_standard_types();
    let condition = resolved(
        &service,
        r#"{
            "type": "booleanCondition",
            "parameterValues": {
                "operator": "and",
                "subConditions": [
                    {
                        "type": "profilePropertyCondition",
                        "parameterValues": {
                            "propertyName": "properties.age",
                            "comparisonOperator": "greaterThan",
                            "propertyValueInteger": 18
                        }
                    },
                    {
                        "type": "profilePropertyCondition",
                        "parameterValues": {
                            "propertyName": "properties.country",
                            "comparisonOperator": "equals",
                            "propertyValue": "DE"
                        }
                    }
                ]
            }
        }"#,
    );

    let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
    let adult_german = Profile::new("p1")
        .with_property("age", 30i64)
        .with_property("country", "DE");
    let minor_german = Profile::new("p2")
        .with_property("age", 16i64)
        .with_property("country", "DE");

    assert!(dispatcher.eval(&condition, &adult_german)?);
    assert!(!dispatcher.eval(&condition, &minor_german)?);
    Ok(())
}

#[test]
fn parent_chained_event_type_condition() -> anyhow::Result<()> {
    let service = DefinitionsService::with_standard_types();
    let condition = resolved(
        &service,
        r#"{
            "type": "eventTypeCondition",
            "parameterValues": { "eventTypeId": "pageView" }
        }"#,
    );

    let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
    let page_view = Event::new("e1", "pageView", "p1");
    let click = Event::new("e2", "click", "p1");
    assert!(dispatcher.eval(&condition, &page_view)?);
    assert!(!dispatcher.eval(&condition, &click)?);
    Ok(())
}

/// Evaluator stub that counts its invocations.
struct CountingEvaluator {
    result: bool,
    calls: Arc<AtomicUsize>,
}

impl ConditionEvaluator for CountingEvaluator {
    fn eval(
        &self,
        _condition: &Condition,
        _item: &dyn cohort_core::item::Item,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }
}

#[test]
fn boolean_evaluation_short_circuits() {
    let service = DefinitionsService::with_standard_types();
    service.set_condition_type(
        cohort_core::ConditionType::new("alwaysFalse").with_routing_key("alwaysFalse"),
    );
    service.set_condition_type(
        cohort_core::ConditionType::new("counted").with_routing_key("counted"),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
    dispatcher.add_evaluator(
        "alwaysFalse",
        Arc::new(CountingEvaluator {
            result: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }),
    );
    dispatcher.add_evaluator(
        "counted",
        Arc::new(CountingEvaluator {
            result: true,
            calls: calls.clone(),
        }),
    );

    let builder = ConditionBuilder::new(&service);
    let condition = builder.and(vec![
        builder.condition("alwaysFalse"),
        builder.condition("counted"),
    ]);

    let profile = Profile::new("p1");
    assert!(!dispatcher.eval(&condition, &profile).unwrap());
    // The AND failed on its first sub-condition; the second never ran.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn not_condition_inverts_the_result() {
    let service = DefinitionsService::with_standard_types();
    let builder = ConditionBuilder::new(&service);
    let condition = builder.not(
        builder
            .profile_property("properties.optedOut")
            .equal_to("true")
            .build(),
    );

    let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
    let opted_out = Profile::new("p1").with_property("optedOut", "true");
    let regular = Profile::new("p2");
    assert!(!dispatcher.eval(&condition, &opted_out).unwrap());
    assert!(dispatcher.eval(&condition, &regular).unwrap());
}

#[test]
fn contextual_placeholder_resolves_from_the_supplied_context() {
    let service = DefinitionsService::with_standard_types();
    let builder = ConditionBuilder::new(&service);
    let condition = builder
        .profile_property("properties.city")
        .comparison("equals")
        .string_value("parameter::city")
        .build();

    let dispatcher = ConditionEvaluatorDispatcher::with_default_evaluators();
    let profile = Profile::new("p1").with_property("city", "Berlin");

    let mut context = HashMap::from([("city".to_string(), ParamValue::from("Berlin"))]);
    assert!(dispatcher
        .eval_with_context(&condition, &profile, &mut context)
        .unwrap());

    let mut context = HashMap::from([("city".to_string(), ParamValue::from("Paris"))]);
    assert!(!dispatcher
        .eval_with_context(&condition, &profile, &mut context)
        .unwrap());
}

#[test]
fn query_and_eval_sides_agree_on_a_condition() {
    // The same resolved condition compiled as a query and evaluated in
    // memory must select the same profile.
    let service = DefinitionsService::with_standard_types();
    let builder = ConditionBuilder::new(&service);
    let condition = builder
        .profile_property("properties.age")
        .between_integers(18, 35)
        .build();

    let evaluator = ConditionEvaluatorDispatcher::with_default_evaluators();
    let profile = Profile::new("p1").with_property("age", 25i64);
    assert!(evaluator.eval(&condition, &profile).unwrap());

    let compiler = cohort_query::ConditionQueryDispatcher::with_default_builders();
    let query = compiler.build_filter(&condition).unwrap().unwrap();
    assert_eq!(
        query,
        cohort_query::Query::range("properties.age")
            .gte(18i64)
            .lte(35i64)
            .build()
    );
}
