//! Type resolution and condition tree traversal
//!
//! Resolution attaches registry definitions to conditions loaded from
//! storage or requests. Parent chains are resolved recursively with a
//! visited set; a cycle or an unregistered type leaves the condition's
//! type unset and signals failure to the caller, which must treat the
//! owning object as inactive rather than fail hard.

use crate::condition::{Action, Condition, PropertyType};
use crate::registry::DefinitionsService;
use crate::types::ParamValue;
use log::warn;
use std::collections::HashSet;

const MAX_RECURSION_DEPTH: usize = 1000;

/// Pre/post-order visitor over a condition and its parameter sub-conditions.
pub trait ConditionVisitor {
    fn visit(&mut self, condition: &Condition);
    fn post_visit(&mut self, _condition: &Condition) {}
}

/// Resolves the condition's type, its parent chain and all parameter
/// sub-conditions. Returns false if anything stayed unresolved.
pub fn resolve_condition_type(service: &DefinitionsService, condition: &mut Condition) -> bool {
    let mut chain_path = HashSet::new();
    resolve_inner(service, condition, &mut chain_path, false, 0)
}

fn resolve_inner(
    service: &DefinitionsService,
    condition: &mut Condition,
    chain_path: &mut HashSet<String>,
    going_up: bool,
    depth: usize,
) -> bool {
    if depth > MAX_RECURSION_DEPTH {
        warn!(
            "Maximum recursion depth exceeded while resolving condition type {}",
            condition.condition_type_id
        );
        return false;
    }

    if going_up && !chain_path.insert(condition.condition_type_id.clone()) {
        warn!(
            "Detected circular reference for condition type {}",
            condition.condition_type_id
        );
        return false;
    }

    let resolved = resolve_type_and_parameters(service, condition, chain_path, depth);

    if going_up {
        chain_path.remove(&condition.condition_type_id);
    }
    resolved
}

fn resolve_type_and_parameters(
    service: &DefinitionsService,
    condition: &mut Condition,
    chain_path: &mut HashSet<String>,
    depth: usize,
) -> bool {
    if condition.condition_type.is_none() {
        let condition_type = match service.get_condition_type(&condition.condition_type_id) {
            Some(t) => t,
            None => {
                warn!(
                    "Couldn't resolve condition type: {}",
                    condition.condition_type_id
                );
                return false;
            }
        };
        condition.condition_type = Some(Box::new(condition_type));

        let has_parent = condition
            .condition_type
            .as_ref()
            .is_some_and(|t| t.parent_condition.is_some());
        if has_parent {
            let mut parent_path: HashSet<String> = chain_path.clone();
            parent_path.insert(condition.condition_type_id.clone());
            let parent = condition
                .condition_type
                .as_mut()
                .and_then(|t| t.parent_condition.as_mut());
            let parent_ok = match parent {
                Some(parent) => resolve_inner(service, parent, &mut parent_path, true, depth + 1),
                None => false,
            };
            if !parent_ok {
                // Discard the partially built chain
                condition.condition_type = None;
                warn!(
                    "Failed to resolve parent condition for type: {}",
                    condition.condition_type_id
                );
                return false;
            }
        }
    }

    for value in condition.parameter_values.values_mut() {
        if !resolve_parameter_value(service, value, chain_path, depth) {
            return false;
        }
    }
    true
}

fn resolve_parameter_value(
    service: &DefinitionsService,
    value: &mut ParamValue,
    chain_path: &mut HashSet<String>,
    depth: usize,
) -> bool {
    match value {
        ParamValue::Condition(sub) => resolve_inner(service, sub, chain_path, false, depth + 1),
        ParamValue::List(entries) => entries
            .iter_mut()
            .all(|entry| resolve_parameter_value(service, entry, chain_path, depth)),
        _ => true,
    }
}

/// Resolves the action type of a single rule action.
pub fn resolve_action_type(service: &DefinitionsService, action: &mut Action) -> bool {
    if action.action_type.is_some() {
        return true;
    }
    match service.get_action_type(&action.action_type_id) {
        Some(action_type) => {
            action.action_type = Some(action_type);
            true
        }
        None => {
            warn!("Couldn't resolve action type: {}", action.action_type_id);
            false
        }
    }
}

/// Resolves all action types of a rule; an empty action list is a failure.
pub fn resolve_action_types(service: &DefinitionsService, actions: &mut [Action]) -> bool {
    if actions.is_empty() {
        warn!("No actions to resolve");
        return false;
    }
    let mut result = true;
    for action in actions.iter_mut() {
        result &= resolve_action_type(service, action);
    }
    result
}

/// Resolves the value type referenced by a property type, if registered.
pub fn resolve_value_type(service: &DefinitionsService, property_type: &mut PropertyType) {
    if property_type.value_type.is_none() {
        property_type.value_type = service.get_value_type(&property_type.value_type_id);
    }
}

/// Walks a condition tree in pre/post order, descending into single
/// sub-condition parameters and sequences of sub-conditions.
pub fn visit_conditions(condition: &Condition, visitor: &mut dyn ConditionVisitor) {
    visitor.visit(condition);
    for value in condition.parameter_values.values() {
        visit_parameter_value(value, visitor);
    }
    visitor.post_visit(condition);
}

fn visit_parameter_value(value: &ParamValue, visitor: &mut dyn ConditionVisitor) {
    match value {
        ParamValue::Condition(sub) => visit_conditions(sub, visitor),
        ParamValue::List(entries) => {
            for entry in entries {
                visit_parameter_value(entry, visitor);
            }
        }
        _ => {}
    }
}

/// Collects every condition type id appearing in a tree.
pub fn get_condition_type_ids(condition: &Condition) -> Vec<String> {
    struct Collector(Vec<String>);
    impl ConditionVisitor for Collector {
        fn visit(&mut self, condition: &Condition) {
            self.0.push(condition.condition_type_id.clone());
        }
    }
    let mut collector = Collector(Vec::new());
    visit_conditions(condition, &mut collector);
    collector.0
}

/// Harvests the literal event-type ids referenced anywhere in a condition
/// tree. An event-type condition reachable only through a negation yields
/// `"*"`: the concrete type cannot be known once negated.
pub fn resolve_condition_event_types(condition: &Condition) -> HashSet<String> {
    let mut visitor = EventTypeVisitor {
        event_type_ids: HashSet::new(),
        type_stack: Vec::new(),
    };
    visit_conditions(condition, &mut visitor);
    visitor.event_type_ids
}

struct EventTypeVisitor {
    event_type_ids: HashSet<String>,
    type_stack: Vec<String>,
}

impl ConditionVisitor for EventTypeVisitor {
    fn visit(&mut self, condition: &Condition) {
        self.type_stack.push(condition.condition_type_id.clone());
        if condition.condition_type_id == "eventTypeCondition" {
            match condition.string_parameter("eventTypeId") {
                None => warn!("Null eventTypeId found"),
                Some(event_type_id) => {
                    if self.type_stack.iter().any(|t| t == "notCondition") {
                        // Negated event type conditions match anything
                        self.event_type_ids.insert("*".to_string());
                    } else {
                        self.event_type_ids.insert(event_type_id.to_string());
                    }
                }
            }
        } else if let Some(parent) = condition
            .condition_type
            .as_ref()
            .and_then(|t| t.parent_condition.as_deref())
        {
            visit_conditions(parent, self);
        }
    }

    fn post_visit(&mut self, _condition: &Condition) {
        self.type_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionType;

    fn chained_service(len: usize) -> DefinitionsService {
        // type0 <- type1 <- ... <- type{len-1}, type0 is terminal
        let service = DefinitionsService::new();
        service.set_condition_type(ConditionType::new("type0").with_routing_key("terminal"));
        for i in 1..len {
            service.set_condition_type(
                ConditionType::new(format!("type{}", i))
                    .with_parent_condition(Condition::new(format!("type{}", i - 1))),
            );
        }
        service
    }

    fn chain_length(condition: &Condition) -> usize {
        let mut length = 0;
        let mut current = condition.condition_type.as_deref();
        while let Some(t) = current {
            length += 1;
            current = t
                .parent_condition
                .as_ref()
                .and_then(|p| p.condition_type.as_deref());
        }
        length
    }

    #[test]
    fn resolves_acyclic_chains_of_any_length() {
        for len in 1..=6 {
            let service = chained_service(len);
            let mut condition = Condition::new(format!("type{}", len - 1));
            assert!(resolve_condition_type(&service, &mut condition));
            assert_eq!(chain_length(&condition), len);
        }
    }

    #[test]
    fn rejects_cyclic_chains_and_leaves_type_unset() {
        let service = DefinitionsService::new();
        service.set_condition_type(
            ConditionType::new("a").with_parent_condition(Condition::new("b")),
        );
        service.set_condition_type(
            ConditionType::new("b").with_parent_condition(Condition::new("a")),
        );

        let mut condition = Condition::new("a");
        assert!(!resolve_condition_type(&service, &mut condition));
        assert!(condition.condition_type.is_none());
    }

    #[test]
    fn rejects_self_referential_type() {
        let service = DefinitionsService::new();
        service.set_condition_type(
            ConditionType::new("selfish").with_parent_condition(Condition::new("selfish")),
        );
        let mut condition = Condition::new("selfish");
        assert!(!resolve_condition_type(&service, &mut condition));
        assert!(condition.condition_type.is_none());
    }

    #[test]
    fn unregistered_type_fails_resolution() {
        let service = DefinitionsService::new();
        let mut condition = Condition::new("nowhere");
        assert!(!resolve_condition_type(&service, &mut condition));
        assert!(condition.condition_type.is_none());
    }

    #[test]
    fn resolves_sub_conditions_in_parameters() {
        let service = DefinitionsService::with_standard_types();
        let mut condition = Condition::new("booleanCondition")
            .with_parameter("operator", "and")
            .with_parameter(
                "subConditions",
                vec![
                    ParamValue::from(Condition::new("matchAllCondition")),
                    ParamValue::from(Condition::new("eventTypeCondition")
                        .with_parameter("eventTypeId", "login")),
                ],
            );
        assert!(resolve_condition_type(&service, &mut condition));
        let subs = condition.parameter("subConditions").unwrap().as_list().unwrap();
        for sub in subs {
            assert!(sub.as_condition().unwrap().condition_type.is_some());
        }
    }

    #[test]
    fn event_types_are_harvested() {
        let service = DefinitionsService::with_standard_types();
        let mut condition =
            Condition::new("eventTypeCondition").with_parameter("eventTypeId", "login");
        assert!(resolve_condition_type(&service, &mut condition));
        let types = resolve_condition_event_types(&condition);
        assert_eq!(types, HashSet::from(["login".to_string()]));
    }

    #[test]
    fn negated_event_types_become_wildcard() {
        let service = DefinitionsService::with_standard_types();
        let mut condition = Condition::new("notCondition").with_parameter(
            "subCondition",
            Condition::new("eventTypeCondition").with_parameter("eventTypeId", "login"),
        );
        assert!(resolve_condition_type(&service, &mut condition));
        let types = resolve_condition_event_types(&condition);
        assert_eq!(types, HashSet::from(["*".to_string()]));
    }

    #[test]
    fn action_resolution() {
        use crate::condition::ActionType;
        let service = DefinitionsService::new();
        service.set_action_type(ActionType::new("setProperty").with_action_executor("setProperty"));

        let mut action = Action::new("setProperty");
        assert!(resolve_action_type(&service, &mut action));
        assert!(action.action_type.is_some());

        let mut unknown = Action::new("unknown");
        assert!(!resolve_action_type(&service, &mut unknown));
        assert!(!resolve_action_types(&service, &mut []));
    }
}
