//! Process-wide type registries
//!
//! Populated at startup, read-mostly afterwards. Lookups clone the
//! definition out of the registry so resolved chains can be attached to
//! conditions without sharing mutable state with the registry itself.

use crate::condition::{ActionType, Condition, ConditionType, ValueType};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry of condition, action and value type definitions.
pub struct DefinitionsService {
    condition_types: RwLock<HashMap<String, ConditionType>>,
    action_types: RwLock<HashMap<String, ActionType>>,
    value_types: RwLock<HashMap<String, ValueType>>,
}

impl DefinitionsService {
    pub fn new() -> Self {
        Self {
            condition_types: RwLock::new(HashMap::new()),
            action_types: RwLock::new(HashMap::new()),
            value_types: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-populated with the standard condition types.
    ///
    /// The property-backed types share the `propertyCondition` routing key;
    /// `eventTypeCondition` demonstrates the parent-chain mechanism by
    /// delegating to an event property comparison with a `parameter::`
    /// placeholder.
    pub fn with_standard_types() -> Self {
        let service = Self::new();

        service.set_condition_type(
            ConditionType::new("booleanCondition").with_routing_key("booleanCondition"),
        );
        service.set_condition_type(
            ConditionType::new("notCondition").with_routing_key("notCondition"),
        );
        service.set_condition_type(
            ConditionType::new("matchAllCondition").with_routing_key("matchAllCondition"),
        );
        service.set_condition_type(
            ConditionType::new("idsCondition").with_routing_key("idsCondition"),
        );
        service.set_condition_type(
            ConditionType::new("profilePropertyCondition").with_routing_key("propertyCondition"),
        );
        service.set_condition_type(
            ConditionType::new("sessionPropertyCondition").with_routing_key("propertyCondition"),
        );
        service.set_condition_type(
            ConditionType::new("eventPropertyCondition").with_routing_key("propertyCondition"),
        );
        service.set_condition_type(
            ConditionType::new("sourceEventPropertyCondition")
                .with_routing_key("sourceEventPropertyCondition"),
        );
        service.set_condition_type(
            ConditionType::new("pastEventCondition").with_routing_key("pastEventCondition"),
        );
        service.set_condition_type(
            ConditionType::new("eventTypeCondition").with_parent_condition(
                Condition::new("eventPropertyCondition")
                    .with_parameter("propertyName", "eventType")
                    .with_parameter("comparisonOperator", "equals")
                    .with_parameter("propertyValue", "parameter::eventTypeId"),
            ),
        );

        service
    }

    pub fn set_condition_type(&self, condition_type: ConditionType) {
        self.condition_types
            .write()
            .expect("condition type registry lock poisoned")
            .insert(condition_type.id.clone(), condition_type);
    }

    pub fn get_condition_type(&self, id: &str) -> Option<ConditionType> {
        self.condition_types
            .read()
            .expect("condition type registry lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn remove_condition_type(&self, id: &str) {
        self.condition_types
            .write()
            .expect("condition type registry lock poisoned")
            .remove(id);
    }

    pub fn set_action_type(&self, action_type: ActionType) {
        self.action_types
            .write()
            .expect("action type registry lock poisoned")
            .insert(action_type.id.clone(), action_type);
    }

    pub fn get_action_type(&self, id: &str) -> Option<ActionType> {
        self.action_types
            .read()
            .expect("action type registry lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn set_value_type(&self, value_type: ValueType) {
        self.value_types
            .write()
            .expect("value type registry lock poisoned")
            .insert(value_type.id.clone(), value_type);
    }

    pub fn get_value_type(&self, id: &str) -> Option<ValueType> {
        self.value_types
            .read()
            .expect("value type registry lock poisoned")
            .get(id)
            .cloned()
    }
}

impl Default for DefinitionsService {
    fn default() -> Self {
        Self::new()
    }
}
