//! Condition, condition type and the related definition records

use crate::types::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A predicate over profiles, sessions or events.
///
/// `condition_type` starts out unset and is attached by the type resolver;
/// it is a resolved copy of the registry entry, so a failed parent-chain
/// resolution can discard it without touching the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Identifier of the condition type this condition instantiates
    #[serde(rename = "type")]
    pub condition_type_id: String,

    /// Resolved type, set by the type resolver
    #[serde(skip)]
    pub condition_type: Option<Box<ConditionType>>,

    /// Parameter values, including any nested conditions
    #[serde(default)]
    pub parameter_values: HashMap<String, ParamValue>,
}

impl Condition {
    pub fn new(condition_type_id: impl Into<String>) -> Self {
        Self {
            condition_type_id: condition_type_id.into(),
            condition_type: None,
            parameter_values: HashMap::new(),
        }
    }

    /// Create a condition with its type already attached.
    pub fn resolved(condition_type: ConditionType) -> Self {
        Self {
            condition_type_id: condition_type.id.clone(),
            condition_type: Some(Box::new(condition_type)),
            parameter_values: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameter_values.insert(name.into(), value.into());
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.parameter_values.insert(name.into(), value.into());
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameter_values.get(name)
    }

    /// String parameter accessor, the most common shape.
    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(ParamValue::as_str)
    }
}

/// Definition of a condition type.
///
/// A type either carries a routing key for the dispatcher, or delegates to
/// a parent condition template whose parameters may reference the child's
/// parameter values through `parameter::` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionType {
    /// Unique identifier
    pub id: String,

    /// Routing key the dispatchers use to look up the builder/evaluator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,

    /// Parent condition template forming the inheritance chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_condition: Option<Box<Condition>>,
}

impl ConditionType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            routing_key: None,
            parent_condition: None,
        }
    }

    pub fn with_routing_key(mut self, key: impl Into<String>) -> Self {
        self.routing_key = Some(key.into());
        self
    }

    pub fn with_parent_condition(mut self, parent: Condition) -> Self {
        self.parent_condition = Some(Box::new(parent));
        self
    }
}

/// An action attached to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type_id: String,

    #[serde(skip)]
    pub action_type: Option<ActionType>,

    #[serde(default)]
    pub parameter_values: HashMap<String, ParamValue>,
}

impl Action {
    pub fn new(action_type_id: impl Into<String>) -> Self {
        Self {
            action_type_id: action_type_id.into(),
            action_type: None,
            parameter_values: HashMap::new(),
        }
    }
}

/// Definition of an action type. Action types have no parent chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionType {
    pub id: String,

    /// Routing key for the action executor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_executor: Option<String>,
}

impl ActionType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_executor: None,
        }
    }

    pub fn with_action_executor(mut self, executor: impl Into<String>) -> Self {
        self.action_executor = Some(executor.into());
        self
    }
}

/// Definition of a profile/session property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyType {
    pub id: String,

    pub value_type_id: String,

    #[serde(skip)]
    pub value_type: Option<ValueType>,
}

impl PropertyType {
    pub fn new(id: impl Into<String>, value_type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value_type_id: value_type_id.into(),
            value_type: None,
        }
    }
}

/// Definition of a value type referenced by property types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueType {
    pub id: String,
}

impl ValueType {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
