//! Convenience factory for programmatically built conditions
//!
//! Used by the past-event strategy and tests to synthesize boolean,
//! property and ids conditions with their types already resolved from the
//! registry.

use crate::condition::Condition;
use crate::registry::DefinitionsService;
use crate::resolver;
use crate::types::ParamValue;
use chrono::{DateTime, Utc};

pub struct ConditionBuilder<'a> {
    service: &'a DefinitionsService,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(service: &'a DefinitionsService) -> Self {
        Self { service }
    }

    /// A condition of the given type, resolved against the registry.
    /// Unregistered types are left unresolved; the dispatcher will reject
    /// them loudly.
    pub fn condition(&self, type_id: &str) -> Condition {
        let mut condition = Condition::new(type_id);
        resolver::resolve_condition_type(self.service, &mut condition);
        condition
    }

    pub fn and(&self, sub_conditions: Vec<Condition>) -> Condition {
        self.boolean("and", sub_conditions)
    }

    pub fn or(&self, sub_conditions: Vec<Condition>) -> Condition {
        self.boolean("or", sub_conditions)
    }

    fn boolean(&self, operator: &str, sub_conditions: Vec<Condition>) -> Condition {
        self.condition("booleanCondition")
            .with_parameter("operator", operator)
            .with_parameter(
                "subConditions",
                ParamValue::List(sub_conditions.into_iter().map(ParamValue::from).collect()),
            )
    }

    pub fn not(&self, sub_condition: Condition) -> Condition {
        self.condition("notCondition")
            .with_parameter("subCondition", sub_condition)
    }

    pub fn ids(&self, ids: Vec<String>, matching: bool) -> Condition {
        self.condition("idsCondition")
            .with_parameter("ids", ids)
            .with_parameter("match", matching)
    }

    pub fn match_all(&self) -> Condition {
        self.condition("matchAllCondition")
    }

    pub fn profile_property(&self, property_name: &str) -> PropertyConditionBuilder {
        self.property("profilePropertyCondition", property_name)
    }

    pub fn session_property(&self, property_name: &str) -> PropertyConditionBuilder {
        self.property("sessionPropertyCondition", property_name)
    }

    pub fn event_property(&self, property_name: &str) -> PropertyConditionBuilder {
        self.property("eventPropertyCondition", property_name)
    }

    fn property(&self, type_id: &str, property_name: &str) -> PropertyConditionBuilder {
        PropertyConditionBuilder {
            condition: self
                .condition(type_id)
                .with_parameter("propertyName", property_name),
        }
    }
}

/// Builder for property comparison conditions.
pub struct PropertyConditionBuilder {
    condition: Condition,
}

impl PropertyConditionBuilder {
    pub fn comparison(mut self, operator: &str) -> Self {
        self.condition.set_parameter("comparisonOperator", operator);
        self
    }

    pub fn equal_to(self, value: &str) -> Self {
        self.comparison("equals").string_value(value)
    }

    pub fn equal_to_integer(self, value: i64) -> Self {
        self.comparison("equals").integer_value(value)
    }

    pub fn between_integers(self, lower: i64, upper: i64) -> Self {
        self.comparison("between").integer_values(vec![lower, upper])
    }

    pub fn exists(self) -> Self {
        self.comparison("exists")
    }

    pub fn missing(self) -> Self {
        self.comparison("missing")
    }

    pub fn string_value(mut self, value: &str) -> Self {
        self.condition.set_parameter("propertyValue", value);
        self
    }

    pub fn integer_value(mut self, value: i64) -> Self {
        self.condition.set_parameter("propertyValueInteger", value);
        self
    }

    pub fn integer_values(mut self, values: Vec<i64>) -> Self {
        self.condition.set_parameter(
            "propertyValuesInteger",
            ParamValue::List(values.into_iter().map(ParamValue::Integer).collect()),
        );
        self
    }

    pub fn date_value(mut self, value: DateTime<Utc>) -> Self {
        self.condition.set_parameter("propertyValueDate", value);
        self
    }

    pub fn date_expr_value(mut self, expression: &str) -> Self {
        self.condition
            .set_parameter("propertyValueDateExpr", expression);
        self
    }

    pub fn build(self) -> Condition {
        self.condition
    }
}
