//! Condition model
//!
//! Conditions are typed, parameterized tree nodes: a type id, a parameter
//! map, and nothing else. Nesting is expressed purely through parameters
//! (a `subConditions` parameter holding a sequence of conditions, a
//! `subCondition` parameter holding a single one).

pub mod builder;
pub mod model;

pub use builder::ConditionBuilder;
pub use model::{Action, ActionType, Condition, ConditionType, PropertyType, ValueType};
