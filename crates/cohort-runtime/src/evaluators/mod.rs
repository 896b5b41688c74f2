//! Per-type condition evaluators

mod boolean;
mod ids;
mod match_all;
mod not;
mod past_event;
mod property;
mod source;

pub use boolean::BooleanConditionEvaluator;
pub use ids::IdsConditionEvaluator;
pub use match_all::MatchAllConditionEvaluator;
pub use not::NotConditionEvaluator;
pub use past_event::PastEventConditionEvaluator;
pub use property::PropertyConditionEvaluator;
pub use source::SourceEventPropertyConditionEvaluator;

use crate::error::EvalError;
use cohort_core::Condition;

/// Missing-parameter error helper shared by the evaluators.
pub(crate) fn missing_parameter(condition: &Condition, name: &str) -> EvalError {
    EvalError::MissingParameter {
        name: name.to_string(),
        type_id: condition.condition_type_id.clone(),
    }
}
