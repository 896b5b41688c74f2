//! Per-type query builders

mod boolean;
mod ids;
mod match_all;
mod not;
mod past_event;
mod property;
mod source;

pub use boolean::BooleanConditionQueryBuilder;
pub use ids::IdsConditionQueryBuilder;
pub use match_all::MatchAllConditionQueryBuilder;
pub use not::NotConditionQueryBuilder;
pub use past_event::PastEventConditionQueryBuilder;
pub use property::PropertyConditionQueryBuilder;
pub use source::SourceEventPropertyConditionQueryBuilder;

use crate::error::QueryError;
use cohort_core::Condition;

/// Missing-parameter error helper shared by the builders.
pub(crate) fn missing_parameter(condition: &Condition, name: &str) -> QueryError {
    QueryError::MissingParameter {
        name: name.to_string(),
        type_id: condition.condition_type_id.clone(),
    }
}
