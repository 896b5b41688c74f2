//! Cohort Runtime - in-memory condition evaluation
//!
//! The evaluation twin of the query layer: where `cohort-query` compiles a
//! condition into a backend query, this crate evaluates the same condition
//! directly against a profile, session or event already in hand. Both
//! sides share the condition model, type resolution, parent-chain walking
//! and contextual substitution from `cohort-core`, so a condition means
//! the same thing whichever side runs it.

pub mod dispatcher;
pub mod error;
pub mod evaluators;

pub use dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
pub use error::{EvalError, Result};
