//! Cohort Query - compiles condition trees into backend query fragments
//!
//! The dispatcher walks a resolved condition's parent chain, accumulates
//! parameter context, applies contextual substitution and routes the
//! terminal condition to its registered query builder. Builders recurse
//! through the dispatcher for their sub-conditions, so arbitrarily
//! composed trees compile into a single query fragment.

pub mod builders;
pub mod dispatcher;
pub mod error;
pub mod persistence;
pub mod query;

pub use dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
pub use error::QueryError;
pub use persistence::{PartialList, PersistenceService, TermsAggregate};
pub use query::{BoolQuery, DistanceUnit, GeoPoint, Query};
