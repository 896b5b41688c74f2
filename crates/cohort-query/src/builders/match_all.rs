//! Match-all builder

use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::Result;
use crate::query::Query;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

pub struct MatchAllConditionQueryBuilder;

impl ConditionQueryBuilder for MatchAllConditionQueryBuilder {
    fn build_query(
        &self,
        _condition: &Condition,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        Ok(Some(Query::MatchAll))
    }
}
