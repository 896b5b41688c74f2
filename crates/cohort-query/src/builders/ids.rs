//! Id membership builder

use super::missing_parameter;
use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::{QueryError, Result};
use crate::query::Query;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

/// Selects items whose id is (or is not, `match=false`) in a given set.
pub struct IdsConditionQueryBuilder;

impl ConditionQueryBuilder for IdsConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        let ids = condition
            .parameter("ids")
            .and_then(ParamValue::as_list)
            .ok_or_else(|| missing_parameter(condition, "ids"))?
            .iter()
            .map(|id| {
                id.as_str().map(str::to_string).ok_or_else(|| {
                    QueryError::InvalidParameter("ids entries must be strings".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let matching = condition
            .parameter("match")
            .and_then(ParamValue::as_bool)
            .unwrap_or(true);

        Ok(Some(Query::ids(ids, matching)))
    }
}
