//! Event source filter builder

use crate::dispatcher::{ConditionQueryBuilder, ConditionQueryDispatcher};
use crate::error::Result;
use crate::query::Query;
use cohort_core::{Condition, ParamValue};
use std::collections::HashMap;

/// Filters events by their source metadata (originating item id, path,
/// scope). Parameters set to `"*"` are wildcards and ignored; with no
/// constraining parameter at all the condition matches everything.
pub struct SourceEventPropertyConditionQueryBuilder;

const SOURCE_FIELDS: &[(&str, &str)] = &[
    ("id", "source.itemId"),
    ("path", "source.path"),
    ("scope", "source.scope"),
    ("url", "source.properties.url"),
];

impl ConditionQueryBuilder for SourceEventPropertyConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &mut HashMap<String, ParamValue>,
        _dispatcher: &ConditionQueryDispatcher,
    ) -> Result<Option<Query>> {
        let mut bool_query = Query::bool();
        let mut clauses = 0;
        for (parameter, field) in SOURCE_FIELDS {
            if let Some(value) = condition.string_parameter(parameter) {
                if value != "*" {
                    bool_query = bool_query.must(Query::term(*field, value));
                    clauses += 1;
                }
            }
        }
        if clauses == 0 {
            return Ok(Some(Query::MatchAll));
        }
        Ok(Some(bool_query.build()))
    }
}
