//! Persistence backend collaborator contract
//!
//! The query layer never talks to a concrete search backend; it issues
//! counts, aggregations and cardinality metrics through this trait. The
//! aggregation result preserves backend bucket order, which the past-event
//! strategy relies on (buckets sorted descending by count).

use crate::error::Result;
use cohort_core::Condition;
use std::collections::HashMap;

/// A terms aggregation over a field, optionally restricted to one
/// partition of the term space.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsAggregate {
    pub field: String,
    /// `(partition, num_partitions)` when partitioned
    pub partition: Option<(u64, u64)>,
}

impl TermsAggregate {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            partition: None,
        }
    }

    pub fn partitioned(field: impl Into<String>, partition: u64, num_partitions: u64) -> Self {
        Self {
            field: field.into(),
            partition: Some((partition, num_partitions)),
        }
    }
}

/// A page of item ids with paging metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialList {
    pub items: Vec<String>,
    pub offset: usize,
    pub page_size: usize,
    pub total_size: u64,
}

/// Blocking search-backend operations the query layer consumes.
pub trait PersistenceService: Send + Sync {
    /// Pages item ids matching a condition.
    fn query(
        &self,
        condition: &Condition,
        sort_by: Option<&str>,
        item_type: &str,
        offset: usize,
        size: usize,
    ) -> Result<PartialList>;

    /// Counts items matching a condition.
    fn query_count(&self, condition: &Condition, item_type: &str) -> Result<u64>;

    /// Bucketed aggregation: term value to document count, in backend
    /// order. `max_buckets` caps the bucket count when set.
    fn aggregate_with_optimized_query(
        &self,
        condition: &Condition,
        aggregate: &TermsAggregate,
        item_type: &str,
        max_buckets: Option<usize>,
    ) -> Result<Vec<(String, u64)>>;

    /// Single-value metrics (`card`, `min`, `max`, ...) over a field,
    /// keyed `_card`, `_min`, ... in the result.
    fn get_single_values_metrics(
        &self,
        condition: &Condition,
        metrics: &[&str],
        field: &str,
        item_type: &str,
    ) -> Result<HashMap<String, f64>>;
}
