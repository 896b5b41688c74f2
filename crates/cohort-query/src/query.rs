//! Backend query fragment model
//!
//! A neutral representation of the search-backend query language: term,
//! range, regexp, geo-distance and ids fragments composed through boolean
//! combinators. The persistence adapter translates these into its native
//! query DSL.

use cohort_core::ParamValue;
use serde::{Deserialize, Serialize};

/// A query fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Matches every document
    MatchAll,
    /// Exact value match on a field
    Term { field: String, value: ParamValue },
    /// Membership in a value set
    Terms {
        field: String,
        values: Vec<ParamValue>,
    },
    /// Range comparison; unset bounds are open
    Range {
        field: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        gt: Option<ParamValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gte: Option<ParamValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lt: Option<ParamValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lte: Option<ParamValue>,
    },
    /// Field presence
    Exists { field: String },
    /// Prefix match
    Prefix { field: String, value: String },
    /// Regular expression match
    Regexp { field: String, pattern: String },
    /// Geo distance around a center point
    GeoDistance {
        field: String,
        center: GeoPoint,
        distance: f64,
        unit: DistanceUnit,
    },
    /// Id membership; `matching=false` selects documents NOT in the set
    Ids { ids: Vec<String>, matching: bool },
    /// Boolean combinator
    Bool(BoolQuery),
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<ParamValue>) -> Self {
        Query::Terms {
            field: field.into(),
            values,
        }
    }

    pub fn range(field: impl Into<String>) -> RangeBuilder {
        RangeBuilder {
            field: field.into(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists {
            field: field.into(),
        }
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Query::Regexp {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn ids(ids: Vec<String>, matching: bool) -> Self {
        Query::Ids { ids, matching }
    }

    pub fn bool() -> BoolQuery {
        BoolQuery::default()
    }

    /// Negation shorthand: `bool.must_not(query)`.
    pub fn not(query: Query) -> Self {
        Query::bool().must_not(query).build()
    }

    /// True for plain range fragments, which the AND combinator places in
    /// the filter clause for backend efficiency.
    pub fn is_pure_range(&self) -> bool {
        matches!(self, Query::Range { .. })
    }
}

/// Builder for range fragments.
pub struct RangeBuilder {
    field: String,
    gt: Option<ParamValue>,
    gte: Option<ParamValue>,
    lt: Option<ParamValue>,
    lte: Option<ParamValue>,
}

impl RangeBuilder {
    pub fn gt(mut self, value: impl Into<ParamValue>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<ParamValue>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<ParamValue>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<ParamValue>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn build(self) -> Query {
        Query::Range {
            field: self.field,
            gt: self.gt,
            gte: self.gte,
            lt: self.lt,
            lte: self.lte,
        }
    }
}

/// Boolean combinator clauses. `must` and `filter` are both logically
/// ANDed; the split only exists for backend caching.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoolQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Query>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Query>,
}

impl BoolQuery {
    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn build(self) -> Query {
        Query::Bool(self)
    }
}

/// A geographic point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parses the `"lat,lon"` string form.
    pub fn parse(value: &str) -> Option<Self> {
        let (lat, lon) = value.split_once(',')?;
        Some(Self {
            lat: lat.trim().parse().ok()?,
            lon: lon.trim().parse().ok()?,
        })
    }
}

/// Distance units for geo queries. Kilometers when unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Meters,
    #[default]
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "m" | "meters" => Some(DistanceUnit::Meters),
            "km" | "kilometers" => Some(DistanceUnit::Kilometers),
            "mi" | "miles" => Some(DistanceUnit::Miles),
            _ => None,
        }
    }

    pub fn to_meters(&self, distance: f64) -> f64 {
        match self {
            DistanceUnit::Meters => distance,
            DistanceUnit::Kilometers => distance * 1000.0,
            DistanceUnit::Miles => distance * 1609.344,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_fragments_are_pure_ranges() {
        let range = Query::range("properties.age").gte(18i64).lte(35i64).build();
        assert!(range.is_pure_range());
        assert!(!Query::exists("properties.age").is_pure_range());
        assert!(!Query::bool().must(range).build().is_pure_range());
    }

    #[test]
    fn geo_point_parsing() {
        let point = GeoPoint::parse("48.8566, 2.3522").unwrap();
        assert_eq!(point.lat, 48.8566);
        assert_eq!(point.lon, 2.3522);
        assert!(GeoPoint::parse("not-a-point").is_none());
    }

    #[test]
    fn distance_units() {
        assert_eq!(DistanceUnit::parse("km"), Some(DistanceUnit::Kilometers));
        assert_eq!(DistanceUnit::default(), DistanceUnit::Kilometers);
        assert_eq!(DistanceUnit::Miles.to_meters(1.0), 1609.344);
    }
}
