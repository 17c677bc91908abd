use serde::{Deserialize, Serialize};

/// Rows returned to registered callers when `limit` is omitted
pub const DEFAULT_LIMIT: i64 = 600;

/// County value that disables the county filter
pub const ALL_COUNTIES: &str = "all";

/// Optional bounds accepted by `GET /parcels`, deserialized straight from the
/// query string. Role overrides are applied later by the query builder, so
/// `limit` and `county` here are only what the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_sqft: Option<f64>,
    pub max_sqft: Option<f64>,
    pub county: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            min_price: None,
            max_price: None,
            min_sqft: None,
            max_sqft: None,
            county: None,
        }
    }
}

impl FilterSet {
    /// Lower-cased county to match on, or `None` when absent, empty or `"all"`
    pub fn county_filter(&self) -> Option<String> {
        self.county
            .as_deref()
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_COUNTIES))
            .map(str::to_lowercase)
    }
}
