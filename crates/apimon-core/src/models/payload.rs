//! Composite query payloads handed to the query engine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::filter::{AttributeKey, FilterTree};
use crate::error::{Error, Result};

/// Query window in milliseconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    /// Inclusive start
    pub start_time: i64,
    /// Exclusive end
    pub end_time: i64,
}

impl TimeRange {
    /// Create a range, rejecting empty or inverted windows
    pub fn new(start_time: i64, end_time: i64) -> Result<Self> {
        if start_time >= end_time {
            return Err(Error::validation(format!(
                "time range start ({start_time}) must be before end ({end_time})"
            )));
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    /// The window of the given length ending at `now`, e.g. `"1h"` or `"15m"`
    pub fn last(window: &str, now: DateTime<Utc>) -> Result<Self> {
        let duration = humantime::parse_duration(window)
            .map_err(|e| Error::validation(format!("invalid time window {window:?}: {e}")))?;
        let millis = i64::try_from(duration.as_millis())
            .map_err(|_| Error::validation(format!("time window {window:?} is too large")))?;
        let end = now.timestamp_millis();
        Self::new(end - millis, end)
    }

    /// Window length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end_time - self.start_time
    }
}

/// Wire format of a sub-query's filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    /// Legacy `filters.items[]`
    V4,
    /// Flattened `filter.expression`
    #[default]
    V5,
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("v4"),
            Self::V5 => f.write_str("v5"),
        }
    }
}

impl FromStr for WireVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v4" => Ok(Self::V4),
            "v5" => Ok(Self::V5),
            other => Err(Error::validation(format!("unknown wire version: {other}"))),
        }
    }
}

/// Telemetry signal a sub-query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Spans
    #[default]
    Traces,
}

/// Aggregation applied by a sub-query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOperator {
    /// Number of spans
    Count,
    /// Number of distinct attribute values
    CountDistinct,
    /// Spans per second
    Rate,
    /// 99th percentile
    P99,
    /// Maximum
    Max,
    /// No aggregation
    Noop,
}

impl AggregateOperator {
    /// Function-call form used by expression-based sub-queries
    pub fn expression(self, attribute: Option<&AttributeKey>) -> String {
        let arg = attribute.map(|a| a.name.as_str()).unwrap_or_default();
        match self {
            Self::Count => "count()".to_string(),
            Self::Rate => "rate()".to_string(),
            Self::CountDistinct => format!("count_distinct({arg})"),
            Self::P99 => format!("p99({arg})"),
            Self::Max => format!("max({arg})"),
            Self::Noop => String::new(),
        }
    }
}

/// How the UI renders a payload's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    /// Tabular result
    Table,
    /// Time series
    Graph,
    /// Bar chart
    Bar,
}

/// An aggregation in function-call form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregation {
    /// e.g. `p99(duration_nano)`
    pub expression: String,
}

/// Result ordering of a sub-query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    /// Column or query name to sort on
    pub column_name: String,
    /// `asc` or `desc`
    pub order: String,
}

/// A sub-query's filter in the shape its wire version expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireFilter {
    /// `"filter": {"expression": "..."}`
    #[serde(rename = "filter")]
    Expression {
        /// Flattened boolean expression
        expression: String,
    },
    /// `"filters": {"op": "AND", "items": [...]}`
    #[serde(rename = "filters")]
    Items(FilterTree),
}

/// One named, independently aggregated sub-query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderQuery {
    /// Symbol formulas refer to, `A`, `B`, ...
    pub query_name: String,
    /// Signal
    pub data_source: DataSource,
    /// Aggregation operator
    pub aggregate_operator: AggregateOperator,
    /// Aggregation target, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_attribute: Option<AttributeKey>,
    /// Function-call aggregations, present on expression-based sub-queries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Aggregation>,
    /// Temporal aggregation
    pub time_aggregation: AggregateOperator,
    /// Spatial aggregation
    pub space_aggregation: String,
    /// Merged filter
    #[serde(flatten)]
    pub filter: WireFilter,
    /// Grouping attributes
    #[serde(default)]
    pub group_by: Vec<AttributeKey>,
    /// Result ordering
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    /// Row limit
    #[serde(default)]
    pub limit: Option<u32>,
    /// Series legend
    #[serde(default)]
    pub legend: String,
    /// Computed only to feed a formula
    pub disabled: bool,
    /// Same as `query_name` for builder sub-queries
    pub expression: String,
    /// Step interval in seconds
    pub step_interval: u64,
}

impl BuilderQuery {
    /// The filter expression, for expression-based sub-queries
    pub fn filter_expression(&self) -> Option<&str> {
        match &self.filter {
            WireFilter::Expression { expression } => Some(expression),
            WireFilter::Items(_) => None,
        }
    }

    /// The filter item list, for legacy sub-queries
    pub fn filter_items(&self) -> Option<&FilterTree> {
        match &self.filter {
            WireFilter::Items(tree) => Some(tree),
            WireFilter::Expression { .. } => None,
        }
    }
}

/// A named expression over sub-query results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    /// Formula symbol, e.g. `F1`
    pub query_name: String,
    /// e.g. `(C/A)*100`
    pub expression: String,
    /// Series legend
    pub legend: String,
    /// Whether the result is hidden
    pub disabled: bool,
}

/// Sub-queries and formulas of one payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuilderData {
    /// Sub-queries
    pub query_data: Vec<BuilderQuery>,
    /// Formulas
    pub query_formulas: Vec<Formula>,
}

/// Query section of a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeQuery {
    /// Always `builder`
    pub query_type: String,
    /// Builder queries
    pub builder: BuilderData,
}

/// A complete request for the query engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPayload {
    /// Window start, epoch milliseconds
    pub start: i64,
    /// Window end, epoch milliseconds
    pub end: i64,
    /// Step in seconds
    pub step: u64,
    /// Panel the result is rendered in
    pub graph_type: PanelType,
    /// Time selection marker understood by the engine
    pub selected_time: String,
    /// Ask the engine for UI-shaped tables
    pub format_for_web: bool,
    /// Entity version selecting the wire format
    pub version: WireVersion,
    /// Sub-queries and formulas
    pub query: CompositeQuery,
}

impl QueryPayload {
    /// Look up a sub-query by name
    pub fn query(&self, name: &str) -> Option<&BuilderQuery> {
        self.query
            .builder
            .query_data
            .iter()
            .find(|q| q.query_name == name)
    }

    /// Look up a formula by name
    pub fn formula(&self, name: &str) -> Option<&Formula> {
        self.query
            .builder
            .query_formulas
            .iter()
            .find(|f| f.query_name == name)
    }

    /// All sub-queries, in payload order
    pub fn queries(&self) -> &[BuilderQuery] {
        &self.query.builder.query_data
    }

    /// SHA-256 hex digest of the payload's JSON.
    ///
    /// Two payloads share a key exactly when they are deep-equal, so callers
    /// can memoize engine results on it. View toggles that alter a filter
    /// alter the key.
    pub fn cache_key(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_rejects_inverted_window() {
        assert!(TimeRange::new(10, 10).is_err());
        assert!(TimeRange::new(20, 10).is_err());
        assert_eq!(TimeRange::new(10, 20).unwrap().duration_ms(), 10);
    }

    #[test]
    fn test_time_range_last() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let range = TimeRange::last("15m", now).unwrap();

        assert_eq!(range.end_time, 1_700_000_000_000);
        assert_eq!(range.duration_ms(), 15 * 60 * 1000);
        assert!(TimeRange::last("soon", now).is_err());
    }

    #[test]
    fn test_aggregation_expressions() {
        let duration = AttributeKey::column("duration_nano", super::super::DataType::Float64);

        assert_eq!(AggregateOperator::Count.expression(None), "count()");
        assert_eq!(AggregateOperator::Rate.expression(None), "rate()");
        assert_eq!(
            AggregateOperator::P99.expression(Some(&duration)),
            "p99(duration_nano)"
        );
    }

    #[test]
    fn test_wire_version_parse() {
        assert_eq!("V4".parse::<WireVersion>().unwrap(), WireVersion::V4);
        assert_eq!("v5".parse::<WireVersion>().unwrap(), WireVersion::V5);
        assert!("v3".parse::<WireVersion>().is_err());
    }
}
