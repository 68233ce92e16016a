//! Display-ready rows produced from engine results

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Placeholder rendered for missing descriptive values
pub const PLACEHOLDER: &str = "-";

/// A rendered table cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Engine value passed through as text
    Text(String),
    /// Whole number
    Integer(i64),
    /// Fractional number
    Decimal(f64),
    /// No data, rendered as `"-"`
    Placeholder,
}

impl CellValue {
    /// Whether the cell is the `"-"` placeholder
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Numeric view of the cell
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(x) => Some(*x),
            Self::Text(s) => s.parse().ok(),
            Self::Placeholder => None,
        }
    }

    /// Text view of the cell, if it holds text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Placeholder => Some(PLACEHOLDER),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(x) => write!(f, "{x}"),
            Self::Placeholder => f.write_str(PLACEHOLDER),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Decimal(x) => serializer.serialize_f64(*x),
            Self::Placeholder => serializer.serialize_str(PLACEHOLDER),
        }
    }
}

/// Fresh list key for a display row
pub(crate) fn row_key() -> String {
    Uuid::new_v4().to_string()
}

/// Row of the domain list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRow {
    /// List key
    pub key: String,
    /// Server host
    pub domain_name: String,
    /// Distinct endpoints called
    pub endpoint_count: CellValue,
    /// Calls per second
    pub rate: CellValue,
    /// Error percentage
    pub error_rate: CellValue,
    /// p99 latency in milliseconds
    pub latency: CellValue,
    /// Last call, as reported by the engine
    pub last_used: CellValue,
}

/// Summary of a single domain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMetricsRow {
    /// List key
    pub key: String,
    /// Number of calls
    pub call_count: CellValue,
    /// p99 latency in milliseconds
    pub latency: CellValue,
    /// Error percentage
    pub error_rate: CellValue,
    /// Relative time of the last call
    pub last_used: CellValue,
}

/// Summary of a single endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMetricsRow {
    /// List key
    pub key: String,
    /// Calls per second
    pub rate: CellValue,
    /// p99 latency in milliseconds
    pub latency: CellValue,
    /// Error percentage
    pub error_rate: CellValue,
    /// Relative time of the last call
    pub last_used: CellValue,
}

/// Row of an endpoint's status-code breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCodeRow {
    /// List key
    pub key: String,
    /// Response status code as reported
    pub status_code: CellValue,
    /// Number of calls
    pub count: CellValue,
    /// Calls per second
    pub rate: CellValue,
    /// p99 latency in milliseconds
    pub p99_latency: CellValue,
}

/// Row of a domain's endpoint table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRow {
    /// List key
    pub key: String,
    /// URL, or the joined group-by values when grouped
    pub endpoint_name: String,
    /// Number of calls
    pub call_count: CellValue,
    /// p99 latency in seconds
    pub latency: CellValue,
    /// Relative time of the last call
    pub last_used: CellValue,
    /// Group-by attribute values of this row
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub grouped_by_meta: Map<String, Value>,
}

/// Option of the endpoint selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownOption {
    /// List key
    pub key: String,
    /// Displayed text
    pub label: String,
    /// Selected value
    pub value: String,
}

/// Calling service and its share of the traffic
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceData {
    /// `service.name`
    pub service_name: String,
    /// Number of calls
    pub count: CellValue,
    /// Share of all calls, percent with two decimals
    pub percentage: f64,
}

/// Row of the dependent-services table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentServiceRow {
    /// List key
    pub key: String,
    /// Service identity and share
    pub service_data: ServiceData,
    /// p99 latency in milliseconds
    pub latency: CellValue,
    /// Calls per second
    pub rate: CellValue,
    /// Error percentage
    pub error_percentage: CellValue,
}

/// Row of the top-errors table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopErrorRow {
    /// List key
    pub key: String,
    /// URL path
    pub endpoint_name: String,
    /// Response status code
    pub status_code: String,
    /// Span status message
    pub status_message: String,
    /// Number of errors
    pub count: CellValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_serialization() {
        assert_eq!(serde_json::to_value(CellValue::Text("150".into())).unwrap(), json!("150"));
        assert_eq!(serde_json::to_value(CellValue::Integer(15)).unwrap(), json!(15));
        assert_eq!(serde_json::to_value(CellValue::Decimal(5.5)).unwrap(), json!(5.5));
        assert_eq!(serde_json::to_value(CellValue::Placeholder).unwrap(), json!("-"));
    }

    #[test]
    fn test_row_keys_are_unique() {
        assert_ne!(row_key(), row_key());
    }
}
