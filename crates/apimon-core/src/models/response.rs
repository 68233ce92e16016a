//! Result shapes returned by the query engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Literal the engine uses for "no data"
pub const NO_DATA_SENTINEL: &str = "n/a";

/// Whether a raw value carries no data (`null`, empty, or `"n/a"`)
pub fn is_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == NO_DATA_SENTINEL,
        _ => false,
    }
}

/// Text form of a raw value, or `None` for sentinels and structured values
pub fn present_text(value: Option<&Value>) -> Option<String> {
    match value? {
        v if is_sentinel(v) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric form of a raw value; numeric strings are accepted
pub fn present_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

/// One row of a tabular result, keyed by query name or group-by attribute
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawResultRow {
    /// Cell values
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl RawResultRow {
    /// Build a row from key/value pairs
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            data: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Non-sentinel text of a cell
    pub fn text(&self, key: &str) -> Option<String> {
        present_text(self.data.get(key))
    }

    /// First non-sentinel text among several candidate cells
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    /// Non-sentinel numeric value of a cell
    pub fn number(&self, key: &str) -> Option<f64> {
        present_number(self.data.get(key))
    }
}

/// Rows of a tabular result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableResult {
    /// Rows in engine order
    #[serde(default)]
    pub rows: Vec<RawResultRow>,
}

/// A `[timestamp, value]` sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint(pub i64, pub Value);

impl SeriesPoint {
    /// Sample timestamp
    pub fn timestamp(&self) -> i64 {
        self.0
    }

    /// Numeric sample value, if parseable
    pub fn value(&self) -> Option<f64> {
        present_number(Some(&self.1))
    }
}

/// One result entry: a labelled series, or a table for tabular payloads
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    /// Sub-query or formula that produced the entry
    #[serde(default)]
    pub query_name: String,
    /// Series legend
    #[serde(default)]
    pub legend: String,
    /// Series labels
    #[serde(default)]
    pub metric: Map<String, Value>,
    /// Samples
    #[serde(default)]
    pub values: Vec<SeriesPoint>,
    /// Tabular rows, for table payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableResult>,
}

impl TimeSeries {
    /// Non-sentinel text of a label
    pub fn label(&self, key: &str) -> Option<String> {
        present_text(self.metric.get(key))
    }
}

/// Engine response for one payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Result entries
    #[serde(default)]
    pub result: Vec<TimeSeries>,
    /// `matrix`, `table`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
}

impl QueryResponse {
    /// Decode a response, unwrapping any `{"data": ...}` envelopes
    pub fn from_json(text: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(text)?;
        while let Some(inner) = value.get_mut("data").filter(|d| d.is_object()) {
            value = inner.take();
        }
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Tabular rows across all entries, in engine order
    pub fn rows(&self) -> Vec<RawResultRow> {
        self.result
            .iter()
            .filter_map(|entry| entry.table.as_ref())
            .flat_map(|table| table.rows.iter().cloned())
            .collect()
    }

    /// Series entries (those without a table)
    pub fn series(&self) -> Vec<TimeSeries> {
        self.result
            .iter()
            .filter(|entry| entry.table.is_none())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinels() {
        assert!(is_sentinel(&json!("n/a")));
        assert!(is_sentinel(&json!("")));
        assert!(is_sentinel(&Value::Null));
        assert!(!is_sentinel(&json!("0")));
        assert!(!is_sentinel(&json!(0)));
    }

    #[test]
    fn test_row_accessors() {
        let row = RawResultRow::from_pairs([
            ("A", json!("150")),
            ("B", json!(125_000_000)),
            ("C", json!("n/a")),
        ]);

        assert_eq!(row.text("A").as_deref(), Some("150"));
        assert_eq!(row.number("A"), Some(150.0));
        assert_eq!(row.number("B"), Some(125_000_000.0));
        assert_eq!(row.text("C"), None);
        assert_eq!(row.number("C"), None);
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn test_from_json_unwraps_envelopes() {
        let text = r#"{"data": {"result": [{"metric": {"response_status_code": "200"}, "values": [[1000000100, "10"]], "queryName": "A", "legend": "200"}], "resultType": "matrix"}}"#;
        let response = QueryResponse::from_json(text).unwrap();

        let series = response.series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label("response_status_code").as_deref(), Some("200"));
        assert_eq!(series[0].values[0].value(), Some(10.0));
        assert!(response.rows().is_empty());
    }

    #[test]
    fn test_from_json_tables() {
        let text = r#"{"result": [{"queryName": "A", "table": {"rows": [{"data": {"A": "1"}}, {"data": {"A": "2"}}]}}]}"#;
        let response = QueryResponse::from_json(text).unwrap();

        let rows = response.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].text("A").as_deref(), Some("2"));
        assert!(response.series().is_empty());
    }

    #[test]
    fn test_from_json_null_is_empty() {
        let response = QueryResponse::from_json("null").unwrap();
        assert!(response.result.is_empty());
    }
}
