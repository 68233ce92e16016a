//! Status-code buckets for chart legends and range filters

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{FilterItem, FilterOperator, SeriesPoint, TimeSeries};
use crate::query::attributes::{status_code_key, RESPONSE_STATUS_CODE};

/// Range grouping of HTTP status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCodeBucket {
    /// 200-299
    Success,
    /// 300-399
    Redirection,
    /// 400-499
    ClientError,
    /// 500-599
    ServerError,
    /// Anything else, including `"unknown"`
    Other,
}

impl StatusCodeBucket {
    /// All buckets, in legend order
    pub const ALL: [Self; 5] = [
        Self::Success,
        Self::Redirection,
        Self::ClientError,
        Self::ServerError,
        Self::Other,
    ];

    /// Legend label, e.g. `"400-499"`
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "200-299",
            Self::Redirection => "300-399",
            Self::ClientError => "400-499",
            Self::ServerError => "500-599",
            Self::Other => "Other",
        }
    }

    /// Inclusive code range; `None` for `Other`
    pub fn bounds(self) -> Option<(u16, u16)> {
        match self {
            Self::Success => Some((200, 299)),
            Self::Redirection => Some((300, 399)),
            Self::ClientError => Some((400, 499)),
            Self::ServerError => Some((500, 599)),
            Self::Other => None,
        }
    }
}

impl fmt::Display for StatusCodeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatusCodeBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation(format!("unknown status code bucket: {s:?}")))
    }
}

/// Bucket of a status code as reported by the engine
pub fn classify(code: &str) -> StatusCodeBucket {
    let code = code.trim();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return StatusCodeBucket::Other;
    }
    let Ok(code) = code.parse::<u16>() else {
        return StatusCodeBucket::Other;
    };
    StatusCodeBucket::ALL
        .into_iter()
        .find(|bucket| bucket.bounds().is_some_and(|(lo, hi)| (lo..=hi).contains(&code)))
        .unwrap_or(StatusCodeBucket::Other)
}

/// `>= lower` and `<= upper` items on the status code for a bucket label.
///
/// Labels without a range (`"Other"` or anything unparsable) still produce
/// both items, with empty values.
pub fn range_filter(label: &str) -> [FilterItem; 2] {
    let (lower, upper) = label
        .parse::<StatusCodeBucket>()
        .ok()
        .and_then(StatusCodeBucket::bounds)
        .map_or_else(
            || (String::new(), String::new()),
            |(lo, hi)| (lo.to_string(), hi.to_string()),
        );

    [
        FilterItem::new(status_code_key(), FilterOperator::Gte, lower),
        FilterItem::new(status_code_key(), FilterOperator::Lte, upper),
    ]
}

/// Range filter for a clicked chart series, read from its
/// `response_status_code` label; empty when the label is missing
pub fn range_filter_for_metric(metric: Option<&Map<String, Value>>) -> Vec<FilterItem> {
    metric
        .and_then(|m| m.get(RESPONSE_STATUS_CODE))
        .and_then(Value::as_str)
        .map(|label| range_filter(label).to_vec())
        .unwrap_or_default()
}

/// How values of one bucket and timestamp are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Total, for counts
    #[default]
    Sum,
    /// Mean over the contributing series, for latencies
    Average,
}

impl FromStr for AggregationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "average" | "avg" => Ok(Self::Average),
            other => Err(Error::validation(format!("unknown aggregation mode: {other}"))),
        }
    }
}

/// Combine the series of one bucket into a single series.
///
/// With [`AggregationMode::Average`], each timestamp is divided by the
/// number of series that have a value at that timestamp. Returns `None`
/// when no series falls in the bucket.
pub fn aggregate_bucket(
    series: &[TimeSeries],
    bucket: StatusCodeBucket,
    mode: AggregationMode,
) -> Option<TimeSeries> {
    let members: Vec<&TimeSeries> = series
        .iter()
        .filter(|s| classify(&s.label(RESPONSE_STATUS_CODE).unwrap_or_default()) == bucket)
        .collect();
    let first = members.first()?;

    let mut totals: HashMap<i64, (f64, u32)> = HashMap::new();
    for member in &members {
        for point in &member.values {
            if let Some(value) = point.value() {
                let entry = totals.entry(point.timestamp()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
    }

    let mut values: Vec<SeriesPoint> = totals
        .into_iter()
        .map(|(timestamp, (sum, contributors))| {
            let value = match mode {
                AggregationMode::Sum => sum,
                AggregationMode::Average => sum / f64::from(contributors),
            };
            SeriesPoint(timestamp, Value::String(value.to_string()))
        })
        .collect();
    values.sort_by_key(SeriesPoint::timestamp);

    let mut metric = Map::new();
    metric.insert(
        RESPONSE_STATUS_CODE.to_string(),
        Value::String(bucket.label().to_string()),
    );

    Some(TimeSeries {
        query_name: first.query_name.clone(),
        legend: bucket.label().to_string(),
        metric,
        values,
        table: None,
    })
}

/// One series per bucket present in `series`, in order of first appearance
pub fn bucket_aggregate(series: &[TimeSeries], mode: AggregationMode) -> Vec<TimeSeries> {
    let mut order: Vec<StatusCodeBucket> = Vec::new();
    for s in series {
        let bucket = classify(&s.label(RESPONSE_STATUS_CODE).unwrap_or_default());
        if !order.contains(&bucket) {
            order.push(bucket);
        }
    }

    order
        .into_iter()
        .filter_map(|bucket| aggregate_bucket(series, bucket, mode))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn series(code: &str, values: &[(i64, &str)]) -> TimeSeries {
        let mut metric = Map::new();
        metric.insert(RESPONSE_STATUS_CODE.to_string(), json!(code));
        TimeSeries {
            query_name: "A".to_string(),
            legend: code.to_string(),
            metric,
            values: values.iter().map(|(t, v)| SeriesPoint(*t, json!(v))).collect(),
            table: None,
        }
    }

    fn text(item: &FilterItem) -> String {
        match &item.value {
            crate::models::FilterValue::One(Scalar::Text(s)) => s.clone(),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[rstest]
    #[case("200", StatusCodeBucket::Success)]
    #[case("299", StatusCodeBucket::Success)]
    #[case("301", StatusCodeBucket::Redirection)]
    #[case("404", StatusCodeBucket::ClientError)]
    #[case("503", StatusCodeBucket::ServerError)]
    #[case("100", StatusCodeBucket::Other)]
    #[case("600", StatusCodeBucket::Other)]
    #[case("unknown", StatusCodeBucket::Other)]
    #[case("", StatusCodeBucket::Other)]
    #[case("2000", StatusCodeBucket::Other)]
    #[case("+20", StatusCodeBucket::Other)]
    fn test_classify(#[case] code: &str, #[case] expected: StatusCodeBucket) {
        assert_eq!(classify(code), expected);
    }

    #[test]
    fn test_range_filter() {
        let [lower, upper] = range_filter("200-299");

        assert_eq!(lower.key.as_ref().unwrap().name, "response_status_code");
        assert_eq!(lower.op, FilterOperator::Gte);
        assert_eq!(text(&lower), "200");
        assert_eq!(upper.op, FilterOperator::Lte);
        assert_eq!(text(&upper), "299");
    }

    #[rstest]
    #[case("Other")]
    #[case("invalid")]
    fn test_range_filter_without_bounds_keeps_empty_items(#[case] label: &str) {
        let items = range_filter(label);
        assert_eq!(items.len(), 2);
        assert_eq!(text(&items[0]), "");
        assert_eq!(text(&items[1]), "");
    }

    #[test]
    fn test_range_filter_for_metric() {
        let mut metric = Map::new();
        metric.insert(RESPONSE_STATUS_CODE.to_string(), json!("500-599"));
        assert_eq!(range_filter_for_metric(Some(&metric)).len(), 2);

        assert!(range_filter_for_metric(Some(&Map::new())).is_empty());
        assert!(range_filter_for_metric(None).is_empty());
    }

    #[test]
    fn test_bucket_sum() {
        let input = vec![
            series("200", &[(1000, "10"), (2000, "20")]),
            series("201", &[(1000, "5")]),
            series("404", &[(1000, "3")]),
        ];

        let out = bucket_aggregate(&input, AggregationMode::Sum);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].legend, "200-299");
        assert_eq!(out[0].values, vec![SeriesPoint(1000, json!("15")), SeriesPoint(2000, json!("20"))]);
        assert_eq!(out[1].label(RESPONSE_STATUS_CODE).as_deref(), Some("400-499"));
    }

    #[test]
    fn test_bucket_average_divides_by_contributors() {
        let input = vec![
            series("200", &[(1000, "10"), (2000, "30")]),
            series("204", &[(1000, "20")]),
        ];

        let out = aggregate_bucket(&input, StatusCodeBucket::Success, AggregationMode::Average).unwrap();
        assert_eq!(out.values, vec![SeriesPoint(1000, json!("15")), SeriesPoint(2000, json!("30"))]);
    }

    #[test]
    fn test_unknown_codes_go_to_other() {
        let input = vec![series("unknown", &[(1000, "1")]), series("200", &[(1000, "2")])];
        let out = bucket_aggregate(&input, AggregationMode::Sum);

        let labels: Vec<&str> = out.iter().map(|s| s.legend.as_str()).collect();
        assert_eq!(labels, vec!["Other", "200-299"]);
        assert!(aggregate_bucket(&input, StatusCodeBucket::ServerError, AggregationMode::Sum).is_none());
    }

    proptest! {
        #[test]
        fn test_classify_matches_range(code in 200u16..600) {
            let bucket = classify(&code.to_string());
            let (lo, hi) = bucket.bounds().unwrap();
            prop_assert!(lo <= code && code <= hi);
        }

        #[test]
        fn test_range_filter_contains_code(code in 200u16..600) {
            let [lower, upper] = range_filter(classify(&code.to_string()).label());
            let lower: u16 = text(&lower).parse().unwrap();
            let upper: u16 = text(&upper).parse().unwrap();
            prop_assert!(lower <= code && code <= upper);
        }

        #[test]
        fn test_non_numeric_is_other(code in "[a-zA-Z ]{0,8}") {
            prop_assert_eq!(classify(&code), StatusCodeBucket::Other);
        }
    }
}
