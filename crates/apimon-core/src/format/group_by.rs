//! Drill-down filters derived from a clicked result row

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{AttributeKey, FilterItem, FilterOperator, FilterTree, FilterValue, Scalar};
use crate::query::attributes::{server_legacy_key, status_code_key, url_legacy_key};

/// Row fields that are UI bookkeeping, not attributes
const BOOKKEEPING_FIELDS: &[&str] = &["data", "key"];

fn filter_value(value: &Value) -> FilterValue {
    match value {
        Value::Bool(b) => Scalar::Bool(*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Scalar::Int(i).into(),
            None => Scalar::Float(n.as_f64().unwrap_or_default()).into(),
        },
        Value::String(s) => Scalar::Text(s.clone()).into(),
        Value::Null => FilterValue::default(),
        Value::Array(values) => FilterValue::Many(
            values
                .iter()
                .filter_map(|v| match filter_value(v) {
                    FilterValue::One(scalar) => Some(scalar),
                    FilterValue::Many(_) => None,
                })
                .collect(),
        ),
        Value::Object(_) => Scalar::Text(value.to_string()).into(),
    }
}

/// One equality item per attribute of `row`.
///
/// Every non-bookkeeping field becomes an item, whether or not it is a
/// group-by key; `group_by` only supplies the type of keys it knows, and
/// others are treated as string attributes.
pub fn derive(row: &Map<String, Value>, group_by: &[AttributeKey]) -> FilterTree {
    let items: Vec<FilterItem> = row
        .iter()
        .filter(|(name, _)| !BOOKKEEPING_FIELDS.contains(&name.as_str()))
        .map(|(name, value)| {
            let key = group_by
                .iter()
                .find(|k| &k.name == name)
                .cloned()
                .unwrap_or_else(|| AttributeKey::tag(name.clone()));
            FilterItem::new(key, FilterOperator::Eq, filter_value(value))
        })
        .collect();

    debug!(fields = row.len(), items = items.len(), "Derived drill-down filters");
    FilterTree::and(items)
}

/// The caller's filters with the row's equality items appended.
///
/// Items already present in `current` are not repeated; `current` itself is
/// left untouched.
pub fn merge_drilldown_filters(
    current: &FilterTree,
    row: &Map<String, Value>,
    group_by: &[AttributeKey],
) -> FilterTree {
    let mut items = current.items.clone();
    for item in derive(row, group_by).items {
        if !items.iter().any(|existing| existing.same_predicate(&item)) {
            items.push(item);
        }
    }
    FilterTree::and(items)
}

/// Filters correlating a top-error row with its traces: the domain, the
/// endpoint and the status code
pub fn correlation_filters(domain: &str, endpoint: &str, status_code: &str) -> FilterTree {
    FilterTree::and(vec![
        FilterItem::new(server_legacy_key(), FilterOperator::Eq, domain),
        FilterItem::new(url_legacy_key(), FilterOperator::Eq, endpoint),
        FilterItem::new(status_code_key(), FilterOperator::Eq, status_code),
    ])
}
