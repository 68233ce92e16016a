//! Filter data model shared by every query view

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Data type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit float
    Float64,
    /// 64-bit integer
    Int64,
    /// Boolean
    Bool,
    /// Free-form text; also the fallback for unknown types
    #[default]
    #[serde(other)]
    String,
}

/// Where an attribute lives on a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeKind {
    /// Top-level span column (e.g. `duration_nano`)
    Column,
    /// Span attribute
    #[default]
    Tag,
    /// Resource attribute
    Resource,
}

impl AttributeKind {
    fn as_wire(self) -> &'static str {
        match self {
            Self::Column => "",
            Self::Tag => "tag",
            Self::Resource => "resource",
        }
    }
}

/// An attribute used for filtering, grouping or aggregation
///
/// On the wire this is the query builder's key object
/// (`{"key", "dataType", "type", "isColumn", "isJSON", "id"}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "WireAttributeKey", into = "WireAttributeKey")]
pub struct AttributeKey {
    /// Attribute name, e.g. `net.peer.name`
    pub name: String,
    /// Value type
    pub data_type: DataType,
    /// Column, span attribute or resource attribute
    pub kind: AttributeKind,
}

impl AttributeKey {
    /// Create a key
    pub fn new(name: impl Into<String>, data_type: DataType, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            data_type,
            kind,
        }
    }

    /// A string-typed span attribute
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, DataType::String, AttributeKind::Tag)
    }

    /// A span column
    pub fn column(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, AttributeKind::Column)
    }

    /// A string-typed resource attribute
    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(name, DataType::String, AttributeKind::Resource)
    }

    /// Legacy composite id, `name--type--kind--isColumn`
    pub fn wire_id(&self) -> String {
        let data_type = match self.data_type {
            DataType::String => "string",
            DataType::Float64 => "float64",
            DataType::Int64 => "int64",
            DataType::Bool => "bool",
        };
        format!(
            "{}--{}--{}--{}",
            self.name,
            data_type,
            self.kind.as_wire(),
            self.kind == AttributeKind::Column
        )
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttributeKey {
    #[serde(default)]
    id: Option<String>,
    key: String,
    #[serde(default)]
    data_type: Option<DataType>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    is_column: Option<bool>,
    #[serde(rename = "isJSON", default)]
    is_json: Option<bool>,
}

impl From<WireAttributeKey> for AttributeKey {
    fn from(wire: WireAttributeKey) -> Self {
        let kind = match wire.kind.as_deref() {
            Some("tag") => AttributeKind::Tag,
            Some("resource") => AttributeKind::Resource,
            _ if wire.is_column == Some(true) => AttributeKind::Column,
            _ => AttributeKind::Tag,
        };
        Self {
            name: wire.key,
            data_type: wire.data_type.unwrap_or_default(),
            kind,
        }
    }
}

impl From<AttributeKey> for WireAttributeKey {
    fn from(key: AttributeKey) -> Self {
        Self {
            id: Some(key.wire_id()),
            data_type: Some(key.data_type),
            kind: Some(key.kind.as_wire().to_string()),
            is_column: Some(key.kind == AttributeKind::Column),
            is_json: Some(false),
            key: key.name,
        }
    }
}

/// Comparison operator of a filter item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FilterOperator {
    /// `=`
    #[default]
    #[serde(rename = "=")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Gte,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Lte,
    /// Membership in a value list
    #[serde(rename = "IN", alias = "in")]
    In,
    /// Exclusion from a value list
    #[serde(rename = "NOT_IN", alias = "nin", alias = "not_in")]
    NotIn,
    /// SQL-style pattern match
    #[serde(rename = "LIKE", alias = "like")]
    Like,
    /// Negated pattern match
    #[serde(rename = "NOT_LIKE", alias = "nlike", alias = "not_like")]
    NotLike,
    /// Substring match
    #[serde(rename = "CONTAINS", alias = "contains")]
    Contains,
    /// Negated substring match
    #[serde(rename = "NOT_CONTAINS", alias = "ncontains", alias = "not_contains")]
    NotContains,
    /// Attribute is present
    #[serde(rename = "EXISTS", alias = "exists")]
    Exists,
    /// Attribute is absent
    #[serde(rename = "NOT_EXISTS", alias = "nexists", alias = "not_exists")]
    NotExists,
}

impl FilterOperator {
    /// Operator keyword in the filter expression language
    pub fn as_expression(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT CONTAINS",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT EXISTS",
        }
    }

    /// Whether the operator takes no value
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_expression())
    }
}

/// A single scalar filter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Value of a filter item: one scalar or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Single value
    One(Scalar),
    /// Value list (for `IN` / `NOT_IN`)
    Many(Vec<Scalar>),
}

impl Default for FilterValue {
    fn default() -> Self {
        Self::One(Scalar::Text(String::new()))
    }
}

macro_rules! filter_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    Self::One(Scalar::from(value))
                }
            }
        )*
    };
}

filter_value_from!(&str, String, bool, i64);

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        Self::One(value)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(s) => write!(f, "{s}"),
            Self::Many(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// One predicate of a filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    /// Caller-assigned identity, opaque to the query builders
    #[serde(default)]
    pub id: String,

    /// Attribute being constrained; tolerated as missing on input
    #[serde(default)]
    pub key: Option<AttributeKey>,

    /// Comparison operator; `=` when missing on input
    #[serde(default)]
    pub op: FilterOperator,

    /// Compared value (ignored for `EXISTS` / `NOT_EXISTS`)
    #[serde(default)]
    pub value: FilterValue,
}

impl FilterItem {
    /// Create an item with an id derived from its content
    pub fn new(key: AttributeKey, op: FilterOperator, value: impl Into<FilterValue>) -> Self {
        let value = value.into();
        let id = content_id(&key.name, op, &value);
        Self {
            id,
            key: Some(key),
            op,
            value,
        }
    }

    /// `key = value` on a string-typed attribute
    pub fn equals(name: &str, value: impl Into<FilterValue>) -> Self {
        Self::new(AttributeKey::tag(name), FilterOperator::Eq, value)
    }

    /// `key EXISTS`
    pub fn exists(key: AttributeKey) -> Self {
        Self::new(key, FilterOperator::Exists, FilterValue::default())
    }

    /// The constrained attribute, falling back to a string-typed key named
    /// after the item id when the caller omitted one.
    ///
    /// Returns `None` only when neither a key nor an id is available.
    pub fn resolved_key(&self) -> Option<AttributeKey> {
        match &self.key {
            Some(key) if !key.name.is_empty() => Some(key.clone()),
            _ if !self.id.is_empty() => Some(AttributeKey::tag(self.id.clone())),
            _ => None,
        }
    }

    /// Whether two items express the same predicate, ignoring ids
    pub fn same_predicate(&self, other: &Self) -> bool {
        let name = |item: &Self| item.resolved_key().map(|k| k.name);
        name(self) == name(other) && self.op == other.op && self.value == other.value
    }
}

/// Eight hex digits identifying an item by its predicate
fn content_id(name: &str, op: FilterOperator, value: &FilterValue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(op.as_expression().as_bytes());
    hasher.update([0]);
    hasher.update(value.to_string().as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

/// Boolean joiner of a filter tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LogicalOp {
    /// All items must hold
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    /// Any item may hold
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// Single-level conjunction or disjunction of filter items
///
/// An empty item list means "no constraint".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterTree {
    /// Joiner among `items`
    #[serde(default)]
    pub op: LogicalOp,
    /// Predicates, in caller order
    #[serde(default)]
    pub items: Vec<FilterItem>,
}

impl FilterTree {
    /// An AND tree over `items`
    pub fn and(items: Vec<FilterItem>) -> Self {
        Self {
            op: LogicalOp::And,
            items,
        }
    }

    /// Whether the tree constrains nothing
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_attribute_key_wire_shape() {
        let key = AttributeKey::tag("net.peer.name");
        let value = serde_json::to_value(&key).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "net.peer.name--string--tag--false",
                "key": "net.peer.name",
                "dataType": "string",
                "type": "tag",
                "isColumn": false,
                "isJSON": false,
            })
        );
    }

    #[test]
    fn test_attribute_key_lenient_decode() {
        let key: AttributeKey = serde_json::from_value(json!({"key": "custom.key"})).unwrap();
        assert_eq!(key, AttributeKey::tag("custom.key"));

        let key: AttributeKey = serde_json::from_value(json!({
            "key": "duration_nano",
            "dataType": "float64",
            "type": "",
            "isColumn": true,
        }))
        .unwrap();
        assert_eq!(key, AttributeKey::column("duration_nano", DataType::Float64));

        let key: AttributeKey =
            serde_json::from_value(json!({"key": "x", "dataType": "array(string)"})).unwrap();
        assert_eq!(key.data_type, DataType::String);
    }

    #[test]
    fn test_filter_item_decode_without_key() {
        let item: FilterItem =
            serde_json::from_value(json!({"id": "http.method", "op": "=", "value": "GET"}))
                .unwrap();

        assert!(item.key.is_none());
        assert_eq!(item.resolved_key(), Some(AttributeKey::tag("http.method")));
    }

    #[test]
    fn test_data_type_decode() {
        for (text, expected) in [
            ("string", DataType::String),
            ("float64", DataType::Float64),
            ("int64", DataType::Int64),
            ("bool", DataType::Bool),
            ("map(string)", DataType::String),
        ] {
            let decoded: DataType = serde_json::from_value(json!(text)).unwrap();
            assert_eq!(decoded, expected, "{text}");
        }
        assert_eq!(serde_json::to_value(DataType::Int64).unwrap(), json!("int64"));
    }

    #[test]
    fn test_filter_item_decode_without_op() {
        let item: FilterItem = serde_json::from_value(json!({
            "key": {"key": "http.method"},
            "value": "GET",
        }))
        .unwrap();
        assert_eq!(item.op, FilterOperator::Eq);

        let tree: FilterTree = serde_json::from_value(json!({
            "items": [
                {"key": {"key": "http.method"}, "value": "GET"},
                {"key": {"key": "service.name"}, "op": "!=", "value": "cart"},
            ],
            "op": "AND",
        }))
        .unwrap();
        assert_eq!(tree.items.len(), 2);
        assert_eq!(tree.items[1].op, FilterOperator::Ne);
    }

    #[test]
    fn test_content_ids_are_stable() {
        let a = FilterItem::equals("net.peer.name", "example.com");
        let b = FilterItem::equals("net.peer.name", "example.com");
        let c = FilterItem::equals("net.peer.name", "other.com");

        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 8);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_same_predicate_ignores_id() {
        let mut a = FilterItem::equals("service.name", "checkout");
        let b = FilterItem::equals("service.name", "checkout");
        a.id = "caller-id".to_string();

        assert!(a.same_predicate(&b));
        assert!(!a.same_predicate(&FilterItem::equals("service.name", "cart")));
    }

    #[test]
    fn test_tree_op_accepts_lowercase() {
        let tree: FilterTree = serde_json::from_value(json!({"op": "and", "items": []})).unwrap();
        assert_eq!(tree.op, LogicalOp::And);
        assert_eq!(serde_json::to_value(&tree).unwrap()["op"], "AND");
    }
}
