//! Boolean filter expressions
//!
//! Filters are assembled as a small tree and only flattened to the engine's
//! expression language at the wire boundary. Rendering follows operator
//! precedence: a disjunction is always parenthesized, so it stays intact
//! when conjoined with other predicates.

use std::fmt;

use crate::models::{FilterItem, FilterOperator, FilterValue, Scalar};

/// A filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `key <op> value`
    Predicate {
        /// Attribute name
        key: String,
        /// Operator
        op: FilterOperator,
        /// Compared value, unused for unary operators
        value: FilterValue,
    },
    /// All children hold
    And(Vec<Expr>),
    /// Any child holds
    Or(Vec<Expr>),
}

impl Expr {
    /// Expression for a filter item; `None` when the item names no attribute
    pub fn from_item(item: &FilterItem) -> Option<Self> {
        let key = item.resolved_key()?;
        Some(Self::Predicate {
            key: key.name,
            op: item.op,
            value: item.value.clone(),
        })
    }

    /// Conjunction, flattening nested conjunctions and dropping empty ones
    pub fn and(parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::And(children) => flat.extend(children),
                Self::Or(children) if children.is_empty() => {}
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::And(flat)
        }
    }

    /// Disjunction, flattening nested disjunctions and dropping empty ones
    pub fn or(parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::Or(children) => flat.extend(children),
                Self::And(children) if children.is_empty() => {}
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::Or(flat)
        }
    }

    /// Whether the expression constrains nothing
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            Self::Predicate { .. } => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate { key, op, value } => {
                if op.is_unary() {
                    write!(f, "{key} {op}")
                } else {
                    write!(f, "{key} {op} ")?;
                    write_value(f, value)
                }
            }
            Self::And(children) => write_joined(f, children, " AND "),
            Self::Or(children) if children.len() > 1 => {
                f.write_str("(")?;
                write_joined(f, children, " OR ")?;
                f.write_str(")")
            }
            Self::Or(children) => write_joined(f, children, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Expr], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &FilterValue) -> fmt::Result {
    match value {
        FilterValue::One(scalar) => write_scalar(f, scalar),
        FilterValue::Many(values) => {
            f.write_str("(")?;
            for (i, scalar) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_scalar(f, scalar)?;
            }
            f.write_str(")")
        }
    }
}

fn write_scalar(f: &mut fmt::Formatter<'_>, scalar: &Scalar) -> fmt::Result {
    match scalar {
        Scalar::Text(s) => {
            let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
            write!(f, "'{escaped}'")
        }
        other => write!(f, "{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeKey, DataType};

    fn eq(key: &str, value: &str) -> Expr {
        Expr::Predicate {
            key: key.to_string(),
            op: FilterOperator::Eq,
            value: value.into(),
        }
    }

    #[test]
    fn test_predicate_rendering() {
        assert_eq!(eq("http.method", "GET").to_string(), "http.method = 'GET'");

        let exists = Expr::from_item(&FilterItem::exists(AttributeKey::tag("url.full"))).unwrap();
        assert_eq!(exists.to_string(), "url.full EXISTS");

        let error = Expr::from_item(&FilterItem::new(
            AttributeKey::column("has_error", DataType::Bool),
            FilterOperator::Eq,
            true,
        ))
        .unwrap();
        assert_eq!(error.to_string(), "has_error = true");
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(eq("name", "it's").to_string(), r"name = 'it\'s'");
    }

    #[test]
    fn test_value_lists() {
        let item = FilterItem::new(
            AttributeKey::tag("service.name"),
            FilterOperator::In,
            FilterValue::Many(vec!["a".into(), "b".into()]),
        );
        assert_eq!(
            Expr::from_item(&item).unwrap().to_string(),
            "service.name IN ('a', 'b')"
        );
    }

    #[test]
    fn test_disjunction_inside_conjunction_is_parenthesized() {
        let expr = Expr::and([
            Expr::or([eq("a", "x"), eq("b", "x")]),
            eq("c", "y"),
        ]);
        assert_eq!(expr.to_string(), "(a = 'x' OR b = 'x') AND c = 'y'");
    }

    #[test]
    fn test_flattening() {
        let expr = Expr::and([Expr::and([eq("a", "1"), eq("b", "2")]), eq("c", "3")]);
        assert_eq!(expr, Expr::And(vec![eq("a", "1"), eq("b", "2"), eq("c", "3")]));

        assert_eq!(Expr::and([eq("a", "1")]), eq("a", "1"));
        assert!(Expr::and([]).is_empty());
        assert_eq!(Expr::and([]).to_string(), "");
    }
}
