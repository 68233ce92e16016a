//! Merging of view constraints with user filters
//!
//! Every sub-query's filter is the view's base constraints followed by the
//! caller's filter tree. The merged filter serializes either to a flat
//! expression string or to the legacy item list, depending on the wire
//! version of the payload.

use tracing::warn;

use super::expr::Expr;
use crate::models::{FilterItem, FilterTree, LogicalOp, WireFilter, WireVersion};

/// A predicate a view always applies
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// A single item
    Match(FilterItem),
    /// Any of several equivalent items, one per attribute naming
    AnyOf {
        /// Alternatives, in rendering order
        options: Vec<FilterItem>,
        /// Index of the alternative the legacy item list falls back to
        legacy: usize,
    },
}

impl Constraint {
    /// A disjunction of `options`; `legacy` picks the item-list fallback
    pub fn any_of(options: Vec<FilterItem>, legacy: usize) -> Self {
        Self::AnyOf { options, legacy }
    }

    /// Expression form
    pub fn expr(&self) -> Option<Expr> {
        match self {
            Self::Match(item) => Expr::from_item(item),
            Self::AnyOf { options, .. } => {
                let parts: Vec<Expr> = options.iter().filter_map(Expr::from_item).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(Expr::or(parts))
                }
            }
        }
    }

    /// Single-item form; item lists cannot express a disjunction
    pub fn legacy_item(&self) -> Option<FilterItem> {
        match self {
            Self::Match(item) => Some(item.clone()),
            Self::AnyOf { options, legacy } => {
                options.get(*legacy).or_else(|| options.first()).cloned()
            }
        }
    }
}

/// Base constraints merged with a caller's filter tree
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFilter<'a> {
    base: Vec<Constraint>,
    custom: &'a FilterTree,
}

impl<'a> MergedFilter<'a> {
    /// Merge `base` with `custom`; `custom` is only read
    pub fn new(base: Vec<Constraint>, custom: &'a FilterTree) -> Self {
        Self { base, custom }
    }

    fn custom_exprs(&self) -> Vec<Expr> {
        self.custom
            .items
            .iter()
            .filter_map(|item| {
                let expr = Expr::from_item(item);
                if expr.is_none() {
                    warn!(op = %item.op, "Skipping filter item without an attribute");
                }
                expr
            })
            .collect()
    }

    /// The filter as a tree
    pub fn to_expr(&self) -> Expr {
        let mut parts: Vec<Expr> = self.base.iter().filter_map(Constraint::expr).collect();

        let custom = self.custom_exprs();
        if !custom.is_empty() {
            parts.push(match self.custom.op {
                LogicalOp::And => Expr::and(custom),
                LogicalOp::Or => Expr::or(custom),
            });
        }

        Expr::and(parts)
    }

    /// Flat expression string, base constraints first
    pub fn to_expression_string(&self) -> String {
        self.to_expr().to_string()
    }

    /// Legacy AND-ed item list, base constraints first
    pub fn to_items_array(&self) -> FilterTree {
        if self.custom.op == LogicalOp::Or && self.custom.items.len() > 1 {
            warn!(
                items = self.custom.items.len(),
                "Item lists cannot express OR, custom filters are AND-ed"
            );
        }

        let mut items: Vec<FilterItem> = self.base.iter().filter_map(Constraint::legacy_item).collect();
        for item in &self.custom.items {
            match item.resolved_key() {
                Some(key) => items.push(FilterItem {
                    key: Some(key),
                    ..item.clone()
                }),
                None => warn!(op = %item.op, "Skipping filter item without an attribute"),
            }
        }

        FilterTree::and(items)
    }

    /// Wire shape for `version`
    pub fn to_wire(&self, version: WireVersion) -> WireFilter {
        match version {
            WireVersion::V5 => WireFilter::Expression {
                expression: self.to_expression_string(),
            },
            WireVersion::V4 => WireFilter::Items(self.to_items_array()),
        }
    }
}

/// Flat expression for `base` AND `custom`
pub fn build(base: &[Constraint], custom: &FilterTree) -> String {
    MergedFilter::new(base.to_vec(), custom).to_expression_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeKey, FilterOperator};
    use crate::query::attributes::{client_kind, domain_identity, url_exists};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn custom(op: LogicalOp, items: Vec<FilterItem>) -> FilterTree {
        FilterTree { op, items }
    }

    #[test]
    fn test_domain_base_expression() {
        let expression = build(
            &[domain_identity("0.0.0.0"), url_exists()],
            &FilterTree::default(),
        );

        assert_eq!(
            expression,
            "(net.peer.name = '0.0.0.0' OR server.address = '0.0.0.0') AND (url.full EXISTS OR http.url EXISTS)"
        );
    }

    #[test]
    fn test_empty_custom_filter_adds_no_operator() {
        let expression = build(&[client_kind()], &FilterTree::default());
        assert_eq!(expression, "kind_string = 'Client'");
        assert!(!expression.ends_with("AND"));
    }

    #[test]
    fn test_custom_items_follow_base() {
        let filters = custom(
            LogicalOp::And,
            vec![
                FilterItem::equals("http.method", "GET"),
                FilterItem::equals("deployment.environment", "prod"),
            ],
        );

        let expression = build(&[client_kind()], &filters);
        assert_eq!(
            expression,
            "kind_string = 'Client' AND http.method = 'GET' AND deployment.environment = 'prod'"
        );
    }

    #[test]
    fn test_custom_or_is_grouped() {
        let filters = custom(
            LogicalOp::Or,
            vec![
                FilterItem::equals("http.method", "GET"),
                FilterItem::equals("http.method", "POST"),
            ],
        );

        let expression = build(&[client_kind()], &filters);
        assert_eq!(
            expression,
            "kind_string = 'Client' AND (http.method = 'GET' OR http.method = 'POST')"
        );
    }

    #[test]
    fn test_items_without_key_fall_back_to_id() {
        let mut item = FilterItem::equals("http.method", "GET");
        item.key = None;
        item.id = "http.method".to_string();

        let expression = build(&[], &FilterTree::and(vec![item]));
        assert_eq!(expression, "http.method = 'GET'");
    }

    #[test]
    fn test_unresolvable_items_are_skipped() {
        let item = FilterItem {
            id: String::new(),
            key: None,
            op: FilterOperator::Eq,
            value: "x".into(),
        };

        let expression = build(&[client_kind()], &FilterTree::and(vec![item]));
        assert_eq!(expression, "kind_string = 'Client'");
    }

    #[test]
    fn test_items_array_uses_legacy_alternatives() {
        let filters = FilterTree::and(vec![FilterItem::equals("http.method", "GET")]);
        let merged = MergedFilter::new(vec![domain_identity("api.example.com"), url_exists()], &filters);

        let tree = merged.to_items_array();
        let names: Vec<String> = tree
            .items
            .iter()
            .map(|i| i.key.as_ref().unwrap().name.clone())
            .collect();

        assert_eq!(tree.op, LogicalOp::And);
        assert_eq!(names, vec!["net.peer.name", "http.url", "http.method"]);
        assert_eq!(tree.items[1].op, FilterOperator::Exists);
    }

    #[test]
    fn test_items_array_never_drops_base_under_or() {
        let filters = custom(
            LogicalOp::Or,
            vec![
                FilterItem::equals("http.method", "GET"),
                FilterItem::equals("http.method", "POST"),
            ],
        );
        let tree = MergedFilter::new(vec![client_kind()], &filters).to_items_array();

        assert_eq!(tree.op, LogicalOp::And);
        assert_eq!(tree.items.len(), 3);
        assert_eq!(tree.items[0].key, Some(AttributeKey::column("kind_string", crate::models::DataType::String)));
    }

    #[rstest]
    #[case(WireVersion::V5, true)]
    #[case(WireVersion::V4, false)]
    fn test_wire_shape_follows_version(#[case] version: WireVersion, #[case] expression: bool) {
        let filters = FilterTree::default();
        let wire = MergedFilter::new(vec![client_kind()], &filters).to_wire(version);
        assert_eq!(matches!(wire, WireFilter::Expression { .. }), expression);
    }

    #[test]
    fn test_caller_filters_are_not_mutated() {
        let filters = FilterTree::and(vec![FilterItem::equals("http.method", "GET")]);
        let before = filters.clone();

        let _ = build(&[domain_identity("a.com")], &filters);
        let _ = MergedFilter::new(vec![client_kind()], &filters).to_items_array();

        assert_eq!(filters, before);
    }
}
