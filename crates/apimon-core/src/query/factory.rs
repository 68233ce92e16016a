//! Composite query payloads for each monitoring view
//!
//! Summary views share one sub-query naming scheme: `A` is the primary
//! count or rate, `B` the p99 latency, `C` the error count feeding `F1`,
//! `D` the last-used timestamp and, where `A` is a rate, `E` the raw count
//! that serves as the error-rate denominator.

use tracing::debug;

use super::attributes::{
    client_kind, domain_identity, duration_key, endpoint_identity, has_error, server_key,
    server_legacy_key, service_name_key, span_id_key, status_code_key, status_message_exists,
    status_message_key, timestamp_key, url_exists, url_full_key, url_legacy_key,
};
use super::filter::{Constraint, MergedFilter};
use crate::config::QueryConfig;
use crate::format::url::endpoint_legend;
use crate::models::{
    AggregateOperator, Aggregation, AttributeKey, BuilderData, BuilderQuery, CompositeQuery,
    DataSource, FilterTree, Formula, OrderBy, PanelType, QueryPayload, TimeRange, WireVersion,
};

/// Selected time marker sent with every payload
const SELECTED_TIME: &str = "GLOBAL_TIME";

/// What a view is scoped to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewScope<'a> {
    /// Called server host
    pub domain: &'a str,
    /// Called URL, for endpoint-level views
    pub endpoint: Option<&'a str>,
    /// Query window
    pub time_range: TimeRange,
    /// Caller's active filters, merged into every sub-query
    pub filters: &'a FilterTree,
}

impl<'a> ViewScope<'a> {
    /// Scope covering a whole domain
    pub fn domain(domain: &'a str, time_range: TimeRange, filters: &'a FilterTree) -> Self {
        Self {
            domain,
            endpoint: None,
            time_range,
            filters,
        }
    }

    /// Narrow the scope to one endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &'a str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    fn endpoint_name(&self) -> Option<&'a str> {
        self.endpoint.filter(|e| !e.is_empty())
    }
}

/// Quantity plotted by a status-code bar chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChartMetric {
    /// Calls per status code
    Count,
    /// p99 latency per status code
    Latency,
}

/// One sub-query before filters are merged in
struct SubQuery {
    name: &'static str,
    operator: AggregateOperator,
    attribute: Option<AttributeKey>,
    extra: Vec<Constraint>,
    disabled: bool,
    legend: String,
}

impl SubQuery {
    fn new(name: &'static str, operator: AggregateOperator, attribute: Option<AttributeKey>) -> Self {
        Self {
            name,
            operator,
            attribute,
            extra: Vec::new(),
            disabled: false,
            legend: String::new(),
        }
    }

    fn count(name: &'static str) -> Self {
        Self::new(name, AggregateOperator::Count, Some(span_id_key()))
    }

    fn rate(name: &'static str) -> Self {
        Self::new(name, AggregateOperator::Rate, None)
    }

    fn p99(name: &'static str) -> Self {
        Self::new(name, AggregateOperator::P99, Some(duration_key()))
    }

    fn last_used(name: &'static str) -> Self {
        Self::new(name, AggregateOperator::Max, Some(timestamp_key()))
    }

    /// Error count, only feeding a formula
    fn errors(name: &'static str) -> Self {
        Self::count(name).with(has_error()).disabled()
    }

    fn with(mut self, constraint: Constraint) -> Self {
        self.extra.push(constraint);
        self
    }

    fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    fn legend(mut self, legend: impl Into<String>) -> Self {
        self.legend = legend.into();
        self
    }
}

/// Everything a view decides before assembly
struct ViewPlan {
    view: &'static str,
    panel: PanelType,
    version: WireVersion,
    base: Vec<Constraint>,
    group_by: Vec<AttributeKey>,
    order_by: Vec<OrderBy>,
    limit: Option<u32>,
    queries: Vec<SubQuery>,
    formulas: Vec<Formula>,
}

impl ViewPlan {
    fn new(view: &'static str, panel: PanelType, version: WireVersion, base: Vec<Constraint>) -> Self {
        Self {
            view,
            panel,
            version,
            base,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            queries: Vec::new(),
            formulas: Vec::new(),
        }
    }
}

fn error_rate(expression: &str) -> Formula {
    Formula {
        query_name: "F1".to_string(),
        expression: expression.to_string(),
        legend: "error percentage".to_string(),
        disabled: false,
    }
}

fn descending(column: &str) -> OrderBy {
    OrderBy {
        column_name: column.to_string(),
        order: "desc".to_string(),
    }
}

/// Builds the payload of every monitoring view
#[derive(Debug, Clone, Default)]
pub struct QueryFactory {
    config: QueryConfig,
}

impl QueryFactory {
    /// Create a factory
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    /// Factory configuration
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Constraints of every view scoped to a domain
    fn domain_base(scope: &ViewScope<'_>) -> Vec<Constraint> {
        vec![domain_identity(scope.domain), url_exists()]
    }

    /// Constraints of views scoped to the domain's client calls, narrowed to
    /// the endpoint when one is given
    fn endpoint_base(scope: &ViewScope<'_>) -> Vec<Constraint> {
        let mut base = Self::domain_base(scope);
        base.push(client_kind());
        if let Some(endpoint) = scope.endpoint_name() {
            base.push(endpoint_identity(endpoint));
        }
        base
    }

    fn assemble(&self, plan: ViewPlan, time_range: TimeRange, filters: &FilterTree) -> QueryPayload {
        let query_data: Vec<BuilderQuery> = plan
            .queries
            .into_iter()
            .map(|sub| {
                let mut constraints = plan.base.clone();
                constraints.extend(sub.extra);
                let filter = MergedFilter::new(constraints, filters).to_wire(plan.version);

                let aggregations = match plan.version {
                    WireVersion::V5 => vec![Aggregation {
                        expression: sub.operator.expression(sub.attribute.as_ref()),
                    }],
                    WireVersion::V4 => Vec::new(),
                };

                BuilderQuery {
                    query_name: sub.name.to_string(),
                    data_source: DataSource::Traces,
                    aggregate_operator: sub.operator,
                    aggregate_attribute: sub.attribute,
                    aggregations,
                    time_aggregation: sub.operator,
                    space_aggregation: "sum".to_string(),
                    filter,
                    group_by: plan.group_by.clone(),
                    order_by: plan.order_by.clone(),
                    limit: plan.limit,
                    legend: sub.legend,
                    disabled: sub.disabled,
                    expression: sub.name.to_string(),
                    step_interval: self.config.step_interval_secs,
                }
            })
            .collect();

        debug!(
            view = plan.view,
            sub_queries = query_data.len(),
            formulas = plan.formulas.len(),
            version = %plan.version,
            "Built query payload"
        );

        QueryPayload {
            start: time_range.start_time,
            end: time_range.end_time,
            step: self.config.step_interval_secs,
            graph_type: plan.panel,
            selected_time: SELECTED_TIME.to_string(),
            format_for_web: plan.panel == PanelType::Table,
            version: plan.version,
            query: CompositeQuery {
                query_type: "builder".to_string(),
                builder: BuilderData {
                    query_data,
                    query_formulas: plan.formulas,
                },
            },
        }
    }

    /// All called domains: endpoints, latency, errors, last use and rate per
    /// server host
    pub fn domain_list(&self, time_range: TimeRange, filters: &FilterTree) -> QueryPayload {
        let mut plan = ViewPlan::new(
            "domain_list",
            PanelType::Table,
            self.config.summary_wire_version,
            vec![url_exists(), client_kind()],
        );
        plan.group_by = vec![server_legacy_key(), server_key()];
        plan.queries = vec![
            SubQuery::new("A", AggregateOperator::CountDistinct, Some(url_legacy_key())),
            SubQuery::p99("B"),
            SubQuery::errors("C"),
            SubQuery::last_used("D"),
            SubQuery::count("E").disabled(),
            SubQuery::rate("F"),
        ];
        plan.formulas = vec![error_rate("(C/E)*100")];
        self.assemble(plan, time_range, filters)
    }

    /// Summary of one domain; the error rate is relative to the call count `A`
    pub fn domain_metrics(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let mut plan = ViewPlan::new(
            "domain_metrics",
            PanelType::Table,
            self.config.summary_wire_version,
            Self::domain_base(scope),
        );
        plan.queries = vec![
            SubQuery::count("A"),
            SubQuery::p99("B"),
            SubQuery::errors("C"),
            SubQuery::last_used("D"),
        ];
        plan.formulas = vec![error_rate("(C/A)*100")];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Summary of one endpoint; `A` is a rate, so the error rate is relative
    /// to the raw count `E`
    pub fn endpoint_metrics(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let mut plan = ViewPlan::new(
            "endpoint_metrics",
            PanelType::Table,
            self.config.summary_wire_version,
            Self::endpoint_base(scope),
        );
        plan.queries = vec![
            SubQuery::rate("A"),
            SubQuery::p99("B"),
            SubQuery::errors("C"),
            SubQuery::last_used("D"),
            SubQuery::count("E").disabled(),
        ];
        plan.formulas = vec![error_rate("(C/E)*100")];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Calls, rate and latency per status code of an endpoint
    pub fn endpoint_status_codes(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let mut plan = ViewPlan::new(
            "endpoint_status_codes",
            PanelType::Table,
            self.config.summary_wire_version,
            Self::endpoint_base(scope),
        );
        plan.group_by = vec![status_code_key()];
        plan.queries = vec![SubQuery::count("A"), SubQuery::p99("B"), SubQuery::rate("C")];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Status-code bar chart. The count and latency charts differ only in
    /// their aggregation and share the same filter.
    pub fn status_code_chart(&self, scope: &ViewScope<'_>, metric: StatusChartMetric) -> QueryPayload {
        let (view, query) = match metric {
            StatusChartMetric::Count => ("status_code_count_chart", SubQuery::count("A")),
            StatusChartMetric::Latency => ("status_code_latency_chart", SubQuery::p99("A")),
        };
        let mut plan = ViewPlan::new(
            view,
            PanelType::Bar,
            self.config.widget_wire_version,
            Self::endpoint_base(scope),
        );
        plan.group_by = vec![status_code_key()];
        plan.queries = vec![query];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Most frequent failing calls of a domain, optionally of one endpoint.
    ///
    /// With `status_message_only` set, only errors that carry a status
    /// message are counted; the toggle alters the filter and so the
    /// payload's cache key.
    pub fn top_errors(&self, scope: &ViewScope<'_>, status_message_only: bool) -> QueryPayload {
        let mut base = Self::domain_base(scope);
        if let Some(endpoint) = scope.endpoint_name() {
            base.push(endpoint_identity(endpoint));
        }
        base.push(has_error());
        if status_message_only {
            base.push(status_message_exists());
        }

        let mut plan = ViewPlan::new(
            "top_errors",
            PanelType::Table,
            self.config.widget_wire_version,
            base,
        );
        plan.group_by = vec![url_legacy_key(), status_code_key(), status_message_key()];
        plan.order_by = vec![descending("A")];
        plan.limit = Some(self.config.top_errors_limit);
        plan.queries = vec![SubQuery::count("A")];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Call rate over time
    pub fn rate_over_time(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let legend = endpoint_legend(scope.domain, scope.endpoint_name());
        let mut plan = ViewPlan::new(
            "rate_over_time",
            PanelType::Graph,
            self.config.widget_wire_version,
            Self::endpoint_base(scope),
        );
        plan.queries = vec![SubQuery::rate("A").legend(legend)];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// p99 latency over time
    pub fn latency_over_time(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let legend = endpoint_legend(scope.domain, scope.endpoint_name());
        let mut plan = ViewPlan::new(
            "latency_over_time",
            PanelType::Graph,
            self.config.widget_wire_version,
            Self::endpoint_base(scope),
        );
        plan.queries = vec![SubQuery::p99("A").legend(legend)];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// URLs of a domain, for the endpoint selector
    pub fn endpoint_dropdown(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let mut plan = ViewPlan::new(
            "endpoint_dropdown",
            PanelType::Table,
            self.config.summary_wire_version,
            Self::domain_base(scope),
        );
        plan.group_by = vec![url_legacy_key(), url_full_key()];
        plan.queries = vec![SubQuery::count("A")];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Services calling an endpoint, with their share, latency, rate and
    /// error percentage
    pub fn dependent_services(&self, scope: &ViewScope<'_>) -> QueryPayload {
        let mut plan = ViewPlan::new(
            "dependent_services",
            PanelType::Table,
            self.config.summary_wire_version,
            Self::endpoint_base(scope),
        );
        plan.group_by = vec![service_name_key()];
        plan.order_by = vec![descending("A")];
        plan.queries = vec![
            SubQuery::count("A"),
            SubQuery::p99("B"),
            SubQuery::rate("C"),
            SubQuery::errors("D"),
        ];
        plan.formulas = vec![error_rate("(D/A)*100")];
        self.assemble(plan, scope.time_range, scope.filters)
    }

    /// Endpoints of a domain, grouped by URL plus any caller group-by keys
    pub fn all_endpoints(&self, scope: &ViewScope<'_>, group_by: &[AttributeKey]) -> QueryPayload {
        let mut keys = vec![url_legacy_key()];
        for key in group_by {
            if !keys.iter().any(|k| k.name == key.name) {
                keys.push(key.clone());
            }
        }

        let mut plan = ViewPlan::new(
            "all_endpoints",
            PanelType::Table,
            self.config.summary_wire_version,
            Self::domain_base(scope),
        );
        plan.group_by = keys;
        plan.queries = vec![
            SubQuery::count("A"),
            SubQuery::p99("B"),
            SubQuery::last_used("C"),
        ];
        self.assemble(plan, scope.time_range, scope.filters)
    }
}
