//! apimon CLI
//!
//! Builds monitoring payloads and formats query engine responses from the
//! command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use apimon::format::{self, AggregationMode};
use apimon::models::{AttributeKey, FilterTree, QueryResponse, TimeRange};
use apimon::query::{QueryFactory, StatusChartMetric, ViewScope};
use apimon::Config;
use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// apimon - API monitoring queries
#[derive(Parser)]
#[command(name = "apimon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "APIMON_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "pretty")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum View {
    DomainList,
    DomainMetrics,
    EndpointMetrics,
    EndpointStatusCodes,
    StatusCodeCount,
    StatusCodeLatency,
    TopErrors,
    RateOverTime,
    LatencyOverTime,
    EndpointDropdown,
    DependentServices,
    AllEndpoints,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Shape {
    DomainList,
    DomainMetrics,
    EndpointMetrics,
    EndpointStatusCodes,
    EndpointDropdown,
    DependentServices,
    TopErrors,
    AllEndpoints,
    StatusCodeChart,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the query payload of a monitoring view
    Payload {
        /// View to build
        #[arg(value_enum)]
        view: View,

        /// Called server host
        #[arg(long)]
        domain: Option<String>,

        /// Called URL, for endpoint-level views
        #[arg(long)]
        endpoint: Option<String>,

        /// Time range ending now (e.g. "15m", "1h", "7d")
        #[arg(long, default_value = "1h")]
        last: String,

        /// Window start in epoch milliseconds (with --end)
        #[arg(long, requires = "end")]
        start: Option<i64>,

        /// Window end in epoch milliseconds (with --start)
        #[arg(long, requires = "start")]
        end: Option<i64>,

        /// JSON file holding the active filter tree
        #[arg(long)]
        filters: Option<PathBuf>,

        /// Extra group-by attributes for the endpoint table
        #[arg(long, value_delimiter = ',')]
        group_by: Vec<String>,

        /// Only count errors that carry a status message
        #[arg(long)]
        status_message_only: bool,
    },

    /// Format a query engine response into display rows
    Format {
        /// Row shape to produce
        #[arg(value_enum)]
        shape: Shape,

        /// JSON file holding the engine response
        #[arg(long)]
        input: PathBuf,

        /// How status-code chart buckets combine values (sum or average)
        #[arg(long, default_value = "sum")]
        mode: AggregationMode,

        /// Group-by attributes the endpoint table was built with
        #[arg(long, value_delimiter = ',')]
        group_by: Vec<String>,

        /// Drop domains that are bare IP addresses
        #[arg(long)]
        hostnames_only: bool,
    },

    /// Show the bucket and range filter of a status code
    Classify {
        /// Status code as reported, e.g. "404" or "unknown"
        code: String,
    },

    /// Derive drill-down filters from a clicked result row
    Drilldown {
        /// JSON file holding the row object
        #[arg(long)]
        row: PathBuf,

        /// Group-by attributes of the table the row came from
        #[arg(long, value_delimiter = ',')]
        group_by: Vec<String>,

        /// JSON file holding the active filter tree to extend
        #[arg(long)]
        filters: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let result = match cli.command {
        Commands::Payload {
            view,
            domain,
            endpoint,
            last,
            start,
            end,
            filters,
            group_by,
            status_message_only,
        } => {
            let request = PayloadRequest {
                view,
                domain,
                endpoint,
                last,
                window: start.zip(end),
                filters,
                group_by,
                status_message_only,
            };
            run_payload(&config, request, cli.format)
        }
        Commands::Format {
            shape,
            input,
            mode,
            group_by,
            hostnames_only,
        } => run_format(shape, &input, mode, &group_by, hostnames_only, cli.format),
        Commands::Classify { code } => run_classify(&code, cli.format),
        Commands::Drilldown {
            row,
            group_by,
            filters,
        } => run_drilldown(&row, &group_by, filters.as_deref(), cli.format),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn group_by_keys(names: &[String]) -> Vec<AttributeKey> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(AttributeKey::tag)
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct PayloadRequest {
    view: View,
    domain: Option<String>,
    endpoint: Option<String>,
    last: String,
    window: Option<(i64, i64)>,
    filters: Option<PathBuf>,
    group_by: Vec<String>,
    status_message_only: bool,
}

fn run_payload(config: &Config, request: PayloadRequest, format: OutputFormat) -> anyhow::Result<()> {
    let time_range = match request.window {
        Some((start, end)) => TimeRange::new(start, end)?,
        None => TimeRange::last(&request.last, Utc::now())?,
    };
    let filters: FilterTree = match &request.filters {
        Some(path) => read_json(path)?,
        None => FilterTree::default(),
    };
    let factory = QueryFactory::new(config.query.clone());

    let domain = match (request.view, request.domain.as_deref()) {
        (View::DomainList, domain) => domain.unwrap_or_default(),
        (_, Some(domain)) => domain,
        (view, None) => bail!("--domain is required for {view:?}"),
    };
    let mut scope = ViewScope::domain(domain, time_range, &filters);
    if let Some(endpoint) = request.endpoint.as_deref() {
        scope = scope.with_endpoint(endpoint);
    }

    let payload = match request.view {
        View::DomainList => factory.domain_list(time_range, &filters),
        View::DomainMetrics => factory.domain_metrics(&scope),
        View::EndpointMetrics => factory.endpoint_metrics(&scope),
        View::EndpointStatusCodes => factory.endpoint_status_codes(&scope),
        View::StatusCodeCount => factory.status_code_chart(&scope, StatusChartMetric::Count),
        View::StatusCodeLatency => factory.status_code_chart(&scope, StatusChartMetric::Latency),
        View::TopErrors => factory.top_errors(&scope, request.status_message_only),
        View::RateOverTime => factory.rate_over_time(&scope),
        View::LatencyOverTime => factory.latency_over_time(&scope),
        View::EndpointDropdown => factory.endpoint_dropdown(&scope),
        View::DependentServices => factory.dependent_services(&scope),
        View::AllEndpoints => factory.all_endpoints(&scope, &group_by_keys(&request.group_by)),
    };

    let cache_key = payload.cache_key();
    info!(view = ?request.view, %cache_key, "Built payload");

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "cacheKey": cache_key,
            "payload": payload,
        })),
        OutputFormat::Pretty => {
            println!("{} {}", style("Cache key:").bold(), cache_key);
            for query in payload.queries() {
                let filter = query
                    .filter_expression()
                    .map(str::to_string)
                    .or_else(|| query.filter_items().map(|t| format!("{} items", t.items.len())))
                    .unwrap_or_default();
                let marker = if query.disabled { " (disabled)" } else { "" };
                println!(
                    "  {} {:?}{marker}: {filter}",
                    style(&query.query_name).cyan(),
                    query.aggregate_operator
                );
            }
            for formula in &payload.query.builder.query_formulas {
                println!(
                    "  {} = {}",
                    style(&formula.query_name).cyan(),
                    formula.expression
                );
            }
            Ok(())
        }
    }
}

fn run_format(
    shape: Shape,
    input: &Path,
    mode: AggregationMode,
    group_by: &[String],
    hostnames_only: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let response = QueryResponse::from_json(&text)?;
    let rows = response.rows();
    let series = response.series();
    debug!(rows = rows.len(), series = series.len(), ?shape, "Formatting response");

    let formatted = match shape {
        Shape::DomainList => {
            let rows = if hostnames_only {
                format::retain_hostname_domains(rows)
            } else {
                rows
            };
            serde_json::to_value(format::format_domain_list(&rows))?
        }
        Shape::DomainMetrics => serde_json::to_value(format::format_domain_metrics(&rows))?,
        Shape::EndpointMetrics => serde_json::to_value(format::format_endpoint_metrics(&rows))?,
        Shape::EndpointStatusCodes => {
            serde_json::to_value(format::format_endpoint_status_codes(&rows))?
        }
        Shape::EndpointDropdown => serde_json::to_value(format::format_endpoint_dropdown(&rows))?,
        Shape::DependentServices => {
            serde_json::to_value(format::format_dependent_services(&rows))?
        }
        Shape::TopErrors => serde_json::to_value(format::format_top_errors(&series))?,
        Shape::AllEndpoints => serde_json::to_value(format::format_endpoints(
            &rows,
            &group_by_keys(group_by),
        ))?,
        Shape::StatusCodeChart => {
            serde_json::to_value(format::format_status_code_chart(&series, mode))?
        }
    };

    match format {
        OutputFormat::Json => print_json(&formatted),
        OutputFormat::Pretty => {
            let entries = formatted.as_array().map_or(0, Vec::len);
            println!("{} {entries}", style("Rows:").bold());
            print_json(&formatted)
        }
    }
}

fn run_classify(code: &str, format: OutputFormat) -> anyhow::Result<()> {
    let bucket = format::classify(code);
    let filters = format::range_filter(bucket.label());

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "code": code,
            "bucket": bucket.label(),
            "filters": filters,
        })),
        OutputFormat::Pretty => {
            println!("{} {}", style(code).bold(), bucket);
            for item in &filters {
                let name = item.key.as_ref().map_or("", |k| k.name.as_str());
                println!("  {name} {} {:?}", item.op, item.value.to_string());
            }
            Ok(())
        }
    }
}

fn run_drilldown(
    row: &Path,
    group_by: &[String],
    filters: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let row: Value = read_json(row)?;
    let Value::Object(row) = row else {
        bail!("row must be a JSON object");
    };
    let keys = group_by_keys(group_by);

    let tree = match filters {
        Some(path) => {
            let current: FilterTree = read_json(path)?;
            format::merge_drilldown_filters(&current, &row, &keys)
        }
        None => format::derive(&row, &keys),
    };

    match format {
        OutputFormat::Json => print_json(&tree),
        OutputFormat::Pretty => {
            println!("{} {}", style("Filters:").bold(), tree.op);
            for item in &tree.items {
                let name = item.key.as_ref().map_or("", |k| k.name.as_str());
                println!("  {name} {} {}", item.op, item.value);
            }
            Ok(())
        }
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "apimon", &mut io::stdout());
}
