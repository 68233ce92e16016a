//! Raw engine results to display rows
//!
//! Missing values never fail: arithmetic cells (counts, rates, error
//! percentages) fall back to `0` where the views sum or compare them, and
//! descriptive cells (latency, last use, labels) fall back to `"-"`. Row order
//! is always the engine's order.

use std::net::IpAddr;

use serde_json::Map;
use tracing::debug;

use super::relative_time::{absolute, parse_timestamp, relative};
use super::status_code::{bucket_aggregate, AggregationMode};
use crate::models::{
    present_text, row_key, AttributeKey, CellValue, DependentServiceRow, DomainMetricsRow, DomainRow,
    DropdownOption, EndpointMetricsRow, EndpointRow, RawResultRow, ServiceData, StatusCodeRow,
    TimeSeries, TopErrorRow, PLACEHOLDER,
};
use crate::query::attributes::{
    RESPONSE_STATUS_CODE, SERVER_ADDRESS, SERVER_ADDRESS_LEGACY, SERVICE_NAME, STATUS_MESSAGE,
    URL_FULL, URL_LEGACY,
};

const NANOS_PER_MILLI: f64 = 1_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

fn zero() -> CellValue {
    CellValue::Integer(0)
}

fn text_or(row: &RawResultRow, key: &str, default: CellValue) -> CellValue {
    row.text(key).map_or(default, CellValue::Text)
}

/// Nanoseconds to whole milliseconds
#[allow(clippy::cast_possible_truncation)]
fn latency_ms(row: &RawResultRow, key: &str) -> CellValue {
    row.number(key).map_or(CellValue::Placeholder, |ns| {
        CellValue::Integer((ns / NANOS_PER_MILLI).round() as i64)
    })
}

/// Nanoseconds to seconds with three decimals
fn latency_seconds(row: &RawResultRow, key: &str) -> CellValue {
    row.number(key).map_or(CellValue::Placeholder, |ns| {
        CellValue::Decimal(round_to(ns / NANOS_PER_SECOND, 3))
    })
}

fn percentage(row: &RawResultRow, key: &str) -> CellValue {
    row.number(key).map_or_else(zero, CellValue::Decimal)
}

fn last_used(row: &RawResultRow, key: &str) -> CellValue {
    match parse_timestamp(row.data.get(key)) {
        Some(millis) => CellValue::Text(relative(Some(millis))),
        None => CellValue::Placeholder,
    }
}

/// Sum of a cell across rows, skipping sentinels
fn column_total(rows: &[RawResultRow], key: &str) -> f64 {
    rows.iter().filter_map(|row| row.number(key)).sum()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[allow(clippy::cast_possible_truncation)]
fn number_cell(value: f64) -> CellValue {
    if value.fract() == 0.0 && value.abs() < 9e15 {
        CellValue::Integer(value as i64)
    } else {
        CellValue::Decimal(value)
    }
}

fn domain_name(row: &RawResultRow) -> Option<String> {
    row.first_text(&[SERVER_ADDRESS, SERVER_ADDRESS_LEGACY])
}

fn url(row: &RawResultRow) -> Option<String> {
    row.first_text(&[URL_LEGACY, URL_FULL])
}

/// Domain list rows. The last-used column keeps the engine's timestamp in
/// absolute form.
pub fn format_domain_list(rows: &[RawResultRow]) -> Vec<DomainRow> {
    let out: Vec<DomainRow> = rows
        .iter()
        .map(|row| DomainRow {
            key: row_key(),
            domain_name: domain_name(row).unwrap_or_else(|| PLACEHOLDER.to_string()),
            endpoint_count: text_or(row, "A", zero()),
            rate: text_or(row, "F", CellValue::Placeholder),
            error_rate: percentage(row, "F1"),
            latency: latency_ms(row, "B"),
            last_used: absolute(row.data.get("D")).map_or(CellValue::Placeholder, CellValue::Text),
        })
        .collect();
    debug!(rows = rows.len(), formatted = out.len(), "Formatted domain list");
    out
}

/// Drop domains that are bare IP addresses
pub fn retain_hostname_domains(rows: Vec<RawResultRow>) -> Vec<RawResultRow> {
    rows.into_iter()
        .filter(|row| {
            domain_name(row).map_or(true, |name| name.parse::<IpAddr>().is_err())
        })
        .collect()
}

/// Domain summary rows
pub fn format_domain_metrics(rows: &[RawResultRow]) -> Vec<DomainMetricsRow> {
    rows.iter()
        .map(|row| DomainMetricsRow {
            key: row_key(),
            call_count: text_or(row, "A", zero()),
            latency: latency_ms(row, "B"),
            error_rate: percentage(row, "F1"),
            last_used: last_used(row, "D"),
        })
        .collect()
}

/// Endpoint summary rows
pub fn format_endpoint_metrics(rows: &[RawResultRow]) -> Vec<EndpointMetricsRow> {
    rows.iter()
        .map(|row| EndpointMetricsRow {
            key: row_key(),
            rate: text_or(row, "A", CellValue::Placeholder),
            latency: latency_ms(row, "B"),
            error_rate: percentage(row, "F1"),
            last_used: last_used(row, "D"),
        })
        .collect()
}

/// Status-code breakdown rows, in engine order
pub fn format_endpoint_status_codes(rows: &[RawResultRow]) -> Vec<StatusCodeRow> {
    rows.iter()
        .map(|row| StatusCodeRow {
            key: row_key(),
            status_code: text_or(row, RESPONSE_STATUS_CODE, CellValue::Placeholder),
            count: text_or(row, "A", CellValue::Placeholder),
            rate: text_or(row, "C", CellValue::Placeholder),
            p99_latency: latency_ms(row, "B"),
        })
        .collect()
}

/// Endpoint selector options; rows without a URL still yield a `"-"` option
pub fn format_endpoint_dropdown(rows: &[RawResultRow]) -> Vec<DropdownOption> {
    rows.iter()
        .map(|row| {
            let value = url(row).unwrap_or_else(|| PLACEHOLDER.to_string());
            DropdownOption {
                key: row_key(),
                label: value.clone(),
                value,
            }
        })
        .collect()
}

/// Dependent-service rows with each service's share of all calls
pub fn format_dependent_services(rows: &[RawResultRow]) -> Vec<DependentServiceRow> {
    let total = column_total(rows, "A");

    rows.iter()
        .map(|row| {
            let count = row.number("A");
            let percentage = match count {
                Some(count) if total > 0.0 => round_to(count / total * 100.0, 2),
                _ => 0.0,
            };
            DependentServiceRow {
                key: row_key(),
                service_data: ServiceData {
                    service_name: row
                        .text(SERVICE_NAME)
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                    count: count.map_or(CellValue::Placeholder, number_cell),
                    percentage,
                },
                latency: latency_ms(row, "B"),
                rate: text_or(row, "C", CellValue::Placeholder),
                error_percentage: text_or(row, "F1", zero()),
            }
        })
        .collect()
}

fn first_label(series: &TimeSeries, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| series.label(k))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Top-error rows from grouped error-count series
pub fn format_top_errors(series: &[TimeSeries]) -> Vec<TopErrorRow> {
    series
        .iter()
        .map(|s| TopErrorRow {
            key: row_key(),
            endpoint_name: first_label(s, &[URL_LEGACY, URL_FULL]),
            status_code: first_label(s, &[RESPONSE_STATUS_CODE]),
            status_message: first_label(s, &[STATUS_MESSAGE]),
            count: s
                .values
                .first()
                .and_then(|p| present_text(Some(&p.1)))
                .map_or(CellValue::Placeholder, CellValue::Text),
        })
        .collect()
}

/// Endpoint table rows. Without extra group-by keys the endpoint is the
/// URL; otherwise it is the group values joined by `", "` and the raw values
/// are kept in `grouped_by_meta` for drill-down.
pub fn format_endpoints(rows: &[RawResultRow], group_by: &[AttributeKey]) -> Vec<EndpointRow> {
    let grouped: Vec<&AttributeKey> = group_by
        .iter()
        .filter(|k| k.name != URL_LEGACY)
        .collect();

    rows.iter()
        .map(|row| {
            let mut meta = Map::new();
            let endpoint_name = if grouped.is_empty() {
                url(row).unwrap_or_else(|| PLACEHOLDER.to_string())
            } else {
                let parts: Vec<String> = group_by
                    .iter()
                    .map(|key| {
                        if let Some(value) = row.data.get(&key.name) {
                            meta.insert(key.name.clone(), value.clone());
                        }
                        row.text(&key.name).unwrap_or_else(|| PLACEHOLDER.to_string())
                    })
                    .collect();
                parts.join(", ")
            };

            EndpointRow {
                key: row_key(),
                endpoint_name,
                call_count: text_or(row, "A", zero()),
                latency: latency_seconds(row, "B"),
                last_used: last_used(row, "C"),
                grouped_by_meta: meta,
            }
        })
        .collect()
}

/// Status-code chart series merged per bucket
pub fn format_status_code_chart(series: &[TimeSeries], mode: AggregationMode) -> Vec<TimeSeries> {
    let out = bucket_aggregate(series, mode);
    debug!(series = series.len(), buckets = out.len(), ?mode, "Formatted status code chart");
    out
}
