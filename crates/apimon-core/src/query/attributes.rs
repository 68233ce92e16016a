//! Span attributes the monitoring views filter, group and aggregate on
//!
//! Client spans carry the called server and URL under either the current or
//! the legacy semantic-convention name, so both are matched wherever the
//! identity of a domain or endpoint matters.

use crate::models::{AttributeKey, DataType, FilterItem, FilterOperator};

use super::filter::Constraint;

/// Called server host, current convention
pub const SERVER_ADDRESS: &str = "server.address";
/// Called server host, legacy convention
pub const SERVER_ADDRESS_LEGACY: &str = "net.peer.name";
/// Full request URL, current convention
pub const URL_FULL: &str = "url.full";
/// Full request URL, legacy convention
pub const URL_LEGACY: &str = "http.url";
/// Response status code column
pub const RESPONSE_STATUS_CODE: &str = "response_status_code";
/// Span status message column
pub const STATUS_MESSAGE: &str = "status_message";
/// Calling service resource attribute
pub const SERVICE_NAME: &str = "service.name";
/// Span kind column
pub const SPAN_KIND: &str = "kind_string";
/// Error flag column
pub const HAS_ERROR: &str = "has_error";
/// Span duration column, nanoseconds
pub const DURATION_NANO: &str = "duration_nano";
/// Span start column
pub const TIMESTAMP: &str = "timestamp";
/// Span id column
pub const SPAN_ID: &str = "span_id";

/// Span kind value of outgoing calls
pub const CLIENT_KIND: &str = "Client";

/// Legacy server host key
pub fn server_legacy_key() -> AttributeKey {
    AttributeKey::tag(SERVER_ADDRESS_LEGACY)
}

/// Current server host key
pub fn server_key() -> AttributeKey {
    AttributeKey::tag(SERVER_ADDRESS)
}

/// Legacy URL key; the default endpoint grouping
pub fn url_legacy_key() -> AttributeKey {
    AttributeKey::tag(URL_LEGACY)
}

/// Current URL key
pub fn url_full_key() -> AttributeKey {
    AttributeKey::tag(URL_FULL)
}

/// Status code key
pub fn status_code_key() -> AttributeKey {
    AttributeKey::column(RESPONSE_STATUS_CODE, DataType::String)
}

/// Status message key
pub fn status_message_key() -> AttributeKey {
    AttributeKey::column(STATUS_MESSAGE, DataType::String)
}

/// Calling service key
pub fn service_name_key() -> AttributeKey {
    AttributeKey::resource(SERVICE_NAME)
}

/// Duration key, the target of latency percentiles
pub fn duration_key() -> AttributeKey {
    AttributeKey::column(DURATION_NANO, DataType::Float64)
}

/// Timestamp key, the target of last-used maxima
pub fn timestamp_key() -> AttributeKey {
    AttributeKey::column(TIMESTAMP, DataType::Int64)
}

/// Span id key, the target of call counts
pub fn span_id_key() -> AttributeKey {
    AttributeKey::column(SPAN_ID, DataType::String)
}

/// Spans calling `domain` under either host attribute
pub fn domain_identity(domain: &str) -> Constraint {
    Constraint::any_of(
        vec![
            FilterItem::new(server_legacy_key(), FilterOperator::Eq, domain),
            FilterItem::new(server_key(), FilterOperator::Eq, domain),
        ],
        0,
    )
}

/// Spans carrying a URL under either attribute
pub fn url_exists() -> Constraint {
    Constraint::any_of(
        vec![
            FilterItem::exists(url_full_key()),
            FilterItem::exists(url_legacy_key()),
        ],
        1,
    )
}

/// Spans calling `endpoint` under either URL attribute
pub fn endpoint_identity(endpoint: &str) -> Constraint {
    Constraint::any_of(
        vec![
            FilterItem::new(url_legacy_key(), FilterOperator::Eq, endpoint),
            FilterItem::new(url_full_key(), FilterOperator::Eq, endpoint),
        ],
        0,
    )
}

/// Outgoing calls only
pub fn client_kind() -> Constraint {
    Constraint::Match(FilterItem::new(
        AttributeKey::column(SPAN_KIND, DataType::String),
        FilterOperator::Eq,
        CLIENT_KIND,
    ))
}

/// Failed spans only
pub fn has_error() -> Constraint {
    Constraint::Match(FilterItem::new(
        AttributeKey::column(HAS_ERROR, DataType::Bool),
        FilterOperator::Eq,
        true,
    ))
}

/// Spans with a status message
pub fn status_message_exists() -> Constraint {
    Constraint::Match(FilterItem::exists(status_message_key()))
}
