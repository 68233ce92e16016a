//! # apimon
//!
//! Query construction and response shaping for API monitoring dashboards.
//!
//! apimon builds the composite query payloads behind an "external API
//! calls" view (domains, endpoints, status codes, dependent services, top
//! errors) and turns the query engine's raw answers into display rows.
//!
//! ## Architecture
//!
//! - **Query**: filter expressions and one payload factory per view
//! - **Format**: row formatters, status-code buckets, relative times and
//!   drill-down filters
//! - **Models**: filter trees, payloads, engine results and display rows
//!
//! ## Quick Start
//!
//! ```bash
//! # Payload for a domain's summary over the last hour
//! apimon payload domain-metrics --domain api.example.com --last 1h
//!
//! # Format an engine response
//! apimon format domain-metrics --input response.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod query;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::{Config, QueryConfig};
    pub use crate::error::{Error, Result};
    pub use crate::format::{AggregationMode, StatusCodeBucket};
    pub use crate::models::*;
    pub use crate::query::{QueryFactory, StatusChartMetric, ViewScope};
}
