//! Engine results to display rows, chart series and drill-down filters

pub mod group_by;
pub mod relative_time;
pub mod rows;
pub mod status_code;
pub mod url;

pub use group_by::{correlation_filters, derive, merge_drilldown_filters};
pub use relative_time::{relative, relative_to};
pub use rows::*;
pub use status_code::{
    aggregate_bucket, bucket_aggregate, classify, range_filter, range_filter_for_metric,
    AggregationMode, StatusCodeBucket,
};
pub use url::extract_port_and_endpoint;
