//! Query construction: filter expressions and view payloads

pub mod attributes;
pub mod expr;
pub mod factory;
pub mod filter;

pub use expr::Expr;
pub use factory::{QueryFactory, StatusChartMetric, ViewScope};
pub use filter::{build, Constraint, MergedFilter};
