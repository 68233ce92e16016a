//! Data models for apimon

mod filter;
mod payload;
mod response;
mod rows;

pub use filter::*;
pub use payload::*;
pub use response::*;
pub use rows::*;
