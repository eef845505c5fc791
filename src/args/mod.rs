//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;


pub use cli::{DEFAULT_BASE_URL, RunArgs};
pub use types::{BodySource, HttpMethod, PositiveU64, PositiveUsize, TargetSpec};

pub(crate) use parsers::{parse_duration_value, parse_target_spec};
