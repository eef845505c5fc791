use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::parsers::{
    parse_bool_env, parse_duration_arg, parse_positive_u64, parse_positive_usize,
    parse_target_spec,
};
use super::types::{BodySource, PositiveU64, PositiveUsize, TargetSpec};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8200/";

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Time-boxed HTTP load generator - runs one worker per target, stops them on timeout or Ctrl+C, and prints per-target status distributions."
)]
pub struct RunArgs {
    /// Root URL that targets are resolved against
    #[arg(long = "base-url", env = "HEY_APM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Stop the run after this duration (e.g. 500ms, 10s, 1m30s)
    #[arg(
        long = "run",
        env = "HEY_APM_RUN",
        default_value = "10s",
        value_parser = parse_duration_arg
    )]
    pub run_timeout: Duration,

    /// Disable gzip/brotli/deflate response compression
    #[arg(
        long = "disable-compression",
        env = "HEY_APM_DISABLE_COMPRESSION",
        value_parser = parse_bool_env
    )]
    pub disable_compression: bool,

    /// Disable connection reuse between requests
    #[arg(
        long = "disable-keepalive",
        env = "HEY_APM_DISABLE_KEEPALIVE",
        value_parser = parse_bool_env
    )]
    pub disable_keepalive: bool,

    /// Do not follow HTTP redirects
    #[arg(
        long = "disable-redirects",
        env = "HEY_APM_DISABLE_REDIRECTS",
        value_parser = parse_bool_env
    )]
    pub disable_redirects: bool,

    /// Request timeout (seconds)
    #[arg(long = "timeout", env = "HEY_APM_TIMEOUT", default_value_t = 3)]
    pub request_timeout_secs: u64,

    /// Endpoint to load as 'METHOD PATH [@FILE]' relative to the base URL (repeatable, comma-separated in env, defaults to the base URL itself)
    #[arg(
        long = "target",
        env = "HEY_APM_TARGETS",
        value_delimiter = ',',
        value_parser = parse_target_spec
    )]
    pub targets: Vec<TargetSpec>,

    /// Request body for targets without their own '@FILE'
    #[arg(long, short = 'd', env = "HEY_APM_DATA", conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the request body for targets without their own '@FILE' from a file
    #[arg(long = "data-file", short = 'D', env = "HEY_APM_DATA_FILE")]
    pub data_file: Option<String>,

    /// Concurrent request loops per target
    #[arg(
        long = "concurrency",
        short = 'c',
        env = "HEY_APM_CONCURRENCY",
        default_value = "1",
        value_parser = parse_positive_usize
    )]
    pub concurrency: PositiveUsize,

    /// Stop each target's worker after N requests
    #[arg(
        long = "requests",
        short = 'n',
        env = "HEY_APM_REQUESTS",
        value_parser = parse_positive_u64
    )]
    pub requests: Option<PositiveU64>,

    /// Path to a TOML or JSON config file (defaults to ./hey-apm.toml or ./hey-apm.json)
    #[arg(long = "config", env = "HEY_APM_CONFIG")]
    pub config: Option<String>,

    /// Exit with a non-zero status when workers fail to stop within the grace period
    #[arg(
        long = "fail-on-abort",
        env = "HEY_APM_FAIL_ON_ABORT",
        value_parser = parse_bool_env
    )]
    pub fail_on_abort: bool,

    /// Enable debug logging
    #[arg(long, short, env = "HEY_APM_VERBOSE", value_parser = parse_bool_env)]
    pub verbose: bool,
}

impl RunArgs {
    /// Body for targets that do not carry their own.
    #[must_use]
    pub fn default_body(&self) -> Option<BodySource> {
        self.data_file
            .as_ref()
            .map(|path| BodySource::File(PathBuf::from(path)))
            .or_else(|| self.data.clone().map(BodySource::Inline))
    }
}
