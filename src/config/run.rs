use std::time::Duration;

use crate::args::{PositiveUsize, RunArgs};

/// How long workers get to honor a stop request before the run is aborted.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Immutable settings for one run, fixed before any worker starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// `None` when `--timeout 0` asks for no per-request timeout.
    pub request_timeout: Option<Duration>,
    pub disable_compression: bool,
    pub disable_keepalive: bool,
    pub disable_redirects: bool,
    pub run_timeout: Duration,
    pub stop_grace: Duration,
    /// Request loops per worker.
    pub concurrency: PositiveUsize,
    /// Requests per worker before it completes on its own.
    pub request_limit: Option<u64>,
}

impl RunConfig {
    #[must_use]
    pub fn from_args(args: &RunArgs) -> Self {
        Self {
            request_timeout: (args.request_timeout_secs > 0)
                .then_some(Duration::from_secs(args.request_timeout_secs)),
            disable_compression: args.disable_compression,
            disable_keepalive: args.disable_keepalive,
            disable_redirects: args.disable_redirects,
            run_timeout: args.run_timeout,
            stop_grace: STOP_GRACE_PERIOD,
            concurrency: args.concurrency,
            request_limit: args.requests.map(|requests| requests.get()),
        }
    }
}
