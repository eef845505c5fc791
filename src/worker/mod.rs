//! The worker seam: one worker per target, stopped through a separate handle
//! and yielding its distributions only once `run` has returned.
mod http;
mod stats;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::target::Target;

pub use http::HttpWorker;
pub use stats::WorkerStats;

/// Requests graceful termination of a worker.
///
/// Calling `stop` more than once, or after the worker has finished, must be a
/// no-op.
#[async_trait]
pub trait StopHandle: Send + Sync {
    async fn stop(&self);
}

#[async_trait]
pub trait Worker: Send {
    fn target(&self) -> &Target;

    /// A handle that stays usable while `run` holds the worker.
    fn stop_handle(&self) -> Arc<dyn StopHandle>;

    /// Issues requests until stopped or exhausted, then hands back the
    /// accumulated distributions.
    async fn run(&mut self) -> WorkerStats;
}
