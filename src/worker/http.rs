use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::{Client, redirect};
use tokio::sync::watch;
use tracing::debug;

use crate::config::RunConfig;
use crate::error::HttpError;
use crate::target::Target;

use super::{StopHandle, Worker, WorkerStats};

/// Repeatedly sends one request template over its own client until stopped
/// or until its request budget is spent.
pub struct HttpWorker {
    target: Target,
    client: Client,
    concurrency: usize,
    request_limit: Option<u64>,
    stop: Arc<WatchStop>,
}

struct WatchStop {
    stop_tx: watch::Sender<bool>,
}

#[async_trait]
impl StopHandle for WatchStop {
    async fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

impl HttpWorker {
    /// Builds a worker with a dedicated HTTP client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(target: Target, config: &RunConfig) -> Result<Self, HttpError> {
        let client = build_client(config)?;
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            target,
            client,
            concurrency: config.concurrency.get(),
            request_limit: config.request_limit,
            stop: Arc::new(WatchStop { stop_tx }),
        })
    }
}

#[async_trait]
impl Worker for HttpWorker {
    fn target(&self) -> &Target {
        &self.target
    }

    fn stop_handle(&self) -> Arc<dyn StopHandle> {
        self.stop.clone()
    }

    async fn run(&mut self) -> WorkerStats {
        let budget = self.request_limit.map(AtomicU64::new);
        let loops = (0..self.concurrency).map(|_| {
            request_loop(
                &self.client,
                &self.target,
                self.stop.stop_tx.subscribe(),
                budget.as_ref(),
            )
        });

        let mut stats = WorkerStats::default();
        for loop_stats in join_all(loops).await {
            stats.merge(loop_stats);
        }
        stats
    }
}

pub(crate) fn build_client(config: &RunConfig) -> Result<Client, HttpError> {
    let mut client_builder = Client::builder();

    if let Some(timeout) = config.request_timeout {
        client_builder = client_builder.timeout(timeout);
    }

    if config.disable_keepalive {
        client_builder = client_builder
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Some(std::time::Duration::from_secs(0)));
    }

    if config.disable_compression {
        client_builder = client_builder.no_gzip().no_brotli().no_deflate();
    }

    if config.disable_redirects {
        client_builder = client_builder.redirect(redirect::Policy::none());
    }

    client_builder
        .build()
        .map_err(|err| HttpError::BuildClientFailed { source: err })
}

async fn request_loop(
    client: &Client,
    target: &Target,
    mut stop_rx: watch::Receiver<bool>,
    budget: Option<&AtomicU64>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let stop_requested = *stop_rx.borrow_and_update();
        if stop_requested {
            break;
        }
        if let Some(budget) = budget
            && !take_request(budget)
        {
            break;
        }

        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            result = send_request(client, target) => match result {
                Ok(code) => stats.record_status(code),
                Err(err) => stats.record_error(describe_error(err)),
            },
        }
    }
    stats
}

/// Claims one request from the shared budget; false once it is spent.
fn take_request(budget: &AtomicU64) -> bool {
    budget
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
            remaining.checked_sub(1)
        })
        .is_ok()
}

async fn send_request(client: &Client, target: &Target) -> Result<u16, reqwest::Error> {
    let mut request = client.request(target.method.to_reqwest(), target.url.clone());
    if let Some(body) = target.body.clone() {
        request = request.body(body);
    }
    let response = request.send().await?;
    let code = response.status().as_u16();
    if let Err(err) = response.bytes().await {
        debug!("Discarding unreadable body from {}: {}", target, err);
    }
    Ok(code)
}

fn describe_error(err: reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_redirect() {
        "redirect"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else {
        "request"
    };

    let err = err.without_url();
    let mut description = format!("{}: {}", kind, err);
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        description = format!("{}: {}", description, cause);
        source = cause.source();
    }
    description
}
