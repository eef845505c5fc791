//! Batch lifecycle: start every worker, race completion against the run
//! deadline and the interrupt channel, then broadcast stop and wait out the
//! grace period.
//!
//! ```text
//! Running --all returned------------------------------> Done
//! Running --timeout | interrupt--> Stopping --all returned--> Done
//!                                  Stopping --grace elapsed--> Aborted
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::shutdown::ShutdownReceiver;
use crate::target::Target;
use crate::worker::{StopHandle, Worker, WorkerStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// What moved the run from `Running` to `Stopping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    Timeout,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Completed(WorkerStats),
    /// The worker task panicked or was cancelled.
    Failed,
    /// Still running when the grace period ran out.
    Outstanding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub index: usize,
    pub target: Target,
    pub status: WorkerStatus,
}

impl WorkerOutcome {
    #[must_use]
    pub const fn stats(&self) -> Option<&WorkerStats> {
        match &self.status {
            WorkerStatus::Completed(stats) => Some(stats),
            WorkerStatus::Failed | WorkerStatus::Outstanding => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub workers: Vec<WorkerOutcome>,
    pub elapsed: Duration,
    pub state: RunState,
    pub trigger: Option<StopTrigger>,
}

impl RunOutcome {
    /// Workers that had not returned when the coordinator gave up waiting.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.status == WorkerStatus::Outstanding)
            .count()
    }
}

/// Runs one batch of workers under a global deadline.
#[derive(Debug, Clone, Copy)]
pub struct RunCoordinator {
    run_timeout: Duration,
    stop_grace: Duration,
}

type Finished = (usize, Result<WorkerStats, JoinError>);

impl RunCoordinator {
    #[must_use]
    pub const fn new(run_timeout: Duration, stop_grace: Duration) -> Self {
        Self {
            run_timeout,
            stop_grace,
        }
    }

    #[must_use]
    pub const fn from_config(config: &RunConfig) -> Self {
        Self::new(config.run_timeout, config.stop_grace)
    }

    /// Executes the batch and always returns an outcome; failures only show
    /// up in the log and in the per-worker status.
    pub async fn execute(
        &self,
        workers: Vec<Box<dyn Worker>>,
        mut interrupt: ShutdownReceiver,
    ) -> RunOutcome {
        let start = Instant::now();
        let run_deadline = start.checked_add(self.run_timeout);

        let mut outcomes = Vec::with_capacity(workers.len());
        let mut stop_handles = Vec::with_capacity(workers.len());
        let mut pending = FuturesUnordered::new();

        for (index, mut worker) in workers.into_iter().enumerate() {
            let target = worker.target().clone();
            info!("Starting worker for {}", target);
            stop_handles.push(worker.stop_handle());
            let handle = tokio::spawn(async move { worker.run().await });
            pending.push(async move { (index, handle.await) });
            outcomes.push(WorkerOutcome {
                index,
                target,
                status: WorkerStatus::Outstanding,
            });
        }

        let mut interrupt_open = true;
        let trigger = loop {
            tokio::select! {
                finished = pending.next() => match finished {
                    Some(finished) => record_finished(&mut outcomes, finished),
                    None => {
                        info!("No more requests to make");
                        return finish(outcomes, start, RunState::Done, None);
                    }
                },
                () = wait_until(run_deadline) => {
                    info!("No more time left to make requests");
                    break StopTrigger::Timeout;
                }
                received = interrupt.recv(), if interrupt_open => match received {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        error!("Caught interrupt, stopping work");
                        break StopTrigger::Interrupt;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Interrupt channel closed; relying on the run deadline");
                        interrupt_open = false;
                    }
                },
            }
        };

        // Interrupts arriving from here on are ignored: the channel is no
        // longer polled.
        drop(interrupt);
        debug!("Run state {} -> {}", RunState::Running, RunState::Stopping);
        let grace_deadline = Instant::now().checked_add(self.stop_grace);
        let mut stops = Box::pin(join_all(dispatch_stop(&outcomes, &stop_handles)));
        let mut stops_joined = false;

        loop {
            tokio::select! {
                deliveries = &mut stops, if !stops_joined => {
                    stops_joined = true;
                    for delivery in deliveries {
                        if let Err(err) = delivery {
                            error!("Stop delivery failed: {}", err);
                        }
                    }
                    debug!("Stop delivered to all workers");
                }
                finished = pending.next() => match finished {
                    Some(finished) => record_finished(&mut outcomes, finished),
                    None => {
                        info!("Stopped cleanly after {}", describe_trigger(trigger));
                        return finish(outcomes, start, RunState::Done, Some(trigger));
                    }
                },
                () = wait_until(grace_deadline) => {
                    let outcome = finish(outcomes, start, RunState::Aborted, Some(trigger));
                    error!(
                        "Failed to stop cleanly after {}, aborting with {} worker(s) still running",
                        describe_trigger(trigger),
                        outcome.outstanding()
                    );
                    for worker in &outcome.workers {
                        if worker.status == WorkerStatus::Outstanding {
                            warn!("Worker for {} did not stop within the grace period", worker.target);
                        }
                    }
                    return outcome;
                }
            }
        }
    }
}

/// Sends stop to every worker, finished or not, each on its own task.
fn dispatch_stop(
    outcomes: &[WorkerOutcome],
    stop_handles: &[Arc<dyn StopHandle>],
) -> Vec<JoinHandle<()>> {
    outcomes
        .iter()
        .zip(stop_handles)
        .map(|(worker, stop)| {
            info!("Stopping worker for {}", worker.target);
            let stop = Arc::clone(stop);
            tokio::spawn(async move { stop.stop().await })
        })
        .collect()
}

fn record_finished(outcomes: &mut [WorkerOutcome], (index, result): Finished) {
    let Some(worker) = outcomes.get_mut(index) else {
        return;
    };
    match result {
        Ok(stats) => {
            info!("Worker done for {}", worker.target);
            worker.status = WorkerStatus::Completed(stats);
        }
        Err(err) => {
            error!("Worker for {} failed: {}", worker.target, err);
            worker.status = WorkerStatus::Failed;
        }
    }
}

fn finish(
    workers: Vec<WorkerOutcome>,
    start: Instant,
    state: RunState,
    trigger: Option<StopTrigger>,
) -> RunOutcome {
    RunOutcome {
        workers,
        elapsed: start.elapsed(),
        state,
        trigger,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

const fn describe_trigger(trigger: StopTrigger) -> &'static str {
    match trigger {
        StopTrigger::Timeout => "time expired",
        StopTrigger::Interrupt => "interrupt",
    }
}
