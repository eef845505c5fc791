//! Plain-text per-target summary printed once a run is over.

use crate::coordinator::{RunOutcome, WorkerOutcome, WorkerStatus};
use crate::worker::WorkerStats;

/// Prints the report for `outcome` to stdout.
pub fn print_report(outcome: &RunOutcome) {
    print!(
        "{}",
        render_report(&outcome.workers, outcome.elapsed.as_secs_f64())
    );
}

/// Renders one block per worker, in the order given, separated by a blank
/// line.
///
/// A worker with no responses renders `NaN` for any ratio over its total.
#[must_use]
pub fn render_report(workers: &[WorkerOutcome], elapsed_secs: f64) -> String {
    let blocks: Vec<String> = workers
        .iter()
        .map(|worker| render_worker(worker, elapsed_secs))
        .collect();
    blocks.join("\n")
}

fn render_worker(worker: &WorkerOutcome, elapsed_secs: f64) -> String {
    let mut lines = vec![format!("{} {}", worker.target, worker.index)];
    match &worker.status {
        WorkerStatus::Completed(stats) => lines.extend(stats_lines(stats, elapsed_secs)),
        WorkerStatus::Outstanding => lines.push(
            "  results unavailable: worker did not stop within grace period".to_owned(),
        ),
        WorkerStatus::Failed => {
            lines.push("  results unavailable: worker task failed".to_owned());
        }
    }

    let mut block = lines.join("\n");
    block.push('\n');
    block
}

fn stats_lines(stats: &WorkerStats, elapsed_secs: f64) -> Vec<String> {
    let total = stats.total_responses();
    let mut lines = Vec::with_capacity(
        stats
            .status_codes
            .len()
            .saturating_add(stats.errors.len())
            .saturating_add(1),
    );

    for (code, count) in &stats.status_codes {
        lines.push(format!(
            "  [{}]\t{} responses ({:.2}%) ",
            code,
            count,
            percentage(*count, total)
        ));
    }
    lines.push(format!(
        "  total\t{} responses ({:.2} rps)",
        total,
        rate(total, elapsed_secs)
    ));
    for (description, count) in &stats.errors {
        lines.push(format!("  [{}]\t{}", count, description));
    }
    lines
}

#[expect(clippy::float_arithmetic, reason = "report ratios are floating point")]
fn percentage(count: u64, total: u64) -> f64 {
    100.0 * count as f64 / total as f64
}

#[expect(clippy::float_arithmetic, reason = "report ratios are floating point")]
fn rate(total: u64, elapsed_secs: f64) -> f64 {
    total as f64 / elapsed_secs
}
