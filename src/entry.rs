use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::{info, warn};

use crate::args::RunArgs;
use crate::config::{RunConfig, apply_config, load_config};
use crate::coordinator::{RunCoordinator, RunOutcome, RunState};
use crate::error::{AppError, AppResult};
use crate::report::print_report;
use crate::shutdown_handlers::{setup_signal_shutdown_handler, shutdown_channel};
use crate::target::{BaseUrlResolver, TargetResolver};

pub(crate) fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args()?;

    crate::logger::init_logging(args.verbose);

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }
    let config = RunConfig::from_args(&args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run_async(&args, &config));
    // Workers that ignored stop are left behind rather than joined.
    runtime.shutdown_background();
    let outcome = result?;

    print_report(&outcome);

    if args.fail_on_abort && outcome.state == RunState::Aborted {
        return Err(AppError::Aborted {
            outstanding: outcome.outstanding(),
        });
    }
    Ok(())
}

fn parse_args() -> AppResult<(RunArgs, ArgMatches)> {
    let matches = RunArgs::command().get_matches();
    let args = RunArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

async fn run_async(args: &RunArgs, config: &RunConfig) -> AppResult<RunOutcome> {
    let resolver = BaseUrlResolver::new(args.targets.clone(), args.default_body());
    let workers = resolver.resolve(&args.base_url, config)?;
    if workers.is_empty() {
        warn!("No targets resolved from {}", args.base_url);
    }

    info!(
        "Running {} worker(s) against {} for up to {:?}",
        workers.len(),
        args.base_url,
        config.run_timeout
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let outcome = RunCoordinator::from_config(config)
        .execute(workers, shutdown_rx)
        .await;

    signal_handle.abort();
    Ok(outcome)
}
