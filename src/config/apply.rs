use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, PositiveUsize, RunArgs, parse_target_spec};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Applies config file values to every argument not given on the command line.
///
/// Environment variables count as command-line input here, so the layering is
/// flags and env first, then the config file, then built-in defaults.
///
/// # Errors
///
/// Returns an error when a config value is invalid.
pub fn apply_config(args: &mut RunArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if config.data.is_some() && config.data_file.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "data",
            right: "data_file",
        }));
    }

    if !is_explicit(matches, "base_url")
        && let Some(base_url) = config.base_url.clone()
    {
        args.base_url = base_url;
    }

    if !is_explicit(matches, "run_timeout")
        && let Some(run) = config.run.as_ref()
    {
        args.run_timeout = run.to_duration().map_err(|err| {
            AppError::config(ConfigError::InvalidDuration {
                field: "run",
                source: err,
            })
        })?;
    }

    if !is_explicit(matches, "disable_compression")
        && let Some(value) = config.disable_compression
    {
        args.disable_compression = value;
    }

    if !is_explicit(matches, "disable_keepalive")
        && let Some(value) = config.disable_keepalive
    {
        args.disable_keepalive = value;
    }

    if !is_explicit(matches, "disable_redirects")
        && let Some(value) = config.disable_redirects
    {
        args.disable_redirects = value;
    }

    if !is_explicit(matches, "request_timeout_secs")
        && let Some(timeout) = config.timeout
    {
        args.request_timeout_secs = timeout;
    }

    if !is_explicit(matches, "targets")
        && let Some(targets) = config.targets.as_ref()
    {
        let mut parsed = Vec::with_capacity(targets.len());
        for target in targets {
            parsed.push(
                parse_target_spec(target)
                    .map_err(|err| AppError::config(ConfigError::InvalidTarget { source: err }))?,
            );
        }
        args.targets = parsed;
    }

    // A body given on the command line replaces the config body as a whole.
    if !is_explicit(matches, "data") && !is_explicit(matches, "data_file") {
        if let Some(data) = config.data.clone() {
            args.data = Some(data);
        }
        if let Some(path) = config.data_file.clone() {
            args.data_file = Some(path);
        }
    }

    if !is_explicit(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = PositiveUsize::try_from(concurrency).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "concurrency",
                source: err,
            })
        })?;
    }

    if !is_explicit(matches, "requests")
        && let Some(requests) = config.requests
    {
        args.requests = Some(PositiveU64::try_from(requests).map_err(|err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "requests",
                source: err,
            })
        })?);
    }

    if !is_explicit(matches, "fail_on_abort")
        && let Some(value) = config.fail_on_abort
    {
        args.fail_on_abort = value;
    }

    Ok(())
}

fn is_explicit(matches: &ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}
