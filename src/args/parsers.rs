use std::time::Duration;

use super::types::{BodySource, HttpMethod, PositiveU64, PositiveUsize, TargetSpec};
use crate::error::{AppError, AppResult, ValidationError};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60_000_000_000;
const NANOS_PER_HOUR: u128 = 3_600_000_000_000;
/// Fraction digits past this precision cannot change a nanosecond count.
const MAX_FRACTION_DIGITS: usize = 18;

pub(super) fn parse_positive_u64(s: &str) -> AppResult<PositiveU64> {
    s.parse::<PositiveU64>().map_err(AppError::from)
}

pub(super) fn parse_positive_usize(s: &str) -> AppResult<PositiveUsize> {
    s.parse::<PositiveUsize>().map_err(AppError::from)
}

pub(crate) fn parse_bool_env(s: &str) -> AppResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(AppError::validation(ValidationError::InvalidBoolean {
            value: s.to_owned(),
        })),
    }
}

pub(super) fn parse_duration_arg(s: &str) -> AppResult<Duration> {
    parse_duration_value(s).map_err(AppError::from)
}

/// Parses a duration such as `500ms`, `10s`, `1.5s`, `1m30s` or `2h`.
///
/// Segments may carry a decimal fraction (`0.5m`, `.25h`). A bare integer is
/// read as seconds. Zero is accepted.
///
/// # Errors
///
/// Returns an error for empty input, unknown units, missing units between
/// segments, malformed numbers, or values that overflow.
pub(crate) fn parse_duration_value(s: &str) -> Result<Duration, ValidationError> {
    let value = s.trim();
    if value.is_empty() {
        return Err(ValidationError::DurationEmpty);
    }

    if value.chars().all(|ch| ch.is_ascii_digit()) {
        let secs: u64 = value
            .parse()
            .map_err(|err| ValidationError::InvalidDurationNumber {
                value: value.to_owned(),
                source: err,
            })?;
        return Ok(Duration::from_secs(secs));
    }

    let mut total_nanos: u128 = 0;
    let mut rest = value;
    while !rest.is_empty() {
        let number_len = rest
            .find(|ch: char| !is_number_char(ch))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail.find(is_number_char).unwrap_or(tail.len());
        let (unit, remainder) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(ValidationError::InvalidDurationFormat {
                value: value.to_owned(),
            });
        }

        let segment = segment_nanos(value, number, unit)?;
        total_nanos = total_nanos
            .checked_add(segment)
            .ok_or(ValidationError::DurationOverflow)?;
        rest = remainder;
    }

    let nanos = u64::try_from(total_nanos).map_err(|_err| ValidationError::DurationOverflow)?;
    Ok(Duration::from_nanos(nanos))
}

const fn is_number_char(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '.'
}

/// Nanoseconds for one `<whole>[.<fraction>]<unit>` segment.
fn segment_nanos(value: &str, number: &str, unit: &str) -> Result<u128, ValidationError> {
    let invalid_format = || ValidationError::InvalidDurationFormat {
        value: value.to_owned(),
    };
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(invalid_format());
    }

    let per_unit = nanos_per_unit(unit)?;
    let parse_digits = |digits: &str| -> Result<u128, ValidationError> {
        if digits.is_empty() {
            return Ok(0);
        }
        digits
            .parse::<u64>()
            .map(u128::from)
            .map_err(|err| ValidationError::InvalidDurationNumber {
                value: value.to_owned(),
                source: err,
            })
    };

    let whole_nanos = parse_digits(whole)?
        .checked_mul(per_unit)
        .ok_or(ValidationError::DurationOverflow)?;

    let fraction = fraction.get(..MAX_FRACTION_DIGITS).unwrap_or(fraction);
    let scale = u32::try_from(fraction.len())
        .ok()
        .and_then(|digits| 10u128.checked_pow(digits))
        .ok_or(ValidationError::DurationOverflow)?;
    let fraction_nanos = parse_digits(fraction)?
        .checked_mul(per_unit)
        .and_then(|scaled| scaled.checked_div(scale))
        .ok_or(ValidationError::DurationOverflow)?;

    whole_nanos
        .checked_add(fraction_nanos)
        .ok_or(ValidationError::DurationOverflow)
}

fn nanos_per_unit(unit: &str) -> Result<u128, ValidationError> {
    match unit {
        "ns" => Ok(1),
        "us" | "µs" => Ok(NANOS_PER_MICRO),
        "ms" => Ok(NANOS_PER_MILLI),
        "s" => Ok(NANOS_PER_SECOND),
        "m" => Ok(NANOS_PER_MINUTE),
        "h" => Ok(NANOS_PER_HOUR),
        _ => Err(ValidationError::InvalidDurationUnit {
            unit: unit.to_owned(),
        }),
    }
}

/// Parses `METHOD PATH`, `METHOD PATH @FILE` or a bare `PATH` (which implies
/// GET). `@FILE` names a file whose contents become the request body.
///
/// # Errors
///
/// Returns an error when the target is empty, has too many parts, names an
/// unknown method, or has a body part that is not `@FILE`.
pub(crate) fn parse_target_spec(s: &str) -> Result<TargetSpec, ValidationError> {
    let invalid = || ValidationError::InvalidTargetFormat {
        value: s.to_owned(),
    };
    let mut parts = s.split_whitespace();
    let (first, second, third, extra) = (parts.next(), parts.next(), parts.next(), parts.next());
    match (first, second, third, extra) {
        (Some(path), None, None, None) => Ok(TargetSpec {
            method: HttpMethod::Get,
            path: path.to_owned(),
            body: None,
        }),
        (Some(method), Some(path), body, None) => {
            let body = body
                .map(|body| {
                    body.strip_prefix('@')
                        .filter(|file| !file.is_empty())
                        .map(|file| BodySource::File(file.into()))
                        .ok_or_else(invalid)
                })
                .transpose()?;
            let method = method
                .parse::<HttpMethod>()
                .map_err(|_err| ValidationError::InvalidTargetMethod {
                    value: s.to_owned(),
                    method: method.to_owned(),
                })?;
            Ok(TargetSpec {
                method,
                path: path.to_owned(),
                body,
            })
        }
        _ => Err(invalid()),
    }
}
