use std::time::Duration;

use serde::Deserialize;

use crate::args::parse_duration_value;
use crate::error::ValidationError;

/// Settings accepted from `hey-apm.toml` / `hey-apm.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub run: Option<DurationValue>,
    pub disable_compression: Option<bool>,
    pub disable_keepalive: Option<bool>,
    pub disable_redirects: Option<bool>,
    pub timeout: Option<u64>,
    pub targets: Option<Vec<String>>,
    pub data: Option<String>,
    pub data_file: Option<String>,
    pub concurrency: Option<usize>,
    pub requests: Option<u64>,
    pub fail_on_abort: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration_value(text),
        }
    }
}
