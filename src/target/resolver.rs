use bytes::Bytes;
use url::Url;

use crate::args::{BodySource, HttpMethod, TargetSpec};
use crate::config::RunConfig;
use crate::error::{AppError, AppResult, HttpError};
use crate::worker::{HttpWorker, Worker};

use super::Target;

/// Produces the ordered workers for a run.
pub trait TargetResolver {
    /// Builds one worker per resolved target, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL or a target cannot be resolved, or
    /// a worker cannot be constructed.
    fn resolve(&self, base_url: &str, config: &RunConfig) -> AppResult<Vec<Box<dyn Worker>>>;
}

/// Resolves configured `METHOD PATH` specs against the base URL and backs
/// each with an [`HttpWorker`].
#[derive(Debug, Clone, Default)]
pub struct BaseUrlResolver {
    specs: Vec<TargetSpec>,
    default_body: Option<BodySource>,
}

impl BaseUrlResolver {
    #[must_use]
    pub const fn new(specs: Vec<TargetSpec>, default_body: Option<BodySource>) -> Self {
        Self {
            specs,
            default_body,
        }
    }
}

impl TargetResolver for BaseUrlResolver {
    fn resolve(&self, base_url: &str, config: &RunConfig) -> AppResult<Vec<Box<dyn Worker>>> {
        let targets = resolve_targets(base_url, &self.specs, self.default_body.as_ref())?;
        let mut workers: Vec<Box<dyn Worker>> = Vec::with_capacity(targets.len());
        for target in targets {
            workers.push(Box::new(HttpWorker::new(target, config)?));
        }
        Ok(workers)
    }
}

/// Joins each spec's path onto `base_url`; no specs means a single GET of the
/// base URL itself. Specs without a body of their own get `default_body`.
///
/// # Errors
///
/// Returns an error when the base URL is not an absolute http(s) URL, a
/// path cannot be joined, or a body file cannot be read.
pub fn resolve_targets(
    base_url: &str,
    specs: &[TargetSpec],
    default_body: Option<&BodySource>,
) -> AppResult<Vec<Target>> {
    let base = Url::parse(base_url).map_err(|err| {
        AppError::http(HttpError::InvalidBaseUrl {
            url: base_url.to_owned(),
            source: err,
        })
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(AppError::http(HttpError::UnsupportedScheme {
            scheme: base.scheme().to_owned(),
        }));
    }

    let default_body = default_body.map(load_body).transpose()?;

    if specs.is_empty() {
        return Ok(vec![Target::new(HttpMethod::Get, base).with_body(default_body)]);
    }

    specs
        .iter()
        .map(|spec| {
            let url = base.join(&spec.path).map_err(|err| {
                AppError::http(HttpError::JoinUrlFailed {
                    url: base_url.to_owned(),
                    path: spec.path.clone(),
                    source: err,
                })
            })?;
            let body = match spec.body.as_ref() {
                Some(source) => Some(load_body(source)?),
                None => default_body.clone(),
            };
            Ok(Target::new(spec.method, url).with_body(body))
        })
        .collect()
}

fn load_body(source: &BodySource) -> AppResult<Bytes> {
    match source {
        BodySource::Inline(text) => Ok(Bytes::from(text.clone())),
        BodySource::File(path) => std::fs::read(path).map(Bytes::from).map_err(|err| {
            AppError::http(HttpError::ReadBodyFile {
                path: path.clone(),
                source: err,
            })
        }),
    }
}
