//! Resolved request destinations and the resolver seam that turns a base URL
//! into the workers of a run.
mod resolver;


use std::fmt;

use bytes::Bytes;
use url::Url;

use crate::args::HttpMethod;

pub use resolver::{BaseUrlResolver, TargetResolver, resolve_targets};

/// One endpoint a worker hammers: method, absolute URL and optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub method: HttpMethod,
    pub url: Url,
    pub body: Option<Bytes>,
}

impl Target {
    #[must_use]
    pub const fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(self, body: Option<Bytes>) -> Self {
        Self { body, ..self }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
