//! Framework-independent request input.

use unpoly_protocol::HeaderMap;
use unpoly_protocol::ParamMap;

/// Snapshot of one inbound HTTP request.
///
/// Host adapters build this from their framework's native request type.
/// `params` should contain the merged query and body params the way the
/// framework exposes them, and `url` the original URL including the query
/// string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub params: ParamMap,
    /// Content-Security-Policy nonce of the current response, if the host
    /// framework generates one.
    pub csp_nonce: Option<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HeaderMap::new(),
            params: ParamMap::new(),
            csp_nonce: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.set(name, value);
        self
    }

    pub fn with_csp_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.csp_nonce = Some(nonce.into());
        self
    }
}

/// Behavior toggles for a [`Change`](crate::Change).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Suppresses the warnings logged by deprecated API entry points.
    pub silence_deprecations: bool,
}
