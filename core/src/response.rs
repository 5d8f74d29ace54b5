//! Response-side output of a finalized request cycle.

use unpoly_protocol::HeaderMap;

/// Name of the cookie that remembers the request method across a redirect.
pub const METHOD_COOKIE_NAME: &str = "_up_method";

/// What the host adapter should do with the method cookie.
///
/// When a non-GET request was not made by the frontend, its method is
/// stored in a cookie. If that request redirects and the frontend later
/// loads the target with a GET, the cookie tells it the location was
/// reached by a form submission rather than a regular page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCookie {
    /// Set the cookie to the given request method.
    Set(String),
    /// Delete the cookie if present.
    Delete,
}

/// Everything the host adapter must apply to its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseUpdate {
    /// Headers to set on the response, including any `Vary` entries
    /// accumulated while request headers were read.
    pub headers: HeaderMap,
    /// Response status override, currently only used to render nothing.
    pub status: Option<u16>,
    pub method_cookie: MethodCookie,
}

impl ResponseUpdate {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}
