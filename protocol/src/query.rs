//! Query-string handling for protocol params.
//!
//! Responses carry some metadata through a redirect by appending `_up_`
//! params to the redirect location. Those params are transport detail, so
//! they are stripped again before a URL is echoed back to the frontend.

use crate::field::PARAM_PREFIX;

/// Removes all `_up_`-prefixed params from a URL's query string.
///
/// Returns the URL unchanged when no query key carries the prefix. A prefix
/// match elsewhere, say in the path, does not count. When params are
/// stripped the result is reduced to the path plus the remaining query
/// pairs, kept verbatim in their original encoding.
///
/// Runs in linear time regardless of input shape.
pub fn url_without_protocol_params(url: &str) -> String {
    if !url.contains(PARAM_PREFIX) {
        return url.to_owned();
    }
    let Some((base, query)) = url.split_once('?') else {
        return url.to_owned();
    };

    let mut kept = Vec::new();
    let mut stripped = false;
    for pair in query.split('&') {
        let key = pair.split_once('=').map_or(pair, |(key, _)| key);
        if key.starts_with(PARAM_PREFIX) {
            stripped = true;
        } else {
            kept.push(pair);
        }
    }
    if !stripped {
        return url.to_owned();
    }

    let path = path_of(base);
    if kept.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{}", kept.join("&"))
    }
}

/// Reduces an absolute URL to its path, leaving relative URLs untouched.
fn path_of(base: &str) -> &str {
    let after_scheme = match base.find("://") {
        Some(index) => &base[index + 3..],
        None => return base,
    };
    match after_scheme.find('/') {
        Some(index) => &after_scheme[index..],
        None => "/",
    }
}

/// Appends params to a URL, starting or extending its query string.
pub fn append_params(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_owned();
    }
    let mut result = String::from(url);
    result.push(if url.contains('?') { '&' } else { '?' });
    for (index, (name, value)) in params.iter().enumerate() {
        if index > 0 {
            result.push('&');
        }
        result.push_str(&urlencoding::encode(name));
        result.push('=');
        result.push_str(&urlencoding::encode(value));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_protocol_params_from_the_query() {
        let url = "/some/path?_up_target=.foo";

        assert_eq!(url_without_protocol_params(url), "/some/path");
    }

    #[test]
    fn keeps_foreign_params_verbatim() {
        let url = "/some/path?_up_target=.foo&param1=1&foo%5B%5D=2";

        assert_eq!(url_without_protocol_params(url), "/some/path?param1=1&foo%5B%5D=2");
    }

    #[test]
    fn reduces_absolute_urls_to_their_path() {
        let url = "http://example.test/some/path?_up_context_changes=%7B%7D&param1=1";

        assert_eq!(url_without_protocol_params(url), "/some/path?param1=1");
    }

    #[test]
    fn returns_the_url_unchanged_when_only_the_path_matches_the_prefix() {
        let url = "http://example.test/_up_lifter?param1=1";

        assert_eq!(url_without_protocol_params(url), url);
    }

    #[test]
    fn returns_the_url_unchanged_without_protocol_params() {
        assert_eq!(url_without_protocol_params("/plain"), "/plain");
        assert_eq!(
            url_without_protocol_params("http://example.test/path?param1=1"),
            "http://example.test/path?param1=1"
        );
    }

    #[test]
    fn prefix_must_start_the_key() {
        let url = "/path?foo_up_bar=1";

        assert_eq!(url_without_protocol_params(url), url);
    }

    #[test]
    fn append_params_starts_a_query_string() {
        let params = vec![("_up_target".to_owned(), ".content".to_owned())];

        assert_eq!(append_params("/path", &params), "/path?_up_target=.content");
    }

    #[test]
    fn append_params_extends_an_existing_query_string() {
        let params = vec![("_up_events".to_owned(), "[{\"type\":\"a\"}]".to_owned())];

        assert_eq!(
            append_params("/path?param1=1", &params),
            "/path?param1=1&_up_events=%5B%7B%22type%22%3A%22a%22%7D%5D"
        );
    }

    #[test]
    fn append_params_with_nothing_to_append_is_identity() {
        assert_eq!(append_params("/path?x=1", &[]), "/path?x=1");
    }
}
