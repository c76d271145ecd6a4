//! Redirect handling for the upstream platform.
//!
//! The upstream server has a known bug: some `Location` headers use
//! backslashes instead of forward slashes (e.g.
//! `https://new.mymoment.ch:443\accounts\login/`). Every redirect hop must
//! be sanitized before being followed.

use reqwest::Method;

/// Replace backslashes with forward slashes in a URL.
///
/// A no-op for well-formed URLs.
pub fn sanitize_url(url: &str) -> String {
    url.replace('\\', "/")
}

/// Whether `url` contains the backslash malformation.
pub fn is_url_malformed(url: &str) -> bool {
    url.contains('\\')
}

/// Resolve a (possibly relative, possibly malformed) `Location` header
/// against the URL it was returned for.
pub fn resolve_location(
    current_url: &reqwest::Url,
    location: &str,
) -> Result<reqwest::Url, url::ParseError> {
    let sanitized = sanitize_url(location);
    current_url.join(&sanitized)
}

/// Whether a redirect status code should drop the method to GET (everything
/// except 307/308, which must preserve the original method and body).
pub fn drops_method_to_get(status: u16) -> bool {
    matches!(status, 301 | 302 | 303)
}

/// Whether a status code is one of the redirect codes this client follows.
pub fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Given the current method and a redirect status, the method to use for
/// the next hop.
pub fn next_method(current: &Method, status: u16) -> Method {
    if drops_method_to_get(status) {
        Method::GET
    } else {
        current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_url_replaces_backslashes() {
        assert_eq!(
            sanitize_url("https://new.mymoment.ch:443\\accounts\\login/"),
            "https://new.mymoment.ch:443/accounts/login/"
        );
    }

    #[test]
    fn sanitize_url_is_noop_for_well_formed_urls() {
        let url = "https://new.mymoment.ch/articles/?tab=alle";
        assert_eq!(sanitize_url(url), url);
    }

    #[test]
    fn is_url_malformed_detects_backslash() {
        assert!(is_url_malformed("https://host\\path"));
        assert!(!is_url_malformed("https://host/path"));
    }

    #[test]
    fn resolve_location_handles_relative_path() {
        let current = reqwest::Url::parse("https://new.mymoment.ch/accounts/login/").unwrap();
        let resolved = resolve_location(&current, "/articles/").unwrap();
        assert_eq!(resolved.as_str(), "https://new.mymoment.ch/articles/");
    }

    #[test]
    fn resolve_location_sanitizes_backslashes_before_joining() {
        let current = reqwest::Url::parse("https://new.mymoment.ch/accounts/login/").unwrap();
        let resolved = resolve_location(&current, "\\articles\\").unwrap();
        assert_eq!(resolved.as_str(), "https://new.mymoment.ch/articles/");
    }

    #[test]
    fn next_method_drops_to_get_on_302() {
        assert_eq!(next_method(&Method::POST, 302), Method::GET);
    }

    #[test]
    fn next_method_preserves_method_on_307_and_308() {
        assert_eq!(next_method(&Method::POST, 307), Method::POST);
        assert_eq!(next_method(&Method::POST, 308), Method::POST);
    }

    #[test]
    fn is_redirect_status_recognizes_all_five_codes() {
        for code in [301, 302, 303, 307, 308] {
            assert!(is_redirect_status(code));
        }
        assert!(!is_redirect_status(200));
        assert!(!is_redirect_status(404));
    }
}
