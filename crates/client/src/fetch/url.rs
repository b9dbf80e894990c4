//! URL canonicalization for cache keys and manifest resolution.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an absolute URL string so equal requests share one cache key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    normalize(parsed)
}

/// Resolve a manifest or request path against the shell's origin.
///
/// Absolute URLs are canonicalized as-is; anything else (`/index.html`,
/// `assets/app.js`) is joined onto `origin`.
pub fn resolve(origin: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    if trimmed.contains("://") {
        return canonicalize(trimmed);
    }

    let joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(joined)
}

/// True when `url` has the same scheme, host and port as `origin`.
pub fn same_origin(origin: &url::Url, url: &url::Url) -> bool {
    origin.origin() == url.origin()
}

fn normalize(mut parsed: url::Url) -> Result<url::Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> url::Url {
        url::Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("cdn.jsdelivr.net/npm/bootstrap").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("cdn.jsdelivr.net"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://CDNJS.Cloudflare.COM/ajax").unwrap();
        assert_eq!(url.host_str(), Some("cdnjs.cloudflare.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://example.com/page?b=2&a=1#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("chrome-extension://abc/script.js");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_relative_against_origin() {
        let url = resolve(&origin(), "/assets/css/main.css").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/assets/css/main.css");

        let root = resolve(&origin(), "/").unwrap();
        assert_eq!(root.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_resolve_absolute_ignores_origin() {
        let url = resolve(&origin(), "https://cdn.jsdelivr.net/npm/x.css").unwrap();
        assert_eq!(url.host_str(), Some("cdn.jsdelivr.net"));
    }

    #[test]
    fn test_resolve_drops_fragment() {
        let url = resolve(&origin(), "/#quran").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_same_origin() {
        let o = origin();
        assert!(same_origin(&o, &url::Url::parse("http://localhost:8080/index.html").unwrap()));
        assert!(!same_origin(&o, &url::Url::parse("http://localhost:9090/").unwrap()));
        assert!(!same_origin(&o, &url::Url::parse("https://localhost:8080/").unwrap()));
    }
}
