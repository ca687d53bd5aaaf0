use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates a URL string for use as the feed endpoint.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if the URL cannot be parsed or its
/// scheme is not `http`/`https`.
///
/// # Examples
///
/// ```
/// use announcer::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Returns `true` if `href` names the same resource as `placeholder`.
///
/// Both sides are compared in their parsed, normalised form so that
/// `http://Example.com` and `http://example.com/` match. Unparseable input
/// falls back to a plain string comparison.
pub fn same_url(href: &str, placeholder: &str) -> bool {
    match (Url::parse(href.trim()), Url::parse(placeholder.trim())) {
        (Ok(a), Ok(b)) => a == b,
        _ => href.trim() == placeholder.trim(),
    }
}
