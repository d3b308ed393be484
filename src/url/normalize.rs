use crate::UrlError;
use std::borrow::Cow;
use url::Url;

/// Rewrites protocol-relative hrefs (`//host/path`) to https
///
/// Image boards emit attachment and cross-board links without a scheme; every
/// other shape is returned untouched.
pub fn fix_missing_scheme(href: &str) -> Cow<'_, str> {
    match href.strip_prefix("//") {
        Some(rest) => Cow::Owned(format!("https://{}", rest)),
        None => Cow::Borrowed(href),
    }
}

/// Normalizes an absolute href into a crawl target
///
/// # Normalization Steps
///
/// 1. Rewrite `//host/path` to `https://host/path`
/// 2. Parse the URL; reject if malformed
/// 3. Require an http(s) scheme and a host
/// 4. Drop the fragment
///
/// # Examples
///
/// ```
/// use pepe_scout::url::normalize_href;
///
/// let url = normalize_href("//boards.4channel.org/g/#top").unwrap();
/// assert_eq!(url.as_str(), "https://boards.4channel.org/g/");
/// ```
pub fn normalize_href(href: &str) -> Result<Url, UrlError> {
    let fixed = fix_missing_scheme(href.trim());
    let url = Url::parse(&fixed).map_err(|e| UrlError::Parse(e.to_string()))?;
    finish(url)
}

/// Resolves an href found on `base` into a crawl target
///
/// Protocol-relative hrefs take https, root-relative hrefs keep the base's
/// scheme and host, and plain relative hrefs are joined onto the base path.
/// Returns `None` when the result is not an http(s) URL with a host.
///
/// # Examples
///
/// ```
/// use pepe_scout::url::resolve_href;
/// use url::Url;
///
/// let base = Url::parse("https://a.b/c/").unwrap();
/// assert_eq!(resolve_href("/y", &base).unwrap().as_str(), "https://a.b/y");
/// assert_eq!(
///     resolve_href("//example.com/x", &base).unwrap().as_str(),
///     "https://example.com/x"
/// );
/// ```
pub fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let fixed = fix_missing_scheme(href.trim());
    let joined = base.join(&fixed).ok()?;
    finish(joined).ok()
}

fn finish(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}
