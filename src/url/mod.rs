//! URL handling module for Pepe-Scout
//!
//! This module resolves hrefs found on board pages into crawl targets and
//! decides which targets the page pipeline is allowed to fetch.

mod filter;
mod normalize;

use crate::config::CrawlerConfig;
use url::Url;

// Re-export main functions
pub use filter::{
    board_of, contains_all, contains_any, image_extension, is_candidate_href, is_followable_link,
};
pub use normalize::{fix_missing_scheme, normalize_href, resolve_href};

/// Why a page target was or was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterVerdict {
    /// Host and URL pass both filters
    Allowed,
    /// Host contains none of the allowed substrings
    HostNotAllowed,
    /// URL lacks at least one required substring
    MissingRequired,
}

impl FilterVerdict {
    /// Returns true if the target may be fetched
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Allow-list on the host plus require-all on the full URL
#[derive(Debug, Clone)]
pub struct PageFilter {
    allowed_host_substrings: Vec<String>,
    required_url_substrings: Vec<String>,
}

impl PageFilter {
    pub fn new(allowed_host_substrings: Vec<String>, required_url_substrings: Vec<String>) -> Self {
        Self {
            allowed_host_substrings,
            required_url_substrings,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.allowed_host_substrings.clone(),
            config.required_url_substrings.clone(),
        )
    }

    /// Classifies a normalized target
    ///
    /// The host check runs first, so a foreign host is reported as such even
    /// when it also misses a required substring.
    ///
    /// # Examples
    ///
    /// ```
    /// use pepe_scout::url::{FilterVerdict, PageFilter};
    /// use url::Url;
    ///
    /// let filter = PageFilter::new(vec!["4channel.org".into()], vec!["https".into()]);
    /// let url = Url::parse("https://boards.4channel.org/g/").unwrap();
    /// assert_eq!(filter.check(&url), FilterVerdict::Allowed);
    /// ```
    pub fn check(&self, url: &Url) -> FilterVerdict {
        let host = url.host_str().unwrap_or_default();

        if !contains_any(host, &self.allowed_host_substrings) {
            return FilterVerdict::HostNotAllowed;
        }

        if !contains_all(url.as_str(), &self.required_url_substrings) {
            return FilterVerdict::MissingRequired;
        }

        FilterVerdict::Allowed
    }
}
