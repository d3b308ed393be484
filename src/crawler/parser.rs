//! HTML parser for extracting board links and image links
//!
//! This module parses stored board pages to extract:
//! - Links to follow (anchors matching the link selector)
//! - Links to attached images (anchors matching the image selector)
//!
//! `scraper::Html` is not `Send`, so parsing always happens in one synchronous
//! call and only owned URLs leave this module.

use crate::config::CrawlerConfig;
use crate::url::{is_candidate_href, is_followable_link, resolve_href};
use crate::ScoutError;
use scraper::{Html, Selector};
use url::Url;

/// Links extracted from one page, resolved against the page's href
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Page links to crawl next
    pub links: Vec<Url>,

    /// Image links to download
    pub images: Vec<Url>,
}

/// Compiled link and image selectors
#[derive(Debug, Clone)]
pub struct PageSelectors {
    link: Selector,
    image: Selector,
}

fn compile(selector: &str) -> Result<Selector, ScoutError> {
    Selector::parse(selector).map_err(|e| ScoutError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl PageSelectors {
    pub fn new(link: &str, image: &str) -> Result<Self, ScoutError> {
        Ok(Self {
            link: compile(link)?,
            image: compile(image)?,
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, ScoutError> {
        Self::new(&config.link_selector, &config.image_selector)
    }
}

/// Parses a page and extracts crawlable links and image links
///
/// # Link Extraction Rules
///
/// **Dropped for both kinds:**
/// - empty hrefs
/// - hrefs containing `javascript`, `#`, `<`, `>` or whitespace
/// - hrefs that do not resolve to an http(s) URL with a host
///
/// **Dropped for page links only:**
/// - hrefs without a `/`
///
/// # Example
///
/// ```
/// use pepe_scout::crawler::{parse_page, PageSelectors};
/// use url::Url;
///
/// let selectors = PageSelectors::new("a", "div.fileText a").unwrap();
/// let html = r#"<a href="/g/thread/1">t</a><div class="fileText"><a href="//i.example.org/g/1.png">f</a></div>"#;
/// let base = Url::parse("https://boards.example.org/g/").unwrap();
/// let parsed = parse_page(html, &base, &selectors);
/// assert_eq!(parsed.images[0].as_str(), "https://i.example.org/g/1.png");
/// ```
pub fn parse_page(html: &str, base_url: &Url, selectors: &PageSelectors) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        links: extract_hrefs(&document, &selectors.link, base_url, is_followable_link),
        images: extract_hrefs(&document, &selectors.image, base_url, is_candidate_href),
    }
}

fn extract_hrefs(
    document: &Html,
    selector: &Selector,
    base_url: &Url,
    keep: fn(&str) -> bool,
) -> Vec<Url> {
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| keep(href))
        .filter_map(|href| resolve_href(href, base_url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD_PAGE: &str = r##"
        <html>
        <body>
            <a href="/g/thread/100">Thread</a>
            <a href="//boards.example.org/g/2">Page 2</a>
            <a href="javascript:void(0)">Script</a>
            <a href="#top">Top</a>
            <a href="catalog">Catalog</a>
            <a href="/g/thread/1 00">Bad</a>
            <a>No href</a>
            <div class="thread">
                <div class="file">
                    <div class="fileInfo">
                        <div class="fileText">
                            File: <a href="//i.example.org/g/1.png">1.png</a>
                        </div>
                    </div>
                </div>
                <div class="file">
                    <div class="fileInfo">
                        <div class="fileText">
                            File: <a href="https://i.example.org/g/2.webm">2.webm</a>
                        </div>
                    </div>
                </div>
            </div>
        </body>
        </html>
    "##;

    fn selectors() -> PageSelectors {
        PageSelectors::new("a", "div .file div .fileText a").unwrap()
    }

    fn base_url() -> Url {
        Url::parse("https://boards.example.org/g/").unwrap()
    }

    fn strings(urls: &[Url]) -> Vec<&str> {
        urls.iter().map(|u| u.as_str()).collect()
    }

    #[test]
    fn test_page_links() {
        let parsed = parse_page(BOARD_PAGE, &base_url(), &selectors());
        let links = strings(&parsed.links);

        assert!(links.contains(&"https://boards.example.org/g/thread/100"));
        assert!(links.contains(&"https://boards.example.org/g/2"));
        // Image anchors match "a" as well
        assert!(links.contains(&"https://i.example.org/g/1.png"));
    }

    #[test]
    fn test_skips_unfollowable_links() {
        let parsed = parse_page(BOARD_PAGE, &base_url(), &selectors());
        let links = strings(&parsed.links);

        assert!(!links.iter().any(|l| l.contains("javascript")));
        assert!(!links.iter().any(|l| l.contains("top")));
        assert!(!links.iter().any(|l| l.contains("catalog")));
        assert!(!links.iter().any(|l| l.contains("1%2000")));
        assert_eq!(links.len(), 4);
    }

    #[test]
    fn test_image_links() {
        let parsed = parse_page(BOARD_PAGE, &base_url(), &selectors());

        assert_eq!(
            strings(&parsed.images),
            vec![
                "https://i.example.org/g/1.png",
                "https://i.example.org/g/2.webm"
            ]
        );
    }

    #[test]
    fn test_image_links_skip_slash_rule() {
        let html = r#"<div class="file"><div class="fileText"><a href="3.png">3</a></div></div>"#;
        let selectors = PageSelectors::new("a", "div.file div.fileText a").unwrap();
        let parsed = parse_page(html, &base_url(), &selectors);

        assert_eq!(strings(&parsed.images), vec!["https://boards.example.org/g/3.png"]);
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_relative_resolution() {
        let html = r#"<a href="/y">y</a>"#;
        let base = Url::parse("https://a.b/c/").unwrap();
        let parsed = parse_page(html, &base, &selectors());

        assert_eq!(strings(&parsed.links), vec!["https://a.b/y"]);
    }

    #[test]
    fn test_empty_document() {
        let parsed = parse_page("", &base_url(), &selectors());
        assert!(parsed.links.is_empty());
        assert!(parsed.images.is_empty());
    }

    #[test]
    fn test_invalid_selector() {
        let result = PageSelectors::new("a[", "a");
        assert!(matches!(result, Err(ScoutError::Selector { .. })));
    }
}
