use url::Url;

/// Substrings that disqualify an href before resolution
///
/// Covers script pseudo-links, in-page anchors, hrefs with whitespace and
/// markup that leaked into attribute values.
const UNALLOWED_HREF_FRAGMENTS: &[&str] = &["javascript", "#", "<", ">"];

/// True when `value` contains at least one of `filters`
pub fn contains_any(value: &str, filters: &[String]) -> bool {
    filters.iter().any(|f| value.contains(f.as_str()))
}

/// True when `value` contains every one of `filters` (vacuously true when empty)
pub fn contains_all(value: &str, filters: &[String]) -> bool {
    filters.iter().all(|f| value.contains(f.as_str()))
}

/// Checks an attachment href before it is resolved
///
/// Rejects empty hrefs, hrefs with whitespace and hrefs containing any of
/// the unallowed fragments.
pub fn is_candidate_href(href: &str) -> bool {
    if href.is_empty() || href.chars().any(char::is_whitespace) {
        return false;
    }

    !UNALLOWED_HREF_FRAGMENTS
        .iter()
        .any(|fragment| href.contains(fragment))
}

/// Checks a page link before it is resolved
///
/// Same rules as [`is_candidate_href`], and the href must contain a path
/// separator.
///
/// # Examples
///
/// ```
/// use pepe_scout::url::is_followable_link;
///
/// assert!(is_followable_link("/g/thread/1"));
/// assert!(!is_followable_link("javascript:void(0)"));
/// assert!(!is_followable_link("catalog"));
/// ```
pub fn is_followable_link(href: &str) -> bool {
    is_candidate_href(href) && href.contains('/')
}

/// Board short name: the first path segment, or empty
///
/// `https://boards.4channel.org/g/thread/1` belongs to board `g`.
pub fn board_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or_default()
        .to_string()
}

/// Lowercased extension of the last path segment, with the leading dot
pub fn image_extension(url: &Url) -> Option<String> {
    let file_name = url.path_segments()?.last()?;
    let (stem, ext) = file_name.rsplit_once('.')?;

    if stem.is_empty() || ext.is_empty() {
        return None;
    }

    Some(format!(".{}", ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_contains_any() {
        let filters = strings(&["4chan.org", "4channel.org"]);
        assert!(contains_any("boards.4channel.org", &filters));
        assert!(!contains_any("example.com", &filters));
        assert!(!contains_any("example.com", &[]));
    }

    #[test]
    fn test_contains_all() {
        let filters = strings(&["https", "boards."]);
        assert!(contains_all("https://boards.4channel.org/g/", &filters));
        assert!(!contains_all("http://boards.4channel.org/g/", &filters));
        assert!(!contains_all("https://www.4channel.org/", &filters));
        assert!(contains_all("anything", &[]));
    }

    #[test]
    fn test_followable_links() {
        assert!(is_followable_link("/g/"));
        assert!(is_followable_link("//boards.4channel.org/g/"));
        assert!(is_followable_link("thread/123/title"));
        assert!(is_followable_link("https://boards.4channel.org/v/"));
    }

    #[test]
    fn test_rejected_links() {
        assert!(!is_followable_link(""));
        assert!(!is_followable_link("javascript:void(0)"));
        assert!(!is_followable_link("#bottom"));
        assert!(!is_followable_link("/g/thread/1#p2"));
        assert!(!is_followable_link("/g/some thread"));
        assert!(!is_followable_link("/g/\tthread"));
        assert!(!is_followable_link("/<b>/"));
        assert!(!is_followable_link("catalog"));
    }

    #[test]
    fn test_candidate_href_ignores_separator_rule() {
        assert!(is_candidate_href("1658000000000.png"));
        assert!(!is_candidate_href("javascript:void(0)"));
    }

    #[test]
    fn test_board_of() {
        let url = Url::parse("https://boards.4channel.org/g/thread/1").unwrap();
        assert_eq!(board_of(&url), "g");

        let root = Url::parse("https://www.4chan.org/").unwrap();
        assert_eq!(board_of(&root), "");
    }

    #[test]
    fn test_image_extension() {
        let png = Url::parse("https://i.4cdn.org/g/1658000000000.PNG").unwrap();
        assert_eq!(image_extension(&png).as_deref(), Some(".png"));

        let none = Url::parse("https://i.4cdn.org/g/").unwrap();
        assert_eq!(image_extension(&none), None);

        let hidden = Url::parse("https://i.4cdn.org/g/.png").unwrap();
        assert_eq!(image_extension(&hidden), None);

        let query = Url::parse("https://i.4cdn.org/g/1.webm?x=1.png").unwrap();
        assert_eq!(image_extension(&query).as_deref(), Some(".webm"));
    }
}
