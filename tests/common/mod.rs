//! Shared helpers for integration tests

#![allow(dead_code)]

use pepe_scout::config::Config;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a crawl configuration pointing at mock servers
///
/// Page links must contain `/g/`, so image anchors (served under `/i/`)
/// are never fetched as pages.
pub fn test_config(board_url: &str, classifier_url: &str, root: &Path) -> Config {
    let toml = format!(
        r#"
[crawler]
seed-url = "{board}/g/"
allowed-host-substrings = ["127.0.0.1"]
required-url-substrings = ["/g/"]
allowed-image-extensions = [".png", ".jpg"]
html-limit = 2
image-limit = 2
classify-limit = 1
channel-capacity = 4
image-selector = "div.fileText a"

[classifier]
endpoint = "{classifier}"

[request]
max-attempts = 5
backoff-base-ms = 1
timeout-secs = 5

[storage]
database-path = "{db}"
data-dir = "{data}"
"#,
        board = board_url,
        classifier = classifier_url,
        db = root.join("scout.db").display(),
        data = root.join("data").display(),
    );

    toml::from_str(&toml).expect("test config should parse")
}

/// Board page markup with the given page links and image links
pub fn board_page(links: &[&str], images: &[&str]) -> String {
    let mut html = String::from("<html><body>\n");
    for link in links {
        html.push_str(&format!("<a href=\"{}\">link</a>\n", link));
    }
    for image in images {
        html.push_str(&format!(
            "<div class=\"file\"><div class=\"fileText\">File: <a href=\"{}\">img</a></div></div>\n",
            image
        ));
    }
    html.push_str("</body></html>\n");
    html
}

/// Mounts a healthy `/health` endpoint
pub async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
}

/// Counts regular files below `dir`, recursively; zero when it does not exist
pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}
