//! On-disk bodies and diagnostic dumps
//!
//! Pages and images are written under freshly generated names so two tasks can
//! never collide on a path. Error responses and task crashes go to a separate
//! diagnostic tree for post-mortem inspection.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Longest sanitized URL kept in a diagnostic file name
const MAX_NAME_LEN: usize = 120;

/// Returns a path in `dir` that no other call will return
///
/// `extension` includes its leading dot (".html", ".png").
pub fn unique_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("{}{}", Uuid::new_v4(), extension))
}

/// Writes `bytes` to `path`, creating parent directories first
pub async fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

/// Replaces every character that is unsafe in a file name
pub fn sanitize_for_file_name(raw: &str) -> String {
    let stripped = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);

    stripped
        .chars()
        .take(MAX_NAME_LEN)
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.9fZ").to_string()
}

/// Writes unexpected responses and crash reports under one root directory
#[derive(Debug, Clone)]
pub struct DiagnosticStore {
    root: PathBuf,
}

impl DiagnosticStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves the body of an unexpected response as `<status>/<url>-<time>.html`
    pub async fn record_response(&self, status: u16, url: &str, body: &[u8]) -> io::Result<PathBuf> {
        let path = self.root.join(status.to_string()).join(format!(
            "{}-{}.html",
            sanitize_for_file_name(url),
            timestamp()
        ));
        write_file(&path, body).await?;
        Ok(path)
    }

    /// Saves a crash report as `panic/<time>.txt`
    pub async fn record_crash(&self, label: &str, message: &str, backtrace: &str) -> io::Result<PathBuf> {
        let path = self.root.join("panic").join(format!("{}.txt", timestamp()));
        let report = format!(
            "task: {}\ntime: {}\nmessage: {}\n\nbacktrace:\n{}\n",
            label,
            Utc::now().to_rfc3339(),
            message,
            backtrace
        );
        write_file(&path, report.as_bytes()).await?;
        Ok(path)
    }
}
