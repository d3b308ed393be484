//! Markdown summary generation
//!
//! This module generates a human-readable markdown report of the image
//! collection: category counts and the listing of likely matches.

use crate::output::stats::{load_statistics, CrawlStatistics};
use crate::state::Category;
use crate::storage::{Database, ImageRecord, Storage};
use crate::ScoutError;
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Data rendered into the markdown report
#[derive(Debug, Clone)]
pub struct CategorySummary {
    pub generated_at: String,
    pub config_hash: String,
    pub statistics: CrawlStatistics,
    pub pepe: Vec<ImageRecord>,
    pub maybe: Vec<ImageRecord>,
}

/// Collects the summary data from storage
///
/// # Arguments
///
/// * `db` - The database to query
/// * `config_hash` - Hash of the configuration the report is made under
pub fn build_summary(db: &Database, config_hash: &str) -> Result<CategorySummary, ScoutError> {
    let statistics = load_statistics(db)?;
    let pepe = db.with(|s| s.get_images_by_category(Category::Pepe))?;
    let maybe = db.with(|s| s.get_images_by_category(Category::Maybe))?;

    Ok(CategorySummary {
        generated_at: Utc::now().to_rfc3339(),
        config_hash: config_hash.to_string(),
        statistics,
        pepe,
        maybe,
    })
}

/// Writes the markdown report to `output_path`, creating parent directories
///
/// # Arguments
///
/// * `summary` - The summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(std::io::Error)` - Failed to write summary
pub fn generate_markdown_summary(
    summary: &CategorySummary,
    output_path: &Path,
) -> std::io::Result<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

fn push_image_table(md: &mut String, title: &str, images: &[ImageRecord]) {
    md.push_str(&format!("## {} ({})\n\n", title, images.len()));

    if images.is_empty() {
        md.push_str("None.\n\n");
        return;
    }

    md.push_str("| Href | Board | Score | File |\n");
    md.push_str("|------|-------|-------|------|\n");
    for image in images {
        md.push_str(&format!(
            "| {} | {} | {:.3} | {} |\n",
            image.href, image.board, image.classification, image.file_path
        ));
    }
    md.push('\n');
}

/// Formats a category summary as markdown
pub fn format_markdown_summary(summary: &CategorySummary) -> String {
    let mut md = String::new();

    md.push_str("# Pepe-Scout Summary\n\n");

    md.push_str("## Report Information\n\n");
    md.push_str(&format!("- **Generated**: {}\n", summary.generated_at));
    md.push_str(&format!("- **Config Hash**: {}\n", summary.config_hash));
    md.push_str(&format!(
        "- **Stored Pages**: {}\n",
        summary.statistics.total_pages
    ));
    md.push_str(&format!(
        "- **Stored Images**: {}\n\n",
        summary.statistics.total_images
    ));

    md.push_str("## Images by Category\n\n");
    md.push_str("| Category | Count |\n");
    md.push_str("|----------|-------|\n");
    for category in Category::ALL {
        md.push_str(&format!(
            "| {} | {} |\n",
            category,
            summary.statistics.count(category)
        ));
    }
    md.push('\n');

    push_image_table(&mut md, "Pepe", &summary.pepe);
    push_image_table(&mut md, "Maybe", &summary.maybe);

    md
}
