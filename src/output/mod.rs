//! Output module for generating collection summaries and reports
//!
//! This module handles:
//! - Printing page and image statistics
//! - Generating markdown summaries of classified images

mod markdown;
pub mod stats;

pub use markdown::{build_summary, format_markdown_summary, generate_markdown_summary, CategorySummary};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
