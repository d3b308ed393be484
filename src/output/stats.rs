//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! page and image statistics from the storage layer.

use crate::state::Category;
use crate::storage::{Database, Storage};
use crate::ScoutError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Pages currently stored (non-zero only mid-pass or after a crash)
    pub total_pages: u64,

    /// Total number of stored images
    pub total_images: u64,

    /// Count of images per category
    pub images_by_category: HashMap<Category, u64>,
}

impl CrawlStatistics {
    /// Images in `category`, zero when there are none
    pub fn count(&self, category: Category) -> u64 {
        self.images_by_category.get(&category).copied().unwrap_or(0)
    }

    /// Share of classified images that landed in `category`, in percent
    pub fn share_of_classified(&self, category: Category) -> f64 {
        let classified = self.total_images - self.count(Category::Unclassified);
        if classified == 0 {
            return 0.0;
        }
        (self.count(category) as f64 / classified as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `db` - The database to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(ScoutError)` - Failed to query statistics
pub fn load_statistics(db: &Database) -> Result<CrawlStatistics, ScoutError> {
    db.with(|storage| {
        let total_pages = storage.count_pages()?;
        let images_by_category = storage.count_images_by_category()?;
        let total_images = images_by_category.values().sum();

        Ok(CrawlStatistics {
            total_pages,
            total_images,
            images_by_category,
        })
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Pepe-Scout Statistics ===\n");

    println!("Overview:");
    println!("  Stored pages: {}", stats.total_pages);
    println!("  Stored images: {}", stats.total_images);
    println!();

    println!("Images by Category:");
    for category in Category::ALL {
        let count = stats.count(category);
        if category.is_classified() {
            println!(
                "  {}: {} ({:.1}% of classified)",
                category,
                count,
                stats.share_of_classified(category)
            );
        } else {
            println!("  {}: {}", category, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InsertOutcome, NewImage};

    fn stats(counts: &[(Category, u64)]) -> CrawlStatistics {
        let images_by_category: HashMap<_, _> = counts.iter().copied().collect();
        CrawlStatistics {
            total_pages: 0,
            total_images: images_by_category.values().sum(),
            images_by_category,
        }
    }

    #[test]
    fn test_count_missing_category() {
        let stats = stats(&[(Category::Pepe, 3)]);
        assert_eq!(stats.count(Category::Pepe), 3);
        assert_eq!(stats.count(Category::Maybe), 0);
    }

    #[test]
    fn test_share_ignores_unclassified() {
        let stats = stats(&[
            (Category::Pepe, 1),
            (Category::NonPepe, 3),
            (Category::Unclassified, 10),
        ]);
        assert!((stats.share_of_classified(Category::Pepe) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_share_without_classified_images() {
        let stats = stats(&[(Category::Unclassified, 2)]);
        assert_eq!(stats.share_of_classified(Category::Pepe), 0.0);
    }

    #[test]
    fn test_load_statistics() {
        let db = Database::in_memory().unwrap();
        for n in 0..3 {
            let outcome = db
                .with(|s| {
                    s.insert_image(NewImage {
                        file_path: format!("{}.png", n),
                        href: format!("https://i.a.b/g/{}.png", n),
                        board: "g".to_string(),
                    })
                })
                .unwrap();
            if let (0, InsertOutcome::Created(image)) = (n, outcome) {
                db.with(|s| s.update_classification(image.id, Category::Pepe, 0.99))
                    .unwrap();
            }
        }

        let stats = load_statistics(&db).unwrap();
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.count(Category::Pepe), 1);
        assert_eq!(stats.count(Category::Unclassified), 2);
        assert_eq!(stats.total_pages, 0);
    }
}
