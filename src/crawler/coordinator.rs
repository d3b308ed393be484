//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires both pipelines together and runs one crawl pass:
//! - Checking that the classifier is reachable
//! - Building limiters, the barrier, the supervisor and the channels
//! - Seeding both pipelines from storage and the seed URL
//! - Waiting for quiescence or the first fatal failure
//! - Clearing the pass's pages and reporting what was done

use crate::config::Config;
use crate::coordination::{Barrier, Supervisor};
use crate::crawler::html::{clear_pages, HtmlPipeline};
use crate::crawler::image::ImagePipeline;
use crate::crawler::{PipelineContext, Transport};
use crate::state::Category;
use crate::storage::{open_storage, Database, DiagnosticStore};
use crate::ScoutError;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Live counters updated by pipeline tasks
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pub pages_stored: AtomicU64,
    pub images_stored: AtomicU64,
    pub pepe: AtomicU64,
    pub maybe: AtomicU64,
    pub non_pepe: AtomicU64,
    pub faulty: AtomicU64,
}

impl CrawlCounters {
    /// Counts one classification verdict
    pub fn record(&self, category: Category) {
        let counter = match category {
            Category::Pepe => &self.pepe,
            Category::Maybe => &self.maybe,
            Category::NonPepe => &self.non_pepe,
            Category::Faulty => &self.faulty,
            Category::Unclassified => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pages_cleared: usize, elapsed: Duration) -> CrawlReport {
        CrawlReport {
            pages_stored: self.pages_stored.load(Ordering::Relaxed),
            images_stored: self.images_stored.load(Ordering::Relaxed),
            pepe: self.pepe.load(Ordering::Relaxed),
            maybe: self.maybe.load(Ordering::Relaxed),
            non_pepe: self.non_pepe.load(Ordering::Relaxed),
            faulty: self.faulty.load(Ordering::Relaxed),
            pages_cleared,
            elapsed,
        }
    }
}

/// Summary of one finished crawl pass
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub pages_stored: u64,
    pub images_stored: u64,
    pub pepe: u64,
    pub maybe: u64,
    pub non_pepe: u64,
    pub faulty: u64,
    pub pages_cleared: usize,
    pub elapsed: Duration,
}

impl CrawlReport {
    /// Images that received a verdict during this pass
    pub fn classified(&self) -> u64 {
        self.pepe + self.maybe + self.non_pepe + self.faulty
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    db: Database,
}

impl Coordinator {
    /// Creates a coordinator over an opened database
    pub fn new(config: Config, db: Database) -> Self {
        Self { config, db }
    }

    /// Runs one crawl pass to completion
    ///
    /// Returns the first fatal task failure, if any. On success every page
    /// record of the pass has been cleared again.
    pub async fn run(self) -> Result<CrawlReport, ScoutError> {
        let start_time = Instant::now();
        let storage = &self.config.storage;

        let diagnostics = DiagnosticStore::new(storage.error_dir());
        let transport = Transport::new(&self.config.request, diagnostics.clone())?;
        transport
            .health_check(&self.config.classifier.endpoint)
            .await?;

        let barrier = Barrier::new();
        let (supervisor, mut fatal_rx) = Supervisor::new(diagnostics);
        let counters = Arc::new(CrawlCounters::default());

        let ctx = PipelineContext {
            db: self.db.clone(),
            transport,
            supervisor: supervisor.clone(),
            barrier: barrier.clone(),
            counters: counters.clone(),
        };

        let capacity = self.config.crawler.channel_capacity;
        let (href_tx, href_rx) = mpsc::channel(capacity);
        let (page_tx, page_rx) = mpsc::channel(capacity);
        let (image_href_tx, image_href_rx) = mpsc::channel(capacity);
        let (classify_tx, classify_rx) = mpsc::channel(capacity);

        let html = Arc::new(HtmlPipeline::new(
            ctx.clone(),
            &self.config.crawler,
            storage.html_dir(),
            href_tx,
            page_tx,
            image_href_tx,
        )?);
        let image = Arc::new(ImagePipeline::new(
            ctx,
            &self.config,
            storage.image_dir(),
            classify_tx,
        ));

        let dispatchers = [
            tokio::spawn(html.clone().run(href_rx, page_rx)),
            tokio::spawn(image.clone().run(image_href_rx, classify_rx)),
        ];

        // Seed work is registered before the gate opens. Unclassified images
        // are queued before the page seed can store new ones.
        let images = image.clone();
        let image_seed = supervisor.spawn(barrier.register(), "seed images", async move {
            images.seed().await
        });
        if image_seed.await.is_err() {
            warn!("Image seed task was cancelled");
        }

        let seed_url = self.config.crawler.seed_url.clone();
        let pages = html.clone();
        supervisor.spawn(barrier.register(), "seed pages", async move {
            pages.seed(&seed_url).await
        });
        barrier.open_gate();

        info!("Crawling from {}", self.config.crawler.seed_url);

        tokio::select! {
            _ = barrier.wait() => {}
            Some(failure) = fatal_rx.recv() => {
                error!("Stopping crawl: {}", failure);
                for dispatcher in &dispatchers {
                    dispatcher.abort();
                }
                return Err(failure);
            }
        }

        for dispatcher in dispatchers {
            // Dispatchers leave their loop once the barrier has fired
            let _ = dispatcher.await;
        }

        let pages_cleared = clear_pages(&self.db).await?;
        let report = counters.snapshot(pages_cleared, start_time.elapsed());

        info!(
            "Crawl completed in {:?}: {} pages, {} images stored, {} classified \
             (pepe: {}, maybe: {}, non-pepe: {}, faulty: {})",
            report.elapsed,
            report.pages_stored,
            report.images_stored,
            report.classified(),
            report.pepe,
            report.maybe,
            report.non_pepe,
            report.faulty
        );

        Ok(report)
    }
}

/// Opens the configured database and runs one crawl pass
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed successfully
/// * `Err(ScoutError)` - Crawl failed
pub async fn run_crawl(config: Config) -> Result<CrawlReport, ScoutError> {
    let db = open_storage(Path::new(&config.storage.database_path))?;
    Coordinator::new(config, db).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_record() {
        let counters = CrawlCounters::default();
        counters.record(Category::Pepe);
        counters.record(Category::Pepe);
        counters.record(Category::Faulty);
        counters.record(Category::Unclassified);

        let report = counters.snapshot(0, Duration::ZERO);
        assert_eq!(report.pepe, 2);
        assert_eq!(report.faulty, 1);
        assert_eq!(report.classified(), 3);
    }
}
