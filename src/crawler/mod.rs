//! Crawler module for board page and image processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP transport with retry logic
//! - HTML parsing and link extraction
//! - The page pipeline (fetch, store, expand)
//! - The image pipeline (fetch, store, classify)
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod html;
mod image;
mod parser;

pub use coordinator::{run_crawl, Coordinator, CrawlCounters, CrawlReport};
pub use fetcher::{build_http_client, Outcome, Request, RequestBody, RetryPolicy, Transport};
pub use html::{clear_pages, HtmlPipeline, PageFetch};
pub use image::{ClassifierReply, ImageFetch, ImagePipeline};
pub use parser::{parse_page, PageSelectors, ParsedPage};

use crate::coordination::{Barrier, Registration, Supervisor};
use crate::storage::Database;
use crate::url::normalize_href;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// A unit of work travelling through a pipeline channel
///
/// The registration is taken before the unit is sent and travels with it,
/// so the barrier counts the unit while it waits in the channel.
pub struct Work<T> {
    pub item: T,
    pub registration: Registration,
}

impl<T> Work<T> {
    pub fn new(item: T, registration: Registration) -> Self {
        Self { item, registration }
    }
}

/// Everything both pipelines share
#[derive(Clone)]
pub struct PipelineContext {
    pub db: Database,
    pub transport: Transport,
    pub supervisor: Supervisor,
    pub barrier: Barrier,
    pub counters: Arc<CrawlCounters>,
}

/// Registers `item` with the barrier and hands it to a pipeline channel
///
/// Suspends while the channel is full. A closed channel means the pipeline
/// has already stopped; the item is dropped together with its registration.
pub(crate) async fn send_work<T>(tx: &mpsc::Sender<Work<T>>, barrier: &Barrier, item: T) {
    let work = Work::new(item, barrier.register());
    if tx.send(work).await.is_err() {
        debug!("Pipeline channel closed; dropping work");
    }
}

/// Hrefs some task of one pipeline is fetching right now
///
/// The unique index stops duplicate records; this stops duplicate downloads
/// of an href that is linked twice while its first fetch is still running.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    hrefs: Arc<Mutex<HashSet<String>>>,
}

/// Exclusive claim on one href; released on drop
#[derive(Debug)]
pub struct InFlightClaim {
    hrefs: Arc<Mutex<HashSet<String>>>,
    href: String,
}

impl InFlight {
    /// Claims `href`, or returns `None` while another task holds it
    pub fn claim(&self, href: &str) -> Option<InFlightClaim> {
        let key = normalize_href(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string());

        let mut hrefs = self.hrefs.lock().unwrap_or_else(PoisonError::into_inner);
        hrefs.insert(key.clone()).then(|| InFlightClaim {
            hrefs: Arc::clone(&self.hrefs),
            href: key,
        })
    }

    pub fn len(&self) -> usize {
        self.hrefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.hrefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.href);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let in_flight = InFlight::default();

        let claim = in_flight.claim("https://i.example.org/g/1.png").unwrap();
        assert!(in_flight.claim("https://i.example.org/g/1.png").is_none());
        assert!(in_flight.claim("https://i.example.org/g/2.png").is_some());

        drop(claim);
        assert!(in_flight.is_empty());
        assert!(in_flight.claim("https://i.example.org/g/1.png").is_some());
    }

    #[test]
    fn test_claim_uses_normalized_href() {
        let in_flight = InFlight::default();

        let _claim = in_flight.claim("//i.example.org/g/1.png").unwrap();
        assert!(in_flight.claim("https://i.example.org/g/1.png#top").is_none());
        assert_eq!(in_flight.len(), 1);
    }
}
