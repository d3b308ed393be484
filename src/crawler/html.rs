//! Page pipeline
//!
//! Per href: `unseen -> fetching -> stored -> expanded`. A fetched page is
//! stored on disk and in the database, then expanded: its links go back into
//! this pipeline and its image links go to the image pipeline.

use crate::config::CrawlerConfig;
use crate::coordination::Limiter;
use crate::crawler::parser::{parse_page, PageSelectors};
use crate::crawler::{send_work, InFlight, Outcome, PipelineContext, Request, Work};
use crate::storage::{
    unique_path, write_file, Database, InsertOutcome, NewPage, PageRecord, Storage,
};
use crate::url::{board_of, normalize_href, FilterVerdict, PageFilter};
use crate::{ScoutError, UrlError};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Result of trying to fetch one page
#[derive(Debug)]
pub enum PageFetch {
    /// 2xx response; `url` is the normalized href
    Fetched { url: Url, body: Vec<u8> },

    /// A page with this href is already stored
    AlreadyExists,

    /// Rejected by the host allow-list or the required substrings
    Filtered(FilterVerdict),

    /// HTTP 404
    NotFound,

    /// Any other failed response
    Unsuccessful { reason: String },

    /// The href does not normalize to an http(s) URL
    Invalid { reason: String },
}

impl PageFetch {
    /// Short description for logs and seed errors
    pub fn reason(&self) -> String {
        match self {
            Self::Fetched { .. } => "fetched".to_string(),
            Self::AlreadyExists => "already stored".to_string(),
            Self::Filtered(verdict) => format!("filtered ({:?})", verdict),
            Self::NotFound => "404 response".to_string(),
            Self::Unsuccessful { reason } | Self::Invalid { reason } => reason.clone(),
        }
    }
}

/// Fetches, stores and expands board pages
pub struct HtmlPipeline {
    ctx: PipelineContext,
    filter: PageFilter,
    selectors: PageSelectors,
    limiter: Limiter,
    in_flight: InFlight,
    html_dir: PathBuf,
    hrefs: mpsc::Sender<Work<String>>,
    pages: mpsc::Sender<Work<PageRecord>>,
    images: mpsc::Sender<Work<String>>,
}

impl HtmlPipeline {
    /// Creates the pipeline
    ///
    /// `hrefs` and `pages` feed this pipeline's own dispatcher, `images` feeds
    /// the image pipeline.
    pub fn new(
        ctx: PipelineContext,
        config: &CrawlerConfig,
        html_dir: PathBuf,
        hrefs: mpsc::Sender<Work<String>>,
        pages: mpsc::Sender<Work<PageRecord>>,
        images: mpsc::Sender<Work<String>>,
    ) -> Result<Self, ScoutError> {
        Ok(Self {
            ctx,
            filter: PageFilter::from_config(config),
            selectors: PageSelectors::from_config(config)?,
            limiter: Limiter::new(config.html_limit),
            in_flight: InFlight::default(),
            html_dir,
            hrefs,
            pages,
            images,
        })
    }

    /// Fetches a page unless it is stored already or filtered out
    pub async fn fetch_page(&self, href: &str) -> Result<PageFetch, ScoutError> {
        let url = match normalize_href(href) {
            Ok(url) => url,
            Err(e) => {
                return Ok(PageFetch::Invalid {
                    reason: e.to_string(),
                })
            }
        };

        if self.ctx.db.with(|s| s.page_exists(url.as_str()))? {
            return Ok(PageFetch::AlreadyExists);
        }

        let verdict = self.filter.check(&url);
        if !verdict.is_allowed() {
            return Ok(PageFetch::Filtered(verdict));
        }

        let request = Request::get(url.as_str());
        let outcome = self.limiter.run(self.ctx.transport.execute(&request)).await?;

        Ok(match outcome {
            Outcome::Success { body, .. } => PageFetch::Fetched { url, body },
            Outcome::NotFound => PageFetch::NotFound,
            Outcome::Failed { reason, .. } => PageFetch::Unsuccessful { reason },
        })
    }

    /// Writes the body under a fresh name and records the page
    ///
    /// When a concurrent task stored the same href first, the file just
    /// written is removed again.
    pub async fn store_page(
        &self,
        url: &Url,
        body: &[u8],
    ) -> Result<InsertOutcome<PageRecord>, ScoutError> {
        let path = unique_path(&self.html_dir, ".html");
        write_file(&path, body).await?;

        let page = NewPage {
            file_path: path.to_string_lossy().into_owned(),
            href: url.to_string(),
            board: board_of(url),
        };
        let outcome = self.ctx.db.with(|s| s.insert_page(page))?;

        match &outcome {
            InsertOutcome::Created(page) => {
                self.ctx.counters.pages_stored.fetch_add(1, Ordering::Relaxed);
                info!("Stored page {} as {}", page.href, page.file_path);
            }
            InsertOutcome::AlreadyExists => {
                tokio::fs::remove_file(&path).await?;
                debug!("Page {} stored concurrently; discarded duplicate", url);
            }
        }

        Ok(outcome)
    }

    /// Fetches and stores one href, then queues the page for expansion
    pub async fn visit(&self, href: &str) -> Result<(), ScoutError> {
        let Some(_claim) = self.in_flight.claim(href) else {
            debug!("Page {} is already being fetched", href);
            return Ok(());
        };

        match self.fetch_page(href).await? {
            PageFetch::Fetched { url, body } => {
                if let InsertOutcome::Created(page) = self.store_page(&url, &body).await? {
                    send_work(&self.pages, &self.ctx.barrier, page).await;
                }
            }
            PageFetch::Unsuccessful { reason } => {
                warn!("Failed request {}; ignoring ({})", href, reason);
            }
            PageFetch::NotFound => info!("Page {} not found", href),
            other => debug!("Skipping {}: {}", href, other.reason()),
        }
        Ok(())
    }

    /// Sends the page's links and image links onward, then marks it parsed
    pub async fn expand(&self, page: &PageRecord) -> Result<(), ScoutError> {
        let bytes = tokio::fs::read(&page.file_path).await?;
        let base = Url::parse(&page.href).map_err(|e| UrlError::Parse(e.to_string()))?;

        let parsed = {
            let html = String::from_utf8_lossy(&bytes);
            parse_page(&html, &base, &self.selectors)
        };

        debug!(
            "Page {} has {} links and {} images",
            page.href,
            parsed.links.len(),
            parsed.images.len()
        );

        for link in parsed.links {
            send_work(&self.hrefs, &self.ctx.barrier, String::from(link)).await;
        }
        for image in parsed.images {
            send_work(&self.images, &self.ctx.barrier, String::from(image)).await;
        }

        self.ctx.db.with(|s| s.mark_page_parsed(page.id))?;
        Ok(())
    }

    /// Re-emits every stored page, then fetches the seed URL
    ///
    /// A seed that is already stored is fine; any other failure to fetch it
    /// ends the run with `SeedUnavailable`.
    pub async fn seed(&self, seed_url: &str) -> Result<(), ScoutError> {
        let pages = self.ctx.db.with(|s| s.get_all_pages())?;
        info!("Reloading {} stored pages", pages.len());
        for page in pages {
            send_work(&self.pages, &self.ctx.barrier, page).await;
        }

        match self.fetch_page(seed_url).await? {
            PageFetch::Fetched { url, body } => match self.store_page(&url, &body).await? {
                InsertOutcome::Created(page) => {
                    send_work(&self.pages, &self.ctx.barrier, page).await;
                }
                InsertOutcome::AlreadyExists => info!("Seed page {} already stored", seed_url),
            },
            PageFetch::AlreadyExists => info!("Seed page {} already stored", seed_url),
            other => {
                return Err(ScoutError::SeedUnavailable {
                    url: seed_url.to_string(),
                    reason: other.reason(),
                })
            }
        }

        Ok(())
    }

    /// Dispatches queued hrefs and pages until the barrier fires
    ///
    /// Never sends on a pipeline channel itself, so it always drains.
    pub async fn run(
        self: Arc<Self>,
        mut hrefs: mpsc::Receiver<Work<String>>,
        mut pages: mpsc::Receiver<Work<PageRecord>>,
    ) {
        let barrier = self.ctx.barrier.clone();

        loop {
            tokio::select! {
                biased;
                _ = barrier.wait() => break,
                Some(work) = hrefs.recv() => {
                    let pipeline = Arc::clone(&self);
                    let href = work.item;
                    self.ctx.supervisor.spawn(
                        work.registration,
                        format!("page {}", href),
                        async move { pipeline.visit(&href).await },
                    );
                }
                Some(work) = pages.recv() => {
                    let pipeline = Arc::clone(&self);
                    let page = work.item;
                    self.ctx.supervisor.spawn(
                        work.registration,
                        format!("expand {}", page.href),
                        async move { pipeline.expand(&page).await },
                    );
                }
                else => break,
            }
        }

        info!("Page pipeline stopped");
    }
}

/// Deletes every stored page record and its body file
///
/// Image records and classifications are kept. Files that cannot be removed
/// are logged and skipped.
pub async fn clear_pages(db: &Database) -> Result<usize, ScoutError> {
    let pages = db.with(|s| s.delete_all_pages())?;

    for page in &pages {
        if let Err(e) = tokio::fs::remove_file(&page.file_path).await {
            warn!("Failed to remove page file {}: {}", page.file_path, e);
        }
    }

    info!("Cleared {} pages", pages.len());
    Ok(pages.len())
}
