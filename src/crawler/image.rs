//! Image pipeline
//!
//! Per image href: `unseen -> fetching -> stored(unclassified) -> classified`.
//! Downloading and classification run under independent limiters.

use crate::config::Config;
use crate::coordination::Limiter;
use crate::crawler::{send_work, InFlight, Outcome, PipelineContext, Request, Work};
use crate::state::Category;
use crate::storage::{unique_path, write_file, ImageRecord, InsertOutcome, NewImage, Storage};
use crate::url::{board_of, image_extension, normalize_href};
use crate::ScoutError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Multipart field the classifier reads the upload from
const UPLOAD_FIELD: &str = "file";

/// Status the classifier answers with when it cannot read the file
const FAULTY_INPUT_STATUS: u16 = 500;

/// Body of a successful classifier response
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClassifierReply {
    pub score: f32,
}

/// Result of trying to fetch one image
#[derive(Debug)]
pub enum ImageFetch {
    /// 2xx response with the lowercased extension of the URL path
    Fetched {
        url: Url,
        extension: String,
        body: Vec<u8>,
    },

    /// Extension missing or not in the allowed set
    Disallowed,

    /// An image with this href is already stored
    AlreadyExists,

    /// HTTP 404
    NotFound,

    /// Any other failed response
    Unsuccessful { reason: String },

    /// The href does not normalize to an http(s) URL
    Invalid { reason: String },
}

/// Downloads, stores and classifies images
pub struct ImagePipeline {
    ctx: PipelineContext,
    allowed_extensions: Vec<String>,
    fetch_limiter: Limiter,
    in_flight: InFlight,
    classify_limiter: Limiter,
    image_dir: PathBuf,
    endpoint: String,
    classify: mpsc::Sender<Work<ImageRecord>>,
}

impl ImagePipeline {
    pub fn new(
        ctx: PipelineContext,
        config: &Config,
        image_dir: PathBuf,
        classify: mpsc::Sender<Work<ImageRecord>>,
    ) -> Self {
        Self {
            ctx,
            allowed_extensions: config
                .crawler
                .allowed_image_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            fetch_limiter: Limiter::new(config.crawler.image_limit),
            in_flight: InFlight::default(),
            classify_limiter: Limiter::new(config.crawler.classify_limit),
            image_dir,
            endpoint: config.classifier.endpoint.clone(),
            classify,
        }
    }

    /// Downloads an image unless its type is disallowed or it is stored already
    pub async fn fetch_image(&self, href: &str) -> Result<ImageFetch, ScoutError> {
        let url = match normalize_href(href) {
            Ok(url) => url,
            Err(e) => {
                return Ok(ImageFetch::Invalid {
                    reason: e.to_string(),
                })
            }
        };

        let extension = match image_extension(&url) {
            Some(ext) if self.allowed_extensions.contains(&ext) => ext,
            _ => return Ok(ImageFetch::Disallowed),
        };

        if self.ctx.db.with(|s| s.image_exists(url.as_str()))? {
            return Ok(ImageFetch::AlreadyExists);
        }

        let request = Request::get(url.as_str());
        let outcome = self
            .fetch_limiter
            .run(self.ctx.transport.execute(&request))
            .await?;

        Ok(match outcome {
            Outcome::Success { body, .. } => ImageFetch::Fetched {
                url,
                extension,
                body,
            },
            Outcome::NotFound => ImageFetch::NotFound,
            Outcome::Failed { reason, .. } => ImageFetch::Unsuccessful { reason },
        })
    }

    /// Writes the image under a fresh name and records it as unclassified
    pub async fn store_image(
        &self,
        url: &Url,
        extension: &str,
        body: &[u8],
    ) -> Result<InsertOutcome<ImageRecord>, ScoutError> {
        let path = unique_path(&self.image_dir, extension);
        write_file(&path, body).await?;

        let image = NewImage {
            file_path: path.to_string_lossy().into_owned(),
            href: url.to_string(),
            board: board_of(url),
        };
        let outcome = self.ctx.db.with(|s| s.insert_image(image))?;

        match &outcome {
            InsertOutcome::Created(image) => {
                self.ctx
                    .counters
                    .images_stored
                    .fetch_add(1, Ordering::Relaxed);
                info!("Stored image {} as {}", image.href, image.file_path);
            }
            InsertOutcome::AlreadyExists => {
                tokio::fs::remove_file(&path).await?;
                debug!("Image {} stored concurrently; discarded duplicate", url);
            }
        }

        Ok(outcome)
    }

    /// Fetches and stores one image href, then queues it for classification
    pub async fn visit(&self, href: &str) -> Result<(), ScoutError> {
        let Some(_claim) = self.in_flight.claim(href) else {
            debug!("Image {} is already being fetched", href);
            return Ok(());
        };

        match self.fetch_image(href).await? {
            ImageFetch::Fetched {
                url,
                extension,
                body,
            } => {
                if let InsertOutcome::Created(image) =
                    self.store_image(&url, &extension, &body).await?
                {
                    send_work(&self.classify, &self.ctx.barrier, image).await;
                }
            }
            ImageFetch::Unsuccessful { reason } => {
                warn!("Failed request {}; ignoring ({})", href, reason);
            }
            ImageFetch::NotFound => info!("Image {} not found", href),
            ImageFetch::Disallowed => debug!("Image type not allowed: {}", href),
            ImageFetch::AlreadyExists => debug!("Image {} already stored", href),
            ImageFetch::Invalid { reason } => debug!("Skipping {}: {}", href, reason),
        }
        Ok(())
    }

    /// Scores a stored image and files it into a category
    ///
    /// A 500 from the classifier marks the file `faulty` with score 0. Any
    /// other failure is retried with backoff until the attempt budget runs
    /// out. Images that already carry a verdict are left as they are.
    pub async fn classify(&self, image: &ImageRecord) -> Result<Category, ScoutError> {
        let data = tokio::fs::read(&image.file_path).await?;
        let file_name = Path::new(&image.file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| image.file_path.clone());

        let request = Request::post_file(self.endpoint.as_str(), UPLOAD_FIELD, file_name, data);
        let policy = *self.ctx.transport.policy();

        let mut attempt = 1;
        let (category, score) = loop {
            match self.ctx.transport.execute(&request).await? {
                Outcome::Success { body, .. } => {
                    let reply: ClassifierReply =
                        serde_json::from_slice(&body).map_err(|source| {
                            ScoutError::ClassifierResponse {
                                file: image.file_path.clone(),
                                source,
                            }
                        })?;
                    break (Category::from_score(reply.score), reply.score);
                }
                Outcome::Failed {
                    status: Some(FAULTY_INPUT_STATUS),
                    ..
                } => {
                    warn!("Unsuccessful POST {}; faulty image {}", self.endpoint, image.id);
                    break (Category::Faulty, 0.0);
                }
                other => {
                    debug!("Classification of image {} failed: {:?}", image.id, other);
                    policy.back_off(&request, attempt).await?;
                    attempt += 1;
                }
            }
        };

        let updated = self
            .ctx
            .db
            .with(|s| s.update_classification(image.id, category, score))?;

        if updated {
            self.ctx.counters.record(category);
            info!(
                "Classified image {}; category: {}; score: {}",
                image.id, category, score
            );
        } else {
            debug!("Image {} was already classified", image.id);
        }

        Ok(category)
    }

    /// Resubmits every unclassified image without downloading it again
    pub async fn seed(&self) -> Result<(), ScoutError> {
        let images = self
            .ctx
            .db
            .with(|s| s.get_images_by_category(Category::Unclassified))?;
        info!("Resubmitting {} unclassified images", images.len());

        for image in images {
            send_work(&self.classify, &self.ctx.barrier, image).await;
        }
        Ok(())
    }

    /// Dispatches queued image hrefs and classification jobs until the barrier fires
    pub async fn run(
        self: Arc<Self>,
        mut hrefs: mpsc::Receiver<Work<String>>,
        mut classify: mpsc::Receiver<Work<ImageRecord>>,
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
                        format!("image {}", href),
                        async move { pipeline.visit(&href).await },
                    );
                }
                Some(work) = classify.recv() => {
                    let pipeline = Arc::clone(&self);
                    let image = work.item;
                    self.ctx.supervisor.spawn(
                        work.registration,
                        format!("classify {}", image.id),
                        async move {
                            pipeline
                                .classify_limiter
                                .run(pipeline.classify(&image))
                                .await
                                .map(|_| ())
                        },
                    );
                }
                else => break,
            }
        }

        info!("Image pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_reply() {
        let reply: ClassifierReply = serde_json::from_str(r#"{"score": 0.75}"#).unwrap();
        assert!((reply.score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_classifier_reply_rejects_missing_score() {
        assert!(serde_json::from_str::<ClassifierReply>(r#"{"label": "pepe"}"#).is_err());
    }
}
