//! The resumable batch run: one word at a time, one ledger write per image.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::constants::{
    COST_PER_IMAGE_USD, DEFAULT_OUT_DIR, ESTIMATED_SECONDS_PER_IMAGE, ITEM_DELAY_SECONDS,
    PROGRESS_EVERY,
};
use crate::descriptions::DescriptionProvider;
use crate::descriptions::gemini::TextGenerator;
use crate::error::{ImageJobError, LedgerError, StorageError};
use crate::image_job::{AwaitOutcome, ImageService, PollSettings, await_image};
use crate::ledger::{GenerationRecord, Ledger};
use crate::prompt;
use crate::storage::{CdnUploader, image_filename, normalize_to_jpeg, save_image};
use crate::words::WordItem;

/// Words run by `wordpix test`, with their categories.
pub const SAMPLE_WORDS: [(&str, &str); 4] = [
    ("tourist", "travel"),
    ("guide", "travel"),
    ("doctor", "health"),
    ("chef", "food"),
];

/// Knobs for a run.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Directory the images are written to
    pub out_dir: PathBuf,
    /// Pause between two items
    pub item_delay: Duration,
    /// Polling cadence for image jobs
    pub poll: PollSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            item_delay: Duration::from_secs(ITEM_DELAY_SECONDS),
            poll: PollSettings::default(),
        }
    }
}

/// Why one item did not produce an image.
#[derive(Debug)]
pub enum ItemError {
    /// The job could not be submitted.
    Submit(ImageJobError),
    /// The service reported the job as failed.
    JobFailed,
    /// The job did not finish within the polling ceiling.
    TimedOut,
    /// The finished image could not be fetched.
    Download(ImageJobError),
    /// The image could not be converted or written.
    Storage(StorageError),
    /// The ledger could not be rewritten.
    Ledger(LedgerError),
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit(err) => write!(f, "submit failed: {err}"),
            Self::JobFailed => write!(f, "image job failed"),
            Self::TimedOut => write!(f, "image job timed out"),
            Self::Download(err) => write!(f, "download failed: {err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ItemError {}

/// A saved image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    /// The description the prompt was built from
    pub description: String,
    /// Where the image was written
    pub path: PathBuf,
    /// True when the write replaced another image of the same name
    pub replaced_existing: bool,
    /// Public URL, when the CDN upload succeeded
    pub cdn_url: Option<String>,
}

/// Totals of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items attempted
    pub total: usize,
    /// Items that produced an image and a ledger entry
    pub succeeded: usize,
    /// Items that failed, timeouts included
    pub failed: usize,
    /// Of the failures, how many hit the polling ceiling
    pub timed_out: usize,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl BatchReport {
    /// Successful images per minute of wall time.
    pub fn throughput_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.succeeded as f64 / minutes
        } else {
            0.0
        }
    }
}

/// Describes, renders, stores and records words.
pub struct Pipeline<G, S> {
    descriptions: DescriptionProvider<G>,
    images: S,
    cdn: Option<CdnUploader>,
    settings: PipelineSettings,
}

impl<G: TextGenerator, S: ImageService> Pipeline<G, S> {
    /// Creates a pipeline. Without an uploader images are only kept locally.
    pub fn new(
        descriptions: DescriptionProvider<G>,
        images: S,
        cdn: Option<CdnUploader>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            descriptions,
            images,
            cdn,
            settings,
        }
    }

    /// The image service in use.
    pub fn images(&self) -> &S {
        &self.images
    }

    /// Output directory of the images.
    pub fn out_dir(&self) -> &Path {
        &self.settings.out_dir
    }

    /// Resolves a word into the prompt sent to the image service.
    pub async fn describe(&self, word: &str, category: &str) -> (String, String) {
        let description = self.descriptions.resolve(word, category).await;
        let image_prompt = prompt::compose(word, category, &description);
        (description, image_prompt)
    }

    /// Runs one prompt through the image service and returns the image bytes.
    pub async fn render(&self, image_prompt: &str) -> Result<Vec<u8>, ItemError> {
        let job = self
            .images
            .submit(image_prompt)
            .await
            .map_err(ItemError::Submit)?;
        match await_image(&self.images, &job, &self.settings.poll).await {
            AwaitOutcome::Ready(url) => self.images.download(&url).await.map_err(ItemError::Download),
            AwaitOutcome::Failed => Err(ItemError::JobFailed),
            AwaitOutcome::TimedOut => Err(ItemError::TimedOut),
        }
    }

    /// Generates and stores the image for one word, without touching the ledger.
    pub async fn generate_one(
        &self,
        word: &str,
        category: &str,
        fallback_name: &str,
    ) -> Result<GeneratedImage, ItemError> {
        let (description, image_prompt) = self.describe(word, category).await;
        info!("Description for {word:?}: {description}");

        let bytes = self.render(&image_prompt).await?;
        let jpeg = normalize_to_jpeg(&bytes).map_err(ItemError::Storage)?;
        let filename = image_filename(word, fallback_name);
        let saved = save_image(&self.settings.out_dir, &filename, &jpeg)
            .await
            .map_err(ItemError::Storage)?;
        if saved.replaced {
            warn!(
                "{word:?} overwrote an existing {}, another word shares its file name",
                saved.path.display()
            );
        }

        let cdn_url = match &self.cdn {
            Some(cdn) => match cdn.upload(&filename, &jpeg).await {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!("Keeping {word:?} local only: {err}");
                    None
                }
            },
            None => None,
        };

        Ok(GeneratedImage {
            description,
            path: saved.path,
            replaced_existing: saved.replaced,
            cdn_url,
        })
    }

    /// Generates every word of `words` that the ledger does not know yet.
    ///
    /// Failures are logged and counted; they never stop the run.
    pub async fn run_batch(&self, words: &[WordItem], ledger: &mut Ledger) -> BatchReport {
        let started = Instant::now();
        let mut queued = HashSet::new();
        let pending: Vec<&WordItem> = words
            .iter()
            .filter(|item| !ledger.contains(&item.id) && queued.insert(item.id.as_str()))
            .collect();

        info!(
            "{} words, {} already generated, {} to go",
            words.len(),
            words.iter().filter(|item| ledger.contains(&item.id)).count(),
            pending.len()
        );
        if pending.is_empty() {
            info!("Nothing to generate");
            return BatchReport {
                elapsed: started.elapsed(),
                ..BatchReport::default()
            };
        }

        info!(
            "Estimated cost ${:.2}, estimated time {:.0} minutes",
            pending.len() as f64 * COST_PER_IMAGE_USD,
            (pending.len() as u64 * ESTIMATED_SECONDS_PER_IMAGE) as f64 / 60.0
        );

        let mut report = BatchReport {
            total: pending.len(),
            ..BatchReport::default()
        };

        for (index, item) in pending.iter().enumerate() {
            info!(
                "[{}/{}] {} ({})",
                index + 1,
                pending.len(),
                item.word,
                item.category
            );

            match self.generate_and_record(item, ledger).await {
                Ok(path) => {
                    report.succeeded += 1;
                    info!("Saved {}", path.display());
                }
                Err(err) => {
                    if matches!(err, ItemError::TimedOut) {
                        report.timed_out += 1;
                    }
                    report.failed += 1;
                    error!("Failed {:?} (id {}): {err}", item.word, item.id);
                }
            }

            let done = index + 1;
            if done % PROGRESS_EVERY == 0 {
                log_progress(done, pending.len(), started.elapsed());
            }
            if done < pending.len() && !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Done: {} succeeded, {} failed ({} timed out) in {:.1} minutes, {:.1} images/minute",
            report.succeeded,
            report.failed,
            report.timed_out,
            report.elapsed.as_secs_f64() / 60.0,
            report.throughput_per_minute()
        );
        report
    }

    async fn generate_and_record(
        &self,
        item: &WordItem,
        ledger: &mut Ledger,
    ) -> Result<PathBuf, ItemError> {
        let image = self.generate_one(&item.word, &item.category, &item.id).await?;
        let record = GenerationRecord {
            word: item.word.clone(),
            category: item.category.clone(),
            path: image.path.display().to_string(),
            cdn_url: image.cdn_url,
            generated_at: Some(Utc::now()),
        };
        ledger
            .record(&item.id, record)
            .await
            .map_err(ItemError::Ledger)?;
        Ok(image.path)
    }

    /// Runs the sample words end to end without touching the ledger.
    pub async fn run_samples(&self, samples: &[(&str, &str)]) -> BatchReport {
        let started = Instant::now();
        let mut report = BatchReport {
            total: samples.len(),
            ..BatchReport::default()
        };

        for (index, (word, category)) in samples.iter().enumerate() {
            info!("Testing {word:?} ({category})");
            match self.generate_one(word, category, &format!("sample-{index}")).await {
                Ok(image) => {
                    report.succeeded += 1;
                    info!("Saved {}", image.path.display());
                    if let Some(url) = image.cdn_url {
                        info!("Uploaded to {url}");
                    }
                }
                Err(err) => {
                    if matches!(err, ItemError::TimedOut) {
                        report.timed_out += 1;
                    }
                    report.failed += 1;
                    error!("Failed {word:?}: {err}");
                }
            }
        }

        report.elapsed = started.elapsed();
        report
    }
}

fn log_progress(done: usize, total: usize, elapsed: Duration) {
    let minutes = elapsed.as_secs_f64() / 60.0;
    let rate = if minutes > 0.0 {
        done as f64 / minutes
    } else {
        0.0
    };
    let remaining = if rate > 0.0 {
        (total - done) as f64 / rate
    } else {
        0.0
    };
    info!("Progress {done}/{total}: {rate:.1}/minute, about {remaining:.0} minutes left");
}
