//! Shared constants/defaults for the pipeline
//!

use std::sync::LazyLock;
use std::time::Duration;

/// Default word list, as written by the word extraction step.
pub const DEFAULT_WORDS_FILE: &str = "words-for-images.json";

/// Default resumability ledger.
pub const DEFAULT_LEDGER_FILE: &str = "generated-images.json";

/// The default place we put images
pub const DEFAULT_OUT_DIR: &str = "generated-images";

/// Extension used for every saved image; images are normalised to JPEG.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Text generation endpoint (Gemini `generateContent`).
pub const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Image generation queue endpoint (fal.ai flux schnell).
pub const FAL_QUEUE_URL: &str = "https://queue.fal.run/fal-ai/flux/schnell";

/// Bunny storage API host.
pub const BUNNY_STORAGE_HOST: &str = "storage.bunnycdn.com";

/// Folder inside the storage zone that holds word images.
pub const BUNNY_STORAGE_PATH: &str = "/words";

/// Seconds to wait between items.
pub const ITEM_DELAY_SECONDS: u64 = 3;

/// Base delay for text generation rate-limit backoff, multiplied by the attempt number.
pub const TEXT_RETRY_BASE_DELAY_SECONDS: u64 = 10;

/// Maximum number of text generation calls per word.
pub const TEXT_MAX_ATTEMPTS: u32 = 5;

/// Sampling temperature for description generation.
pub const TEXT_TEMPERATURE: f64 = 0.3;

/// Output token cap for description generation.
pub const TEXT_MAX_OUTPUT_TOKENS: u32 = 200;

/// Timeout for a single text generation request.
pub const TEXT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for submitting an image job.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between image job status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Ceiling on the total time spent waiting for one image job.
pub const POLL_MAX_WAIT: Duration = Duration::from_secs(120);

/// Timeout for a single status poll request.
pub const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for downloading a finished image.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a CDN upload.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Log a throughput line every this many items.
pub const PROGRESS_EVERY: usize = 50;

/// Rough price of one generated image, used for the pre-run estimate.
pub const COST_PER_IMAGE_USD: f64 = 0.003;

/// Rough wall time of one item, used for the pre-run estimate.
pub const ESTIMATED_SECONDS_PER_IMAGE: u64 = 5;

/// Category used when a word list entry has none.
pub const DEFAULT_CATEGORY: &str = "general";

/// User agent sent with every outbound request.
pub static USER_AGENT: LazyLock<String> =
    LazyLock::new(|| format!("wordpix/{}", env!("CARGO_PKG_VERSION")));
