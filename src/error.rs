//! Error handling

use std::fmt;

/// Failures of a single text generation call.
#[derive(Debug)]
pub enum TextGenError {
    /// The service answered 429; the caller may back off and retry.
    RateLimited,
    /// Any other non-success HTTP status.
    Status(u16, String),
    /// The request never completed (connect, timeout, body read).
    Transport(String),
    /// The response body was not the expected JSON.
    Parse(String),
    /// A successful response without usable candidate text.
    NoCandidates,
}

impl fmt::Display for TextGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "text generation rate limited"),
            Self::Status(status, body) => write!(f, "text generation error {status}: {body}"),
            Self::Transport(err) => write!(f, "text generation request failed: {err}"),
            Self::Parse(err) => write!(f, "failed to parse text generation response: {err}"),
            Self::NoCandidates => write!(f, "text generation returned no candidates"),
        }
    }
}

impl std::error::Error for TextGenError {}

impl From<reqwest::Error> for TextGenError {
    fn from(err: reqwest::Error) -> Self {
        TextGenError::Transport(err.to_string())
    }
}

/// Failures talking to the image generation service.
#[derive(Debug)]
pub enum ImageJobError {
    /// Non-success HTTP status at the given stage (`submit`, `poll`, `download`).
    Status {
        /// Which call failed
        stage: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, for the logs
        body: String,
    },
    /// The request never completed.
    Transport(String),
    /// The response body was not the expected JSON.
    Parse(String),
    /// The submission response did not say where to poll.
    MissingPollingUrl,
    /// A `data:` image URL that could not be decoded.
    InvalidDataUrl(String),
}

impl fmt::Display for ImageJobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status {
                stage,
                status,
                body,
            } => write!(f, "image service {stage} error {status}: {body}"),
            Self::Transport(err) => write!(f, "image service request failed: {err}"),
            Self::Parse(err) => write!(f, "failed to parse image service response: {err}"),
            Self::MissingPollingUrl => write!(f, "image service did not return a response_url"),
            Self::InvalidDataUrl(err) => write!(f, "invalid data URL: {err}"),
        }
    }
}

impl std::error::Error for ImageJobError {}

impl From<reqwest::Error> for ImageJobError {
    fn from(err: reqwest::Error) -> Self {
        ImageJobError::Transport(err.to_string())
    }
}

/// Failures persisting an image locally or on the CDN.
#[derive(Debug)]
pub enum StorageError {
    /// Creating the output directory or writing the file failed.
    Io(std::io::Error),
    /// The downloaded bytes are not a decodable image.
    Image(String),
    /// The CDN upload failed.
    Upload(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to write image: {err}"),
            Self::Image(err) => write!(f, "invalid image data: {err}"),
            Self::Upload(err) => write!(f, "CDN upload failed: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<image::ImageError> for StorageError {
    fn from(err: image::ImageError) -> Self {
        StorageError::Image(err.to_string())
    }
}

/// Failures reading or rewriting the ledger.
#[derive(Debug)]
pub enum LedgerError {
    /// Filesystem failure.
    Io(std::io::Error),
    /// The ledger file is not valid JSON.
    Parse(serde_json::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "ledger I/O error: {err}"),
            Self::Parse(err) => write!(f, "failed to parse ledger: {err}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err)
    }
}

impl From<tempfile::PersistError> for LedgerError {
    fn from(err: tempfile::PersistError) -> Self {
        LedgerError::Io(err.error)
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Parse(err)
    }
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(err: tokio::task::JoinError) -> Self {
        LedgerError::Io(std::io::Error::other(err))
    }
}

/// Failures loading or cleaning a word list.
#[derive(Debug)]
pub enum WordListError {
    /// Filesystem failure.
    Io(std::io::Error),
    /// The word list (or bundled word data) is not valid JSON.
    Parse(serde_json::Error),
}

impl fmt::Display for WordListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "word list I/O error: {err}"),
            Self::Parse(err) => write!(f, "failed to parse word list: {err}"),
        }
    }
}

impl std::error::Error for WordListError {}

impl From<std::io::Error> for WordListError {
    fn from(err: std::io::Error) -> Self {
        WordListError::Io(err)
    }
}

impl From<serde_json::Error> for WordListError {
    fn from(err: serde_json::Error) -> Self {
        WordListError::Parse(err)
    }
}
