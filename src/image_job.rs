//! Queued image generation: submit a prompt, poll until done, download.

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::constants::{
    DOWNLOAD_TIMEOUT, POLL_INTERVAL, POLL_MAX_WAIT, POLL_REQUEST_TIMEOUT, SUBMIT_TIMEOUT,
};
use crate::error::ImageJobError;

/// A submitted job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobHandle {
    /// Service-side id, when the service returns one
    pub request_id: Option<String>,
    /// Where to poll for the result
    pub polling_url: String,
}

/// Result of one status poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or running.
    Pending,
    /// Finished, with the URL of the first image.
    Succeeded(String),
    /// The service reported a failure.
    Failed,
}

/// How waiting for a job ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AwaitOutcome {
    /// The image is ready at this URL.
    Ready(String),
    /// The service reported a failure.
    Failed,
    /// The wait ceiling was reached first.
    TimedOut,
}

/// Polling cadence and ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep between polls
    pub interval: Duration,
    /// Total time allowed for one job
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_wait: POLL_MAX_WAIT,
        }
    }
}

/// The operations the pipeline needs from an image service.
pub trait ImageService {
    /// Submits a prompt for one square image. Not retried.
    fn submit(&self, prompt: &str)
    -> impl Future<Output = Result<JobHandle, ImageJobError>> + Send;

    /// Checks a job once.
    fn poll(&self, job: &JobHandle) -> impl Future<Output = Result<JobStatus, ImageJobError>> + Send;

    /// Fetches the finished image. Not retried.
    fn download(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ImageJobError>> + Send;
}

/// Polls until the job succeeds, fails, or `max_wait` runs out.
///
/// Poll errors are treated as transient and retried at the normal interval.
pub async fn await_image<S: ImageService>(
    service: &S,
    job: &JobHandle,
    settings: &PollSettings,
) -> AwaitOutcome {
    let deadline = Instant::now() + settings.max_wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, service.poll(job)).await {
            Err(_) => return AwaitOutcome::TimedOut,
            Ok(Ok(JobStatus::Succeeded(url))) => return AwaitOutcome::Ready(url),
            Ok(Ok(JobStatus::Failed)) => return AwaitOutcome::Failed,
            Ok(Ok(JobStatus::Pending)) => {}
            Ok(Err(err)) => debug!("Poll of {} failed, will retry: {err}", job.polling_url),
        }

        if Instant::now() + settings.interval > deadline {
            return AwaitOutcome::TimedOut;
        }
        tokio::time::sleep(settings.interval).await;
    }
}

/// Decodes a `data:<mime>;base64,<payload>` URL.
///
/// Returns `None` when the URL is not a data URL at all.
pub fn decode_data_url(url: &str) -> Option<Result<Vec<u8>, ImageJobError>> {
    let rest = url.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some(Err(ImageJobError::InvalidDataUrl(
            "missing ',' separator".to_string(),
        )));
    };
    if !header.ends_with(";base64") {
        return Some(Err(ImageJobError::InvalidDataUrl(format!(
            "unsupported encoding in {header:?}"
        ))));
    }
    Some(
        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| ImageJobError::InvalidDataUrl(err.to_string())),
    )
}

/// Request body for a queued generation.
#[derive(Serialize, Debug)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    image_size: &'a str,
    num_images: u8,
}

#[derive(Deserialize, Debug)]
struct SubmitResponse {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PollResponse {
    #[serde(default)]
    images: Vec<ImageRef>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImageRef {
    #[serde(default)]
    url: Option<String>,
}

impl PollResponse {
    fn into_status(self) -> JobStatus {
        if let Some(url) = self
            .images
            .into_iter()
            .find_map(|image| image.url.filter(|url| !url.is_empty()))
        {
            return JobStatus::Succeeded(url);
        }
        match self.status.as_deref() {
            Some("FAILED") | Some("ERROR") => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

/// Client for the fal.ai queue API.
#[derive(Clone, Debug)]
pub struct FalClient {
    http: reqwest::Client,
    submit_url: Url,
    api_key: String,
    submit_timeout: Duration,
}

impl FalClient {
    /// Creates a client that submits to the given model queue URL.
    pub fn new(http: reqwest::Client, submit_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            http,
            submit_url,
            api_key: api_key.into(),
            submit_timeout: SUBMIT_TIMEOUT,
        }
    }

    /// Overrides how long a submission may take.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    async fn submit_prompt(&self, prompt: &str) -> Result<JobHandle, ImageJobError> {
        let req_body = SubmitRequest {
            prompt,
            image_size: "square",
            num_images: 1,
        };

        let resp = self
            .http
            .post(self.submit_url.clone())
            .header(AUTHORIZATION, self.auth_header())
            .timeout(self.submit_timeout)
            .json(&req_body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ImageJobError::Status {
                stage: "submit",
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }

        let parsed: SubmitResponse =
            serde_json::from_slice(&bytes).map_err(|err| ImageJobError::Parse(err.to_string()))?;
        let polling_url = parsed
            .response_url
            .filter(|url| !url.is_empty())
            .ok_or(ImageJobError::MissingPollingUrl)?;
        debug!(
            "Submitted image job {}",
            parsed.request_id.as_deref().unwrap_or("<no id>")
        );
        Ok(JobHandle {
            request_id: parsed.request_id,
            polling_url,
        })
    }

    async fn poll_job(&self, job: &JobHandle) -> Result<JobStatus, ImageJobError> {
        let resp = self
            .http
            .get(&job.polling_url)
            .header(AUTHORIZATION, self.auth_header())
            .timeout(POLL_REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ImageJobError::Status {
                stage: "poll",
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }

        let parsed: PollResponse =
            serde_json::from_slice(&bytes).map_err(|err| ImageJobError::Parse(err.to_string()))?;
        Ok(parsed.into_status())
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>, ImageJobError> {
        if let Some(decoded) = decode_data_url(url) {
            return decoded;
        }

        let resp = self.http.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ImageJobError::Status {
                stage: "download",
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).chars().take(200).collect(),
            });
        }
        Ok(bytes.to_vec())
    }
}

impl ImageService for FalClient {
    async fn submit(&self, prompt: &str) -> Result<JobHandle, ImageJobError> {
        self.submit_prompt(prompt).await
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ImageJobError> {
        self.poll_job(job).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageJobError> {
        self.download_image(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Returns the scripted statuses in order, then repeats the last one.
    struct Scripted {
        statuses: Mutex<Vec<Result<JobStatus, ImageJobError>>>,
        polls: AtomicU32,
    }

    impl Scripted {
        fn new(mut statuses: Vec<Result<JobStatus, ImageJobError>>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                polls: AtomicU32::new(0),
            }
        }
    }

    impl ImageService for Scripted {
        async fn submit(&self, _prompt: &str) -> Result<JobHandle, ImageJobError> {
            Ok(job())
        }

        async fn poll(&self, _job: &JobHandle) -> Result<JobStatus, ImageJobError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().expect("lock");
            if statuses.len() > 1 {
                statuses.pop().unwrap_or(Ok(JobStatus::Pending))
            } else {
                match statuses.last() {
                    Some(Ok(status)) => Ok(status.clone()),
                    Some(Err(_)) => Err(ImageJobError::Transport("still down".to_string())),
                    None => Ok(JobStatus::Pending),
                }
            }
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>, ImageJobError> {
            Ok(Vec::new())
        }
    }

    fn job() -> JobHandle {
        JobHandle {
            request_id: Some("req-1".to_string()),
            polling_url: "http://127.0.0.1:1/requests/req-1".to_string(),
        }
    }

    fn fast(max_wait_ms: u64) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(max_wait_ms),
        }
    }

    #[tokio::test]
    async fn ready_after_pending_and_transient_errors() {
        let service = Scripted::new(vec![
            Ok(JobStatus::Pending),
            Err(ImageJobError::Transport("reset".to_string())),
            Ok(JobStatus::Succeeded("https://cdn.example/1.jpg".to_string())),
        ]);
        let outcome = await_image(&service, &job(), &fast(5_000)).await;
        assert_eq!(outcome, AwaitOutcome::Ready("https://cdn.example/1.jpg".to_string()));
        assert_eq!(service.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn explicit_failure_returns_immediately() {
        let service = Scripted::new(vec![Ok(JobStatus::Pending), Ok(JobStatus::Failed)]);
        let outcome = await_image(&service, &job(), &fast(5_000)).await;
        assert_eq!(outcome, AwaitOutcome::Failed);
        assert_eq!(service.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn never_finishing_job_times_out() {
        let service = Scripted::new(vec![Ok(JobStatus::Pending)]);
        let started = std::time::Instant::now();
        let outcome = await_image(&service, &job(), &fast(60)).await;
        assert_eq!(outcome, AwaitOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(service.polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn persistent_poll_errors_time_out() {
        let service = Scripted::new(vec![Err(ImageJobError::Transport("down".to_string()))]);
        let outcome = await_image(&service, &job(), &fast(40)).await;
        assert_eq!(outcome, AwaitOutcome::TimedOut);
    }

    #[test]
    fn poll_response_states() {
        let done: PollResponse =
            serde_json::from_str(r#"{"images": [{"url": "https://x/a.jpg"}]}"#).expect("parse");
        assert_eq!(done.into_status(), JobStatus::Succeeded("https://x/a.jpg".to_string()));

        let queued: PollResponse = serde_json::from_str(r#"{"status": "IN_QUEUE"}"#).expect("parse");
        assert_eq!(queued.into_status(), JobStatus::Pending);

        let failed: PollResponse = serde_json::from_str(r#"{"status": "FAILED"}"#).expect("parse");
        assert_eq!(failed.into_status(), JobStatus::Failed);

        let empty: PollResponse = serde_json::from_str(r#"{"images": []}"#).expect("parse");
        assert_eq!(empty.into_status(), JobStatus::Pending);
    }

    #[test]
    fn data_urls_decode() {
        assert!(decode_data_url("https://example.com/a.jpg").is_none());
        let decoded = decode_data_url("data:image/jpeg;base64,/9j/2w==")
            .expect("is a data url")
            .expect("decodes");
        assert_eq!(decoded, vec![0xFF, 0xD8, 0xFF, 0xDB]);
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Some(Err(ImageJobError::InvalidDataUrl(_)))
        ));
    }
}
