//! Description generation through the Gemini `generateContent` API.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::constants::{
    TEXT_MAX_ATTEMPTS, TEXT_MAX_OUTPUT_TOKENS, TEXT_REQUEST_TIMEOUT, TEXT_RETRY_BASE_DELAY_SECONDS,
    TEXT_TEMPERATURE,
};
use crate::error::TextGenError;

/// Something that turns an instruction prompt into text.
pub trait TextGenerator {
    /// Makes a single generation call; no retries.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, TextGenError>> + Send;
}

/// Backoff settings for rate-limited generation calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first one.
    pub max_attempts: u32,
    /// Delay after the first rate-limited call; later delays scale with the attempt number.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: TEXT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(TEXT_RETRY_BASE_DELAY_SECONDS),
        }
    }
}

/// Calls the generator, backing off and retrying only while it is rate limited.
///
/// Any other failure is returned straight away.
pub async fn generate_with_retry<G: TextGenerator>(
    generator: &G,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String, TextGenError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match generator.generate(prompt).await {
            Err(TextGenError::RateLimited) if attempt < max_attempts => {
                let delay = policy.base_delay * attempt;
                warn!(
                    "Text generation rate limited (attempt {attempt}/{max_attempts}), retrying in {:.1}s",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Builds the instruction prompt asking for a short visual description.
pub fn description_prompt(word: &str, category: &str) -> String {
    format!(
        r#"You create educational illustrations for a vocabulary app. Users must understand the word INSTANTLY from the image.

Word: "{word}"
Category: "{category}"

VISUALIZATION TYPES - Choose the right one:

1. PLACE/LOCATION (city, beach, airport, office, park):
   - MUST show buildings, landscape, or environment
   - "city" = skyline with tall buildings, NOT a car
   - "beach" = sand, ocean, palm trees
   - "park" = trees, grass, benches, paths

2. OBJECT (phone, pizza, car, book):
   - Show ONLY the object, large and centered
   - NO people needed

3. PERSON TYPE (doctor, tourist, chef, teacher):
   - Show that person with their defining outfit/uniform/tools

4. INTERACTION/SHARING (share, help, give, teach, talk):
   - MUST show 2+ people interacting together
   - "share" = two people sharing something between them
   - "help" = one person helping another
   - "give" = one person giving something to another

5. EVENT/RELATIONSHIP (wedding, meeting, party, date):
   - Show the SCENE with multiple people
   - "wedding" = bride and groom together

6. ACTION (run, eat, sleep, jump):
   - Show a person doing that action clearly

7. EMOTION (happy, sad, angry):
   - Show a large expressive face with that emotion

Rules:
- Make meaning OBVIOUS - a child should understand instantly
- Be SPECIFIC about visual elements
- Places MUST show environment/buildings
- Interactions MUST show multiple people

Reply with ONLY visual description (max 25 words).

Examples:
- "city": Skyline view with tall buildings, skyscrapers, and urban landscape
- "share": Two children sharing a cookie, one handing half to the other
- "help": One person reaching out hand to help another person stand up
- "beach": Sandy beach with blue ocean waves, palm trees, and sunny sky
- "wedding": Bride in white dress and groom in suit at altar with flowers
- "doctor": Friendly doctor in white coat with stethoscope around neck

Describe "{word}" ({category}):"#
    )
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, trimmed.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Gemini `generateContent` client.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiClient {
    /// Creates a client for the given model endpoint.
    pub fn new(http: reqwest::Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint,
            api_key: api_key.into(),
        }
    }

    async fn generate_content(&self, prompt: &str) -> Result<String, TextGenError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let req_body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": TEXT_TEMPERATURE,
                "maxOutputTokens": TEXT_MAX_OUTPUT_TOKENS
            }
        });

        let resp = self
            .http
            .post(url)
            .timeout(TEXT_REQUEST_TIMEOUT)
            .json(&req_body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TextGenError::RateLimited);
        }

        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(TextGenError::Status(
                status.as_u16(),
                String::from_utf8_lossy(&bytes).to_string(),
            ));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(|err| TextGenError::Parse(err.to_string()))?;
        let text = parsed.first_text().ok_or(TextGenError::NoCandidates)?;
        debug!("Gemini returned {} chars", text.len());
        Ok(text)
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        self.generate_content(prompt).await
    }
}
