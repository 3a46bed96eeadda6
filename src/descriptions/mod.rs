//! Resolving a word into a short visual description.
//!
//! Sources are tried in [`RESOLUTION_ORDER`] and the first one that produces
//! text wins. The last source is a template, so resolution always succeeds.

pub mod fallback;
pub mod gemini;
pub mod tables;

use tracing::{debug, warn};

use fallback::template_description;
use gemini::{RetryPolicy, TextGenerator, description_prompt, generate_with_retry};
use tables::DescriptionTables;

/// Where a description came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptionSource {
    /// The curated table, matched on the word alone.
    Curated,
    /// One of the manual override tables.
    Manual,
    /// The text generation service.
    Generated,
    /// The category template.
    Template,
}

/// Order in which sources are consulted.
pub const RESOLUTION_ORDER: [DescriptionSource; 4] = [
    DescriptionSource::Curated,
    DescriptionSource::Manual,
    DescriptionSource::Generated,
    DescriptionSource::Template,
];

/// A resolved description and its source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// The description text
    pub text: String,
    /// Which source produced it
    pub source: DescriptionSource,
}

/// Runs the resolution chain for words.
#[derive(Clone, Debug)]
pub struct DescriptionProvider<G> {
    tables: &'static DescriptionTables,
    generator: Option<G>,
    retry: RetryPolicy,
}

impl<G: TextGenerator> DescriptionProvider<G> {
    /// Creates a provider. Without a generator the `Generated` step is skipped.
    pub fn new(tables: &'static DescriptionTables, generator: Option<G>, retry: RetryPolicy) -> Self {
        Self {
            tables,
            generator,
            retry,
        }
    }

    /// Returns a usable description for the word; never fails.
    pub async fn resolve(&self, word: &str, category: &str) -> String {
        self.resolve_with_source(word, category).await.text
    }

    /// Like [`Self::resolve`], also reporting which source answered.
    pub async fn resolve_with_source(&self, word: &str, category: &str) -> Resolved {
        for source in RESOLUTION_ORDER {
            if let Some(text) = self.attempt(source, word, category).await {
                debug!("Description for {word:?} from {source:?}");
                return Resolved { text, source };
            }
        }
        Resolved {
            text: template_description(word, category),
            source: DescriptionSource::Template,
        }
    }

    async fn attempt(&self, source: DescriptionSource, word: &str, category: &str) -> Option<String> {
        match source {
            DescriptionSource::Curated => self.tables.curated.get(word).map(str::to_string),
            DescriptionSource::Manual => self.tables.manual(word).map(str::to_string),
            DescriptionSource::Generated => {
                let generator = self.generator.as_ref()?;
                let prompt = description_prompt(word, category);
                match generate_with_retry(generator, &prompt, &self.retry).await {
                    Ok(text) => Some(text),
                    Err(err) => {
                        warn!("Falling back to template for {word:?}: {err}");
                        None
                    }
                }
            }
            DescriptionSource::Template => {
                Some(template_description(word, category)).filter(|text| !text.trim().is_empty())
            }
        }
    }
}
