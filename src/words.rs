//! Word lists: the JSON input of the image pipeline, and the CSV cleaner
//! that prepares them.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CATEGORY;
use crate::error::WordListError;

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// One word to illustrate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordItem {
    /// Stable id, the ledger key
    pub id: String,
    /// The English word
    #[serde(rename = "word_en")]
    pub word: String,
    /// Display category
    #[serde(default = "default_category")]
    pub category: String,
    /// Difficulty level
    #[serde(default)]
    pub level: String,
}

/// Reads the JSON word list.
pub fn load_words(path: &Path) -> Result<Vec<WordItem>, WordListError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Keeps words of one category (if given), then the first `limit` of them.
pub fn select(words: Vec<WordItem>, category: Option<&str>, limit: Option<usize>) -> Vec<WordItem> {
    words
        .into_iter()
        .filter(|item| category.is_none_or(|category| item.category == category))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// A row of the raw `word,category,level` CSV.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawWord {
    /// The word
    pub word: String,
    /// Its category
    pub category: String,
    /// Its level
    pub level: String,
}

/// Parses `word,category,level` lines. Short and blank lines are skipped.
pub fn parse_csv(text: &str) -> Vec<RawWord> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.split(',').map(str::trim);
            let word = parts.next()?;
            let category = parts.next()?;
            let level = parts.next()?;
            Some(RawWord {
                word: word.to_string(),
                category: category.to_string(),
                level: level.to_string(),
            })
        })
        .collect()
}

/// Renders rows back into the CSV format.
pub fn to_csv(words: &[RawWord]) -> String {
    words
        .iter()
        .map(|row| format!("{},{},{}\n", row.word, row.category, row.level))
        .collect()
}

static NON_VISUALIZABLE: OnceLock<HashSet<String>> = OnceLock::new();

/// Words that cannot be shown as a single picture.
pub fn non_visualizable() -> Result<&'static HashSet<String>, WordListError> {
    if let Some(words) = NON_VISUALIZABLE.get() {
        return Ok(words);
    }
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/non_visualizable.json"));
    let parsed: Vec<String> = serde_json::from_str(raw)?;
    let words = parsed.into_iter().map(|word| word.to_lowercase()).collect();
    Ok(NON_VISUALIZABLE.get_or_init(|| words))
}

/// Outcome of cleaning a raw list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Rows that survived, in input order
    pub kept: Vec<RawWord>,
    /// Rows dropped as repeated (word, category) pairs
    pub duplicates: usize,
    /// Rows dropped as not visualisable
    pub abstract_words: usize,
}

impl CleanReport {
    /// Kept rows per category.
    pub fn per_category(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.kept {
            *counts.entry(row.category.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Drops repeated (word, category) pairs and words in `abstract_words`.
pub fn clean_words(words: Vec<RawWord>, abstract_words: &HashSet<String>) -> CleanReport {
    let mut seen = HashSet::new();
    let mut report = CleanReport::default();

    for row in words {
        let word = row.word.to_lowercase();
        let key = (word.clone(), row.category.to_lowercase());
        if seen.contains(&key) {
            report.duplicates += 1;
            continue;
        }
        if abstract_words.contains(&word) {
            report.abstract_words += 1;
            continue;
        }
        seen.insert(key);
        report.kept.push(row);
    }
    report
}
