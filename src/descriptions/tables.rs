//! Hand-written visual descriptions loaded from bundled JSON files.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Errors returned when loading the description tables.
#[derive(Debug)]
pub enum TableError {
    /// A bundled table could not be parsed.
    Parse {
        /// Name of the table
        table: &'static str,
        /// Underlying JSON error
        source: serde_json::Error,
    },
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { table, source } => {
                write!(f, "Failed to parse description table {table}: {source}")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Normalises a word for table lookup: trimmed, lowercase, single spaces.
pub fn normalize_key(word: &str) -> String {
    word.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One immutable word -> description mapping.
#[derive(Clone, Debug, Default)]
pub struct DescriptionTable {
    name: &'static str,
    entries: HashMap<String, String>,
}

impl DescriptionTable {
    /// Parses a JSON object of `word: description` pairs.
    ///
    /// Keys are normalised, so differently spaced or cased spellings of the
    /// same word collapse to one entry (the later one wins).
    pub fn from_json(name: &'static str, raw: &str) -> Result<Self, TableError> {
        let parsed: BTreeMap<String, String> = serde_json::from_str(raw)
            .map_err(|source| TableError::Parse { table: name, source })?;
        Ok(Self::from_pairs(name, parsed))
    }

    /// Builds a table from in-memory pairs.
    pub fn from_pairs<K, V>(name: &'static str, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(word, description)| (normalize_key(word.as_ref()), description.into()))
            .collect();
        Self { name, entries }
    }

    /// Looks up a word, ignoring case and extra whitespace.
    pub fn get(&self, word: &str) -> Option<&str> {
        self.entries.get(&normalize_key(word)).map(String::as_str)
    }

    /// Table name, for logging.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All lookup tiers, in priority order.
#[derive(Clone, Debug, Default)]
pub struct DescriptionTables {
    /// Curated descriptions; authoritative for any word they contain.
    pub curated: DescriptionTable,
    /// Manual override tables, consulted in order after the curated one.
    pub manual: Vec<DescriptionTable>,
}

impl DescriptionTables {
    fn parse_bundled() -> Result<Self, TableError> {
        let curated = DescriptionTable::from_json(
            "curated",
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/curated_descriptions.json")),
        )?;
        let scenes = DescriptionTable::from_json(
            "scenes",
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/scene_descriptions.json")),
        )?;
        let objects = DescriptionTable::from_json(
            "objects",
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/object_descriptions.json")),
        )?;
        Ok(Self {
            curated,
            manual: vec![scenes, objects],
        })
    }

    /// Finds the first manual table entry for a word.
    pub fn manual(&self, word: &str) -> Option<&str> {
        self.manual.iter().find_map(|table| table.get(word))
    }
}

static TABLES: OnceLock<DescriptionTables> = OnceLock::new();

/// Parse the bundled description tables; called during startup.
pub fn init() -> Result<&'static DescriptionTables, TableError> {
    if let Some(tables) = TABLES.get() {
        return Ok(tables);
    }
    let parsed = DescriptionTables::parse_bundled()?;
    Ok(TABLES.get_or_init(|| parsed))
}
