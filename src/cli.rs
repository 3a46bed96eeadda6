//! CLI parser
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::{
    BUNNY_STORAGE_HOST, BUNNY_STORAGE_PATH, DEFAULT_LEDGER_FILE, DEFAULT_OUT_DIR,
    DEFAULT_WORDS_FILE, FAL_QUEUE_URL, GEMINI_API_URL, ITEM_DELAY_SECONDS,
};

#[derive(Parser, Debug)]
#[command(name = "wordpix", version)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, global = true, help = "Enable debug logging", env = "WORDPIX_DEBUG")]
    /// Enable debug logging. Env: WORDPIX_DEBUG
    pub debug: bool,

    #[clap(long, global = true, default_value = DEFAULT_WORDS_FILE, env = "WORDPIX_WORDS_FILE")]
    /// JSON word list, defaults to `words-for-images.json`.
    /// Env: WORDPIX_WORDS_FILE
    pub words_file: PathBuf,

    #[clap(long, global = true, default_value = DEFAULT_LEDGER_FILE, env = "WORDPIX_LEDGER_FILE")]
    /// Ledger of generated images, defaults to `generated-images.json`.
    /// Env: WORDPIX_LEDGER_FILE
    pub ledger_file: PathBuf,

    #[clap(long, global = true, default_value = DEFAULT_OUT_DIR, env = "WORDPIX_OUT_DIR")]
    /// Where images are written, defaults to `generated-images`.
    /// Env: WORDPIX_OUT_DIR
    pub out_dir: PathBuf,

    #[clap(long, global = true, default_value_t = ITEM_DELAY_SECONDS, env = "WORDPIX_ITEM_DELAY_SECS")]
    /// Seconds to pause between words.
    /// Env: WORDPIX_ITEM_DELAY_SECS
    pub item_delay_secs: u64,

    #[clap(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Text generation key. Without it descriptions come from the tables and templates only.
    /// Env: GEMINI_API_KEY
    pub gemini_api_key: Option<String>,

    #[clap(long, global = true, default_value = GEMINI_API_URL, env = "WORDPIX_GEMINI_URL")]
    /// Text generation endpoint.
    /// Env: WORDPIX_GEMINI_URL
    pub gemini_url: String,

    #[clap(long, global = true, env = "FAL_KEY", hide_env_values = true)]
    /// Image generation key, required to generate.
    /// Env: FAL_KEY
    pub fal_key: Option<String>,

    #[clap(long, global = true, default_value = FAL_QUEUE_URL, env = "WORDPIX_FAL_URL")]
    /// Image generation queue endpoint.
    /// Env: WORDPIX_FAL_URL
    pub fal_url: String,

    #[clap(long, global = true, env = "BUNNY_API_KEY", hide_env_values = true)]
    /// Storage zone key. Uploads are skipped without it.
    /// Env: BUNNY_API_KEY
    pub bunny_api_key: Option<String>,

    #[clap(long, global = true, env = "BUNNY_STORAGE_ZONE")]
    /// Storage zone name.
    /// Env: BUNNY_STORAGE_ZONE
    pub bunny_storage_zone: Option<String>,

    #[clap(long, global = true, env = "BUNNY_CDN_URL")]
    /// Public base URL of the storage zone, eg `https://words.b-cdn.net`.
    /// Env: BUNNY_CDN_URL
    pub bunny_cdn_url: Option<String>,

    #[clap(long, global = true, default_value = BUNNY_STORAGE_HOST, env = "BUNNY_STORAGE_HOST")]
    /// Storage API host.
    /// Env: BUNNY_STORAGE_HOST
    pub bunny_storage_host: String,

    #[clap(long, global = true, default_value = BUNNY_STORAGE_PATH, env = "BUNNY_STORAGE_PATH")]
    /// Folder inside the storage zone.
    /// Env: BUNNY_STORAGE_PATH
    pub bunny_storage_path: String,

    #[command(subcommand)]
    /// What to do
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
/// Subcommands
pub enum Command {
    /// Generate images for every word not in the ledger yet
    Generate {
        #[clap(long)]
        /// Only consider the first N words of the list
        limit: Option<usize>,
        #[clap(long)]
        /// Only consider words of this category
        category: Option<String>,
    },
    /// Run a few sample words end to end, without the ledger
    Test,
    /// Clean a raw `word,category,level` CSV
    Clean {
        /// Raw CSV to read
        input: PathBuf,
        /// Where to write the cleaned CSV
        output: PathBuf,
    },
}
