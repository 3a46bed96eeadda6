use std::path::Path;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;
use wordpix::batch::{Pipeline, SAMPLE_WORDS};
use wordpix::cli::{CliOptions, Command};
use wordpix::config::{cdn_settings, pipeline_settings, retry_policy, setup_logging};
use wordpix::constants::USER_AGENT;
use wordpix::descriptions::DescriptionProvider;
use wordpix::descriptions::gemini::GeminiClient;
use wordpix::descriptions::tables;
use wordpix::image_job::FalClient;
use wordpix::ledger::Ledger;
use wordpix::storage::CdnUploader;
use wordpix::words;

#[tokio::main]
async fn main() {
    let cli = CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        std::process::exit(1);
    }

    if let Err(err) = run(cli).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: CliOptions) -> Result<()> {
    match cli.command.clone() {
        Command::Clean { input, output } => clean(&input, &output),
        Command::Generate { limit, category } => {
            let pipeline = build_pipeline(&cli)?;

            let words = words::load_words(&cli.words_file)
                .with_context(|| format!("Failed to load {}", cli.words_file.display()))?;
            let words = words::select(words, category.as_deref(), limit);
            let mut ledger = Ledger::load(&cli.ledger_file)
                .with_context(|| format!("Failed to load {}", cli.ledger_file.display()))?;
            info!(
                "Loaded {} words and {} ledger entries",
                words.len(),
                ledger.len()
            );

            let report = pipeline.run_batch(&words, &mut ledger).await;
            if report.failed > 0 {
                warn!(
                    "{} words failed and will be retried on the next run",
                    report.failed
                );
            }
            Ok(())
        }
        Command::Test => {
            let pipeline = build_pipeline(&cli)?;
            let report = pipeline.run_samples(&SAMPLE_WORDS).await;
            info!(
                "Test run: {}/{} succeeded, images in {}",
                report.succeeded,
                report.total,
                pipeline.out_dir().display()
            );
            Ok(())
        }
    }
}

fn build_pipeline(cli: &CliOptions) -> Result<Pipeline<GeminiClient, FalClient>> {
    let fal_key = cli
        .fal_key
        .clone()
        .ok_or_else(|| anyhow!("FAL_KEY is required to generate images"))?;

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT.as_str())
        .build()
        .context("Failed to build HTTP client")?;

    let tables = tables::init().context("Failed to load description tables")?;

    let generator = match &cli.gemini_api_key {
        Some(key) => {
            let endpoint = Url::parse(&cli.gemini_url)
                .with_context(|| format!("Invalid text generation URL {:?}", cli.gemini_url))?;
            Some(GeminiClient::new(http.clone(), endpoint, key.clone()))
        }
        None => {
            warn!("GEMINI_API_KEY not set, descriptions come from the tables and templates only");
            None
        }
    };

    let submit_url = Url::parse(&cli.fal_url)
        .with_context(|| format!("Invalid image generation URL {:?}", cli.fal_url))?;
    let images = FalClient::new(http.clone(), submit_url, fal_key);

    let cdn = cdn_settings(cli)
        .map_err(|err| anyhow!(err))?
        .map(|settings| CdnUploader::new(http, settings));
    if cdn.is_none() {
        info!("CDN upload disabled, images are kept locally");
    }

    Ok(Pipeline::new(
        DescriptionProvider::new(tables, generator, retry_policy()),
        images,
        cdn,
        pipeline_settings(cli),
    ))
}

fn clean(input: &Path, output: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let rows = words::parse_csv(&raw);
    let total = rows.len();

    let abstract_words = words::non_visualizable().context("Failed to load word filters")?;
    let report = words::clean_words(rows, abstract_words);

    std::fs::write(output, words::to_csv(&report.kept))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Kept {} of {} words ({} duplicates, {} not visualisable)",
        report.kept.len(),
        total,
        report.duplicates,
        report.abstract_words
    );
    for (category, count) in report.per_category() {
        info!("  {category}: {count}");
    }
    Ok(())
}
