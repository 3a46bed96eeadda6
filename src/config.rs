//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::batch::PipelineSettings;
use crate::cli::CliOptions;
use crate::descriptions::gemini::RetryPolicy;
use crate::image_job::PollSettings;
use crate::storage::CdnSettings;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Pipeline settings from the command line.
pub fn pipeline_settings(cli: &CliOptions) -> PipelineSettings {
    PipelineSettings {
        out_dir: cli.out_dir.clone(),
        item_delay: Duration::from_secs(cli.item_delay_secs),
        poll: PollSettings::default(),
    }
}

/// Retry policy for description generation.
pub fn retry_policy() -> RetryPolicy {
    RetryPolicy::default()
}

/// CDN settings, when a storage key is configured.
///
/// A key without a zone or public URL is a configuration error.
pub fn cdn_settings(cli: &CliOptions) -> Result<Option<CdnSettings>, String> {
    let Some(access_key) = cli.bunny_api_key.clone() else {
        return Ok(None);
    };
    let zone = cli
        .bunny_storage_zone
        .as_deref()
        .ok_or("BUNNY_API_KEY is set but BUNNY_STORAGE_ZONE is not")?;
    let public_base_url = cli
        .bunny_cdn_url
        .clone()
        .ok_or("BUNNY_API_KEY is set but BUNNY_CDN_URL is not")?;

    let storage_url = storage_url(&cli.bunny_storage_host, zone, &cli.bunny_storage_path)?;
    Ok(Some(CdnSettings {
        storage_url,
        access_key,
        public_base_url,
    }))
}

/// `https://<host>/<zone><path>/`, ending in a slash so file names join under it.
fn storage_url(host: &str, zone: &str, path: &str) -> Result<Url, String> {
    let path = path.trim_matches('/');
    let raw = if path.is_empty() {
        format!("https://{host}/{zone}/")
    } else {
        format!("https://{host}/{zone}/{path}/")
    };
    Url::parse(&raw).map_err(|err| format!("invalid CDN storage URL {raw:?}: {err}"))
}
