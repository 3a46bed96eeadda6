//! Where generated images end up: a local folder and optionally the CDN.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::constants::{IMAGE_EXTENSION, UPLOAD_TIMEOUT};
use crate::error::StorageError;

#[allow(clippy::expect_used)]
static DISALLOWED_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid slug regex"));

#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Turns a word into a filesystem-safe name: `"Meeting Room"` -> `meeting-room`.
pub fn slugify(word: &str) -> String {
    let lowered = word.trim().to_lowercase();
    let stripped = DISALLOWED_SLUG_CHARS.replace_all(&lowered, "");
    WHITESPACE_RUN
        .replace_all(stripped.trim(), "-")
        .into_owned()
}

/// File name for a word's image. Falls back to `fallback` when the word has
/// no usable characters.
pub fn image_filename(word: &str, fallback: &str) -> String {
    let slug = match slugify(word) {
        slug if slug.is_empty() => slugify(fallback),
        slug => slug,
    };
    format!("{slug}.{IMAGE_EXTENSION}")
}

/// Re-encodes the image as JPEG unless it already is one.
pub fn normalize_to_jpeg(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    if bytes.len() < 4 {
        return Err(StorageError::Image("image is too short".to_string()));
    }

    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let image = reader.decode()?;

    if format == Some(image::ImageFormat::Jpeg) {
        return Ok(bytes.to_vec());
    }

    debug!("Converting {format:?} image to JPEG");
    let mut output = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, 90);
    encoder.encode_image(&image.to_rgb8())?;
    Ok(output)
}

/// A file written by [`save_image`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedFile {
    /// Where the file was written
    pub path: PathBuf,
    /// True when an existing file of the same name was overwritten
    pub replaced: bool,
}

/// Writes the image into `out_dir`, creating it if needed.
pub async fn save_image(
    out_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<SavedFile, StorageError> {
    tokio::fs::create_dir_all(out_dir).await?;
    let path = out_dir.join(filename);
    let replaced = tokio::fs::try_exists(&path).await?;
    tokio::fs::write(&path, bytes).await?;
    Ok(SavedFile { path, replaced })
}

/// Where and how to upload images to the CDN storage zone.
#[derive(Clone, Debug)]
pub struct CdnSettings {
    /// Storage API base, e.g. `https://storage.bunnycdn.com/<zone>/words/`
    pub storage_url: Url,
    /// Storage zone access key
    pub access_key: String,
    /// Public base URL the uploaded files are served from
    pub public_base_url: String,
}

/// Uploads finished images to the CDN storage zone.
#[derive(Clone, Debug)]
pub struct CdnUploader {
    http: reqwest::Client,
    settings: CdnSettings,
}

impl CdnUploader {
    /// Creates an uploader.
    pub fn new(http: reqwest::Client, settings: CdnSettings) -> Self {
        Self { http, settings }
    }

    /// Uploads one file and returns its public URL.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let target = self
            .settings
            .storage_url
            .join(filename)
            .map_err(|err| StorageError::Upload(err.to_string()))?;

        let resp = self
            .http
            .put(target)
            .header("AccessKey", &self.settings.access_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .timeout(UPLOAD_TIMEOUT)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| StorageError::Upload(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Upload(format!("status {status}: {body}")));
        }

        Ok(format!(
            "{}/{filename}",
            self.settings.public_base_url.trim_end_matches('/')
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(format: image::ImageFormat) -> Vec<u8> {
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            4,
            4,
            image::Rgba([200, 40, 40, 255]),
        ));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .expect("encode test image");
        bytes
    }

    fn png_bytes() -> Vec<u8> {
        encoded(image::ImageFormat::Png)
    }

    #[test]
    fn slugs_are_stable() {
        assert_eq!(slugify("Meeting Room"), "meeting-room");
        assert_eq!(slugify("Self-Catering!"), "self-catering");
        assert_eq!(slugify("  multi   space "), "multi-space");
        assert_eq!(slugify("first class"), "first-class");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
        assert_eq!(slugify("what ?"), "what");
    }

    #[test]
    fn slugify_is_idempotent() {
        for word in ["Meeting Room", "Self-Catering!", "  multi   space ", "a - b", "X\tY\nZ"] {
            let once = slugify(word);
            assert_eq!(slugify(&once), once, "{word:?}");
        }
    }

    #[test]
    fn filename_falls_back_when_slug_is_empty() {
        assert_eq!(image_filename("Meeting Room", "42"), "meeting-room.jpg");
        assert_eq!(image_filename("!!!", "word 42"), "word-42.jpg");
    }

    #[test]
    fn png_is_converted_to_jpeg() {
        let jpeg = normalize_to_jpeg(&png_bytes()).expect("convert");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(normalize_to_jpeg(&jpeg).expect("already jpeg"), jpeg);
    }

    #[test]
    fn webp_and_gif_are_converted_to_jpeg() {
        for format in [image::ImageFormat::WebP, image::ImageFormat::Gif] {
            let jpeg = normalize_to_jpeg(&encoded(format)).expect("convert");
            assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "{format:?}");
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize_to_jpeg(&[]).is_err());
        assert!(normalize_to_jpeg(b"This is not an image file.").is_err());
    }

    #[tokio::test]
    async fn save_creates_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("nested").join("images");
        let saved = save_image(&out_dir, "kite.jpg", b"bytes").await.expect("save");
        assert_eq!(saved.path, out_dir.join("kite.jpg"));
        assert!(!saved.replaced);
        assert_eq!(std::fs::read(&saved.path).expect("read back"), b"bytes");
    }

    #[tokio::test]
    async fn save_reports_replaced_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = save_image(dir.path(), "iron.jpg", b"first").await.expect("save");
        assert!(!first.replaced);
        let second = save_image(dir.path(), "iron.jpg", b"second").await.expect("save");
        assert!(second.replaced);
        assert_eq!(std::fs::read(&second.path).expect("read back"), b"second");
    }

    #[tokio::test]
    async fn save_into_a_file_path_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write blocker");
        let result = save_image(&blocker, "kite.jpg", b"bytes").await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
