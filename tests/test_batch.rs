use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use wordpix::batch::{Pipeline, PipelineSettings, SAMPLE_WORDS};
use wordpix::descriptions::DescriptionProvider;
use wordpix::descriptions::gemini::{RetryPolicy, TextGenerator};
use wordpix::descriptions::tables;
use wordpix::error::{ImageJobError, TextGenError};
use wordpix::image_job::{ImageService, JobHandle, JobStatus, PollSettings};
use wordpix::ledger::{GenerationRecord, Ledger};
use wordpix::words::WordItem;

fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        8,
        8,
        image::Rgba([30, 120, 200, 255]),
    ));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

#[derive(Default)]
struct CountingText {
    calls: AtomicU32,
}

impl TextGenerator for CountingText {
    async fn generate(&self, _prompt: &str) -> Result<String, TextGenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("a plain test subject".to_string())
    }
}

#[derive(Default)]
struct FakeImages {
    submits: AtomicU32,
    polls: AtomicU32,
    downloads: AtomicU32,
    /// Submissions whose prompt contains this text are rejected
    reject_prompt_containing: Option<&'static str>,
    /// Jobs stay pending forever
    never_finish: bool,
}

impl ImageService for FakeImages {
    async fn submit(&self, prompt: &str) -> Result<JobHandle, ImageJobError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self
            .reject_prompt_containing
            .is_some_and(|needle| prompt.contains(needle))
        {
            return Err(ImageJobError::Status {
                stage: "submit",
                status: 422,
                body: "rejected".to_string(),
            });
        }
        Ok(JobHandle {
            request_id: None,
            polling_url: "https://images.test/requests/1".to_string(),
        })
    }

    async fn poll(&self, _job: &JobHandle) -> Result<JobStatus, ImageJobError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.never_finish {
            Ok(JobStatus::Pending)
        } else {
            Ok(JobStatus::Succeeded("https://images.test/files/1.png".to_string()))
        }
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, ImageJobError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(png_bytes())
    }
}

fn settings(out_dir: &Path) -> PipelineSettings {
    PipelineSettings {
        out_dir: out_dir.to_path_buf(),
        item_delay: Duration::ZERO,
        poll: PollSettings {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(50),
        },
    }
}

fn fake_pipeline(out_dir: &Path, images: FakeImages) -> Pipeline<CountingText, FakeImages> {
    let tables = tables::init().expect("bundled tables");
    let descriptions = DescriptionProvider::new(
        tables,
        Some(CountingText::default()),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        },
    );
    Pipeline::new(descriptions, images, None, settings(out_dir))
}

fn word(id: &str, word: &str) -> WordItem {
    WordItem {
        id: id.to_string(),
        word: word.to_string(),
        category: "general".to_string(),
        level: "A1".to_string(),
    }
}

#[tokio::test]
async fn finished_words_are_not_regenerated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger_path = dir.path().join("generated-images.json");
    let mut ledger = Ledger::load(&ledger_path).expect("load");
    for (id, name) in [("1", "tent"), ("2", "cabin")] {
        ledger
            .record(
                id,
                GenerationRecord {
                    word: name.to_string(),
                    category: "general".to_string(),
                    path: format!("generated-images/{name}.jpg"),
                    cdn_url: None,
                    generated_at: None,
                },
            )
            .await
            .expect("seed ledger");
    }
    let before = std::fs::read(&ledger_path).expect("read ledger");

    let pipeline = fake_pipeline(&dir.path().join("images"), FakeImages::default());
    let report = pipeline
        .run_batch(&[word("1", "tent"), word("2", "cabin")], &mut ledger)
        .await;

    assert_eq!(report.total, 0);
    assert_eq!(report.succeeded, 0);
    assert_eq!(pipeline.images().submits.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.images().downloads.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(&ledger_path).expect("read ledger"), before);
    assert!(!dir.path().join("images").exists());
}

#[tokio::test]
async fn one_failure_does_not_stop_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = dir.path().join("images");
    let ledger_path = dir.path().join("generated-images.json");
    let mut ledger = Ledger::load(&ledger_path).expect("load");
    let words = [word("1", "tent"), word("2", "zeppelin"), word("3", "Ferry Boat")];

    let failing = FakeImages {
        reject_prompt_containing: Some("zeppelin"),
        ..FakeImages::default()
    };
    let report = fake_pipeline(&out_dir, failing).run_batch(&words, &mut ledger).await;

    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.timed_out, 0);
    assert!(ledger.contains("1"));
    assert!(!ledger.contains("2"));
    assert!(ledger.contains("3"));

    let saved = std::fs::read(out_dir.join("ferry-boat.jpg")).expect("saved image");
    assert_eq!(&saved[..2], &[0xFF, 0xD8]);
    let record = ledger.get("3").expect("record");
    assert_eq!(record.word, "Ferry Boat");
    assert!(record.generated_at.is_some());

    // a later run only picks up the failed word
    let pipeline = fake_pipeline(&out_dir, FakeImages::default());
    let report = pipeline.run_batch(&words, &mut ledger).await;
    assert_eq!(report.total, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(pipeline.images().submits.load(Ordering::SeqCst), 1);
    assert_eq!(Ledger::load(&ledger_path).expect("reload").len(), 3);
}

#[tokio::test]
async fn timeouts_are_counted_and_retried_later() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ledger = Ledger::load(dir.path().join("generated-images.json")).expect("load");
    let stuck = FakeImages {
        never_finish: true,
        ..FakeImages::default()
    };
    let pipeline = fake_pipeline(&dir.path().join("images"), stuck);

    let report = pipeline.run_batch(&[word("1", "tent")], &mut ledger).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.timed_out, 1);
    assert!(ledger.is_empty());
    assert!(pipeline.images().polls.load(Ordering::SeqCst) >= 2);
    assert_eq!(pipeline.images().downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_ids_run_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ledger = Ledger::load(dir.path().join("generated-images.json")).expect("load");
    let pipeline = fake_pipeline(&dir.path().join("images"), FakeImages::default());

    let report = pipeline
        .run_batch(&[word("1", "tent"), word("1", "tent")], &mut ledger)
        .await;
    assert_eq!(report.total, 1);
    assert_eq!(pipeline.images().submits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unwritable_ledger_fails_the_item() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = dir.path().join("state");
    let mut ledger = Ledger::load(state.join("generated-images.json")).expect("load");
    std::fs::write(&state, b"not a directory").expect("write blocker");

    let pipeline = fake_pipeline(&dir.path().join("images"), FakeImages::default());
    let report = pipeline
        .run_batch(&[word("1", "tent"), word("2", "cabin")], &mut ledger)
        .await;

    assert_eq!(report.total, 2);
    assert_eq!(report.failed, 2);
    assert!(ledger.is_empty());
    // the images themselves were still produced
    assert_eq!(pipeline.images().downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn samples_skip_the_ledger() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = dir.path().join("images");
    let pipeline = fake_pipeline(&out_dir, FakeImages::default());

    let report = pipeline.run_samples(&SAMPLE_WORDS).await;
    assert_eq!(report.total, SAMPLE_WORDS.len());
    assert_eq!(report.succeeded, SAMPLE_WORDS.len());
    for (sample, _) in SAMPLE_WORDS {
        assert!(out_dir.join(format!("{sample}.jpg")).exists(), "{sample}");
    }
    assert!(!dir.path().join("generated-images.json").exists());
}

#[tokio::test]
async fn description_reaches_the_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = fake_pipeline(&dir.path().join("images"), FakeImages::default());

    let (description, prompt) = pipeline.describe("doctor", "health").await;
    assert_eq!(description, "a friendly doctor person in white coat with stethoscope");
    assert!(prompt.contains(&description));

    let (description, prompt) = pipeline.describe("kite", "sports_hobbies").await;
    assert_eq!(description, "a plain test subject");
    assert!(prompt.starts_with("A kite sport or hobby"));
    assert!(prompt.ends_with("Subject details: a plain test subject"));
}

#[tokio::test]
async fn shared_file_name_is_flagged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = fake_pipeline(&dir.path().join("images"), FakeImages::default());

    let first = pipeline
        .generate_one("Iron", "everyday_objects", "10")
        .await
        .expect("first iron");
    let second = pipeline
        .generate_one("iron", "sports_hobbies", "11")
        .await
        .expect("second iron");

    assert!(!first.replaced_existing);
    assert!(second.replaced_existing);
    assert_eq!(first.path, second.path);
}
