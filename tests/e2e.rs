//! End-to-end integration tests for paper-digest.
//!
//! The first group runs offline: it builds small PDFs with lopdf, scans them
//! and renders slides from records on disk. No pdfium, no API key.
//!
//! The second group uses real PDF files in `./test_cases/`, the pdfium
//! library and live LLM API calls. It is gated behind the `E2E_ENABLED`
//! environment variable so it does not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse, LlmError, MockProvider};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use paper_digest::pipeline::document::PdfImageSource;
use paper_digest::pipeline::extract::{select_candidates, ImageFormat};
use paper_digest::record::{Bibliography, SummaryFields};
use paper_digest::{
    digest_path, digest_paths, inspect, make_all_slides, read_record, write_record, DigestConfig,
    DigestError, DigestProgressCallback, LlmConfig, PaperRecord, SelectionCriteria, SlideConfig,
    Summarizer,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Deterministic noise so neither zlib nor PNG can shrink the samples much.
fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as u8
        })
        .collect()
}

fn rgb_image(width: i64, height: i64, seed: u32, compress: bool) -> Stream {
    let samples = noise((width * height * 3) as usize, seed);
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    let content = if compress {
        dict.set("Filter", "FlateDecode");
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&samples).unwrap();
        enc.finish().unwrap()
    } else {
        samples
    };
    Stream::new(dict, content)
}

/// One page per entry; each page draws the listed image objects.
fn build_pdf(path: &Path, pages: &[&[(i64, i64, u32)]]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for images in pages {
        let mut xobjects = Dictionary::new();
        let mut ops = Vec::new();
        for (i, &(w, h, seed)) in images.iter().enumerate() {
            let id = doc.add_object(rgb_image(w, h, seed, i % 2 == 0));
            let name = format!("Im{i}");
            xobjects.set(name.as_bytes(), id);
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            ops.push(Operation::new("Q", vec![]));
        }
        let content = Content { operations: ops }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let resources_id = doc.add_object(dictionary! { "XObject" => xobjects });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Chat provider that fails its first `failures` calls, then replies `reply`.
struct ScriptedProvider {
    failures: usize,
    reply: String,
    calls: AtomicUsize,
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn max_context_length(&self) -> usize {
        4096
    }

    async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
        self.chat(&[], None).await
    }

    async fn complete_with_options(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.complete(prompt).await
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> edgequake_llm::Result<LLMResponse> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(LlmError::ApiError("upstream 503".into()));
        }
        Ok(LLMResponse::new(self.reply.clone(), "scripted-model"))
    }
}

/// Records every progress event as a short line.
#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl DigestProgressCallback for EventLog {
    fn on_batch_start(&self, total: usize) {
        self.push(format!("batch {total}"));
    }

    fn on_document_start(&self, index: usize, _total: usize, _path: &Path) {
        self.push(format!("start {index}"));
    }

    fn on_document_complete(&self, index: usize, _total: usize, _path: &Path, _images: usize) {
        self.push(format!("done {index}"));
    }

    fn on_document_error(&self, index: usize, _total: usize, _path: &Path, _error: &str) {
        self.push(format!("error {index}"));
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.push(format!("finished {success_count}/{total}"));
    }
}

fn has_record(root: &Path) -> bool {
    walk(root).iter().any(|p| p.ends_with("paper.json"))
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(walk(&path));
            }
            out.push(path);
        }
    }
    out
}

// ── Offline: image scan over a real PDF file ─────────────────────────────────

#[test]
fn scan_keeps_only_the_figure() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("paper.pdf");
    // 500×500 figure, 100×100 icon, 4000×100 rule.
    build_pdf(&pdf, &[&[(500, 500, 7), (100, 100, 8), (4000, 100, 9)]]);

    let criteria = SelectionCriteria {
        min_width: 400,
        min_height: 400,
        min_bytes: 20 * 1024,
        max_aspect_ratio: 8.0,
        max_count: 5,
    };
    let source = PdfImageSource::open(&pdf, None).unwrap();
    let (selected, report) = select_candidates(&source, &criteria);

    assert_eq!(selected.len(), 1);
    let fig = &selected[0];
    assert_eq!((fig.width, fig.height, fig.source_page), (500, 500, 1));
    assert_eq!(fig.format, ImageFormat::Png);
    assert_eq!(fig.components, 3);
    assert!(fig.bytes.len() > 20 * 1024);
    assert_eq!(report.distinct_resources, 3);
    assert_eq!(report.accepted, 1);
}

#[test]
fn scan_cap_favours_earlier_pages() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("paper.pdf");
    build_pdf(
        &pdf,
        &[&[(450, 450, 1)], &[(460, 460, 2)], &[(470, 470, 3)]],
    );

    let criteria = SelectionCriteria {
        max_count: 2,
        ..SelectionCriteria::default()
    };
    let source = PdfImageSource::open(&pdf, None).unwrap();
    let (selected, _) = select_candidates(&source, &criteria);

    let pages: Vec<usize> = selected.iter().map(|c| c.source_page).collect();
    assert_eq!(pages, vec![1, 2]);
    assert!(selected[0].file_name().starts_with("img01_"));
}

#[test]
fn open_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.pdf");
    std::fs::write(&bad, b"%PDF-1.4\nthis is not a pdf").unwrap();
    assert!(PdfImageSource::open(&bad, None).is_err());
}

// ── Offline: records and slides ──────────────────────────────────────────────

fn seed_record(root: &Path, id: &str, keywords: &str, with_big_image: bool) -> PaperRecord {
    let record_dir = root.join(id);
    let images = record_dir.join("images");
    std::fs::create_dir_all(&images).unwrap();
    RgbImage::new(200, 100).save(images.join("half.png")).unwrap();

    let mut listed = Vec::new();
    if with_big_image {
        let pixels = noise(400 * 300 * 3, 42);
        let img = RgbImage::from_raw(400, 300, pixels).unwrap();
        img.save(images.join("img02_00017.png")).unwrap();
        listed.push("images/img02_00017.png".to_string());
    }
    let small = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
    small.save(images.join("img03_00021.png")).unwrap();
    listed.push("images/img03_00021.png".to_string());

    let record = PaperRecord {
        bibliography: Bibliography {
            title: format!("Paper {id}"),
            authors: vec!["A. Author".into()],
            ..Bibliography::default()
        },
        summary: SummaryFields {
            title_localized: format!("論文 {id}"),
            keywords: keywords.into(),
            entry_id: id.into(),
            ..SummaryFields::default()
        },
        cover_image_path: "images/half.png".into(),
        images: listed,
        query: None,
    };
    write_record(&record, &record_dir).unwrap();
    record
}

#[test]
fn slides_for_every_record() {
    let root = TempDir::new().unwrap();
    seed_record(root.path(), "2401.00001", "Diffusion", true);
    seed_record(root.path(), "2401.00002", "Transformer", false);

    let written = make_all_slides(root.path(), &SlideConfig::default()).unwrap();
    assert_eq!(written.len(), 2);

    let first = std::fs::read_to_string(root.path().join("2401.00001/Paper_2401_000_output.md")).unwrap();
    assert!(first.contains("![width:1400](images/half.png)"));
    assert!(first.contains("![width:840](images/img02_00017.png)"));
    assert!(!first.contains("img03_00021"));

    let second = std::fs::read_to_string(root.path().join("2401.00002/Paper_2401_000_output.md")).unwrap();
    assert_eq!(second.matches("\n---\n").count(), 2);
}

#[test]
fn slides_keyword_filter() {
    let root = TempDir::new().unwrap();
    seed_record(root.path(), "a", "Diffusion", false);
    seed_record(root.path(), "b", "Transformer", false);

    let config = SlideConfig {
        keywords: vec!["DIFFUSION".into()],
        ..SlideConfig::default()
    };
    let written = make_all_slides(root.path(), &config).unwrap();
    assert_eq!(written, vec![root.path().join("a/Paper_a_output.md")]);
}

#[test]
fn slides_on_missing_directory() {
    let err = make_all_slides(Path::new("/nonexistent/records"), &SlideConfig::default()).unwrap_err();
    assert!(err.to_string().contains("does not exist") || err.to_string().contains("not found"));
}

#[test]
fn record_on_disk_round_trips() {
    let root = TempDir::new().unwrap();
    let record = seed_record(root.path(), "x", "k", true);
    let back = read_record(&root.path().join("x/paper.json")).unwrap();
    assert_eq!(back, record);
}

// ── Offline: batch error isolation ───────────────────────────────────────────

#[tokio::test]
async fn batch_continues_past_broken_documents() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let garbage = input.path().join("a.pdf");
    std::fs::write(&garbage, b"<html>not a pdf</html>").unwrap();
    let missing = input.path().join("b.pdf");

    let log = Arc::new(EventLog::default());
    let config = DigestConfig::builder()
        .output_dir(out.path())
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let summarizer = Summarizer::new(Arc::new(MockProvider::new()), &config.llm);

    let report = digest_paths(&[garbage, missing], &config, &summarizer).await;

    assert_eq!((report.succeeded(), report.failed()), (0, 2));
    assert!(matches!(
        report.documents[0].result,
        Err(DigestError::NotAPdf { .. })
    ));
    assert!(matches!(
        report.documents[1].result,
        Err(DigestError::FileNotFound { .. })
    ));
    assert_eq!(
        log.lines(),
        vec!["batch 2", "start 1", "error 1", "start 2", "error 2", "finished 0/2"]
    );
    assert!(!has_record(out.path()));
}

// ── Live: pdfium + LLM ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let report = inspect(&path, None, &SelectionCriteria::default())
        .await
        .expect("inspect() should succeed");

    assert_eq!(report.metadata.page_count, 15, "Attention paper should have 15 pages");
    assert!(!report.metadata.leading_text.is_empty());
    assert!(!report.images.is_empty());
    println!("Metadata: {:?}", report.metadata);
}

#[tokio::test]
async fn test_digest_and_slides_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let out = TempDir::new().unwrap();

    let config = DigestConfig::builder()
        .output_dir(out.path())
        .max_retries(2)
        .build()
        .unwrap();
    let report = digest_path(&path, &config).await.expect("digest should start");
    assert_eq!(report.succeeded(), 1, "{:?}", report.documents);

    let record_path = out.path().join("attention_is_all_you_need/paper.json");
    let record = read_record(&record_path).unwrap();
    assert_eq!(record.summary.entry_id, "attention_is_all_you_need");
    assert_eq!(record.cover_image_path, "images/half.png");
    assert!(record.images.len() <= 5);
    assert!(record.bibliography.abstract_excerpt.chars().count() <= 2000);
    assert!(out.path().join("attention_is_all_you_need/images/half.png").exists());
    for img in &record.images {
        assert!(out.path().join("attention_is_all_you_need").join(img).exists());
    }
    println!("Summary: {:#?}", record.summary);

    let decks = make_all_slides(out.path(), &SlideConfig::default()).unwrap();
    assert_eq!(decks.len(), 1);
}

#[tokio::test]
async fn test_summary_failure_abandons_only_that_paper() {
    let paper = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let first = input.path().join("first.pdf");
    build_pdf(&first, &[&[(500, 500, 11)]]);

    // The first summary call fails; the next one succeeds.
    let provider = Arc::new(ScriptedProvider {
        failures: 1,
        reply: "論文名: 注意機構\nキーワード: Transformer".into(),
        calls: AtomicUsize::new(0),
    });
    let config = DigestConfig::builder().output_dir(out.path()).build().unwrap();
    let summarizer = Summarizer::new(provider.clone(), &LlmConfig::default());

    let report = digest_paths(&[first, paper], &config, &summarizer).await;

    assert_eq!((report.succeeded(), report.failed()), (1, 1));
    assert!(matches!(
        &report.documents[0].result,
        Err(DigestError::SummaryFailed { attempts: 1, message }) if message.contains("upstream 503")
    ));
    assert!(!out.path().join("first/paper.json").exists());

    let record = read_record(&out.path().join("attention_is_all_you_need/paper.json")).unwrap();
    assert_eq!(record.summary.title_localized, "注意機構");
    assert_eq!(record.summary.keywords, "Transformer");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}
