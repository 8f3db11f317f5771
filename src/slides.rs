//! Marp slide decks from stored records.
//!
//! A deck is a title slide, the cover band and one slide per stored image
//! whose file is larger than the configured floor. Each image is scaled to
//! fit a 1120×630 box (70 % of a 1600×900 slide), and the scaled width goes
//! into Marp's `![width:N](path)` syntax.

use crate::config::SlideConfig;
use crate::error::DigestError;
use crate::record::{read_record, PaperRecord, RECORD_FILE_NAME};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Box images are scaled to fit, in Marp pixels.
pub const MAX_DISPLAY_WIDTH: f64 = 1120.0;
pub const MAX_DISPLAY_HEIGHT: f64 = 630.0;

/// Width given to the cover band.
pub const COVER_DISPLAY_WIDTH: u32 = 1400;

/// Characters of the title kept in the output file name.
const FILE_TITLE_CHARS: usize = 14;

const SECTION_BREAK: &str = "\n---\n";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_\-]").unwrap());

/// Scaled display width of a `width × height` image.
pub fn display_width(width: u32, height: u32) -> u32 {
    if width == 0 || height == 0 {
        return 0;
    }
    let (w, h) = (f64::from(width), f64::from(height));
    let scale = (MAX_DISPLAY_WIDTH / w).min(MAX_DISPLAY_HEIGHT / h);
    (scale * w).floor() as u32
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn safe_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(name, "_").into_owned()
}

/// Output file name for a record: `<safe title prefix>_output.md`.
pub fn output_file_name(record: &PaperRecord) -> String {
    let prefix: String = record.bibliography.title.chars().take(FILE_TITLE_CHARS).collect();
    format!("{}_output.md", safe_filename(&prefix))
}

/// Case-insensitive substring match of any keyword against the raw record text.
/// An empty keyword list matches everything.
pub fn matches_keywords(raw: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let haystack = raw.to_lowercase();
    keywords.iter().any(|k| haystack.contains(&k.to_lowercase()))
}

/// Find record files under `dir`.
///
/// A directory holding `paper.json` is a record itself; otherwise each
/// immediate subdirectory holding one is. Results are sorted.
pub fn discover_records(dir: &Path) -> Result<Vec<PathBuf>, DigestError> {
    if !dir.is_dir() {
        return Err(DigestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let own = dir.join(RECORD_FILE_NAME);
    if own.is_file() {
        return Ok(vec![own]);
    }

    let entries = std::fs::read_dir(dir).map_err(|source| DigestError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .map(|p| p.join(RECORD_FILE_NAME))
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    Ok(found)
}

/// A rendered deck, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSlides {
    pub markdown: String,
    /// Image paths that made it into the deck.
    pub images_used: Vec<String>,
}

/// Render the deck for `record`; image paths resolve against `record_dir`.
///
/// Images whose file is not strictly larger than `min_image_bytes`, or that
/// cannot be read, are left out.
pub fn render_slides(record: &PaperRecord, record_dir: &Path, min_image_bytes: u64) -> RenderedSlides {
    let s = &record.summary;
    let mut md = String::new();

    md.push_str(SECTION_BREAK);
    md.push_str("<!-- _class: title -->\n");
    md.push_str(&format!("# {}\n", s.title_localized));
    md.push_str(&format!("{}\n", s.title_original));
    md.push_str(&format!("[{}] {} {}\n", s.year, s.keywords, s.entry_id));
    md.push_str(&format!("__課題__ {}\n", s.problem));
    md.push_str(&format!("__手法__ {}\n", s.method));
    md.push_str(&format!("__結果__ {}\n", s.result));

    md.push_str(SECTION_BREAK);
    md.push_str("<!-- _class: info -->\n");
    md.push_str(&format!(
        "![width:{}]({})\n",
        COVER_DISPLAY_WIDTH, record.cover_image_path
    ));

    let mut images_used = Vec::new();
    for image in &record.images {
        let path = record_dir.join(image);
        let size = match std::fs::metadata(&path) {
            Ok(m) => m.len(),
            Err(e) => {
                warn!("Skipping image {}: {}", path.display(), e);
                continue;
            }
        };
        debug!("Image {}: {:.2} KB", image, size as f64 / 1024.0);
        if size <= min_image_bytes {
            continue;
        }
        let (w, h) = match image::image_dimensions(&path) {
            Ok(dims) => dims,
            Err(e) => {
                warn!("Skipping unreadable image {}: {}", path.display(), e);
                continue;
            }
        };

        md.push_str(SECTION_BREAK);
        md.push_str("<!-- _class: info -->\n");
        md.push_str(&format!("![width:{}]({})\n", display_width(w, h), image));
        images_used.push(image.clone());
    }

    if images_used.is_empty() {
        warn!(
            "No images above {:.0} KB for '{}'",
            min_image_bytes as f64 / 1024.0,
            s.entry_id
        );
    }

    RenderedSlides {
        markdown: md,
        images_used,
    }
}

/// Render one record file into `<record dir>/<safe title>_output.md`.
///
/// Returns `Ok(None)` when the record does not match the keywords.
pub fn make_slides(record_path: &Path, config: &SlideConfig) -> Result<Option<PathBuf>, DigestError> {
    let raw = std::fs::read_to_string(record_path).map_err(|source| DigestError::ReadFailed {
        path: record_path.to_path_buf(),
        source,
    })?;
    if !matches_keywords(&raw, &config.keywords) {
        info!("Skipping {} (does not match keywords)", record_path.display());
        return Ok(None);
    }

    let record = PaperRecord::from_json(&raw, record_path)?;
    let record_dir = record_path.parent().unwrap_or_else(|| Path::new("."));
    let rendered = render_slides(&record, record_dir, config.min_image_bytes());

    let out = record_dir.join(output_file_name(&record));
    std::fs::write(&out, rendered.markdown).map_err(|source| DigestError::OutputWriteFailed {
        path: out.clone(),
        source,
    })?;

    info!(
        "Slides for '{}' written to {} ({} image(s))",
        record.summary.entry_id,
        out.display(),
        rendered.images_used.len()
    );
    Ok(Some(out))
}

/// Render every record found under `dir`; per-record failures are logged.
pub fn make_all_slides(dir: &Path, config: &SlideConfig) -> Result<Vec<PathBuf>, DigestError> {
    let records = discover_records(dir)?;
    if records.is_empty() {
        warn!("No records found in {}", dir.display());
        return Ok(Vec::new());
    }

    let mut written = Vec::new();
    for path in &records {
        match make_slides(path, config) {
            Ok(Some(out)) => written.push(out),
            Ok(None) => {}
            Err(e) => warn!("Failed to render {}: {}", path.display(), e),
        }
    }
    Ok(written)
}

/// Read a record and render it without writing anything.
pub fn preview_slides(record_path: &Path, config: &SlideConfig) -> Result<RenderedSlides, DigestError> {
    let record = read_record(record_path)?;
    let record_dir = record_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(render_slides(&record, record_dir, config.min_image_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::write_record;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn display_width_fits_the_box() {
        for (w, h) in [(500, 500), (1600, 900), (4000, 100), (100, 4000), (1, 1), (2240, 630)] {
            let d = display_width(w, h);
            assert!(f64::from(d) <= MAX_DISPLAY_WIDTH, "{w}x{h} → {d}");
            assert!(f64::from(d) / f64::from(w) * f64::from(h) <= MAX_DISPLAY_HEIGHT + 1e-9);
        }
    }

    #[test]
    fn display_width_examples() {
        assert_eq!(display_width(500, 500), 630);
        assert_eq!(display_width(1600, 900), 1120);
        assert_eq!(display_width(4000, 100), 1120);
        assert_eq!(display_width(0, 10), 0);
        // The scale is applied to the width before flooring, so sizes
        // whose scale is not exact in binary lose the last pixel.
        assert_eq!(display_width(141, 141), 629);
        assert_eq!(display_width(275, 100), 1119);
        assert_eq!(display_width(90, 900), 62);
    }

    #[test]
    fn safe_filename_replaces_everything_else() {
        assert_eq!(safe_filename("Attention Is Al"), "Attention_Is_Al");
        assert_eq!(safe_filename("a-b_c.d/é"), "a-b_c_d__");
    }

    #[test]
    fn output_name_uses_fourteen_characters() {
        let mut r = PaperRecord::default();
        r.bibliography.title = "Attention Is All You Need".into();
        assert_eq!(output_file_name(&r), "Attention_Is_A_output.md");
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let raw = r#"{"summary": {"keywords": "Diffusion, GAN"}}"#;
        assert!(matches_keywords(raw, &[]));
        assert!(matches_keywords(raw, &["diffusion".into()]));
        assert!(matches_keywords(raw, &["nerf".into(), "gan".into()]));
        assert!(!matches_keywords(raw, &["transformer".into()]));
    }

    fn noisy_png(path: &Path, w: u32, h: u32) {
        // Pseudo-random pixels so PNG compression cannot shrink the file much.
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(w, h, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let b = state.to_le_bytes();
            Rgb([b[0], b[1], b[2]])
        });
        img.save(path).unwrap();
    }

    fn record_with_images(images: &[&str]) -> PaperRecord {
        let mut r = PaperRecord::default();
        r.summary.title_localized = "題名".into();
        r.summary.entry_id = "2401.00001".into();
        r.cover_image_path = "images/half.png".into();
        r.images = images.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn no_images_above_threshold_gives_two_sections() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        RgbImage::new(40, 40).save(dir.path().join("images/img01_00003.png")).unwrap();

        let record = record_with_images(&["images/img01_00003.png"]);
        let out = render_slides(&record, dir.path(), 100 * 1024);

        assert!(out.images_used.is_empty());
        assert_eq!(out.markdown.matches(SECTION_BREAK).count(), 2);
        assert!(out.markdown.contains("<!-- _class: title -->\n# 題名\n"));
        assert!(out.markdown.contains("![width:1400](images/half.png)"));
    }

    #[test]
    fn large_image_gets_its_own_section() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        noisy_png(&dir.path().join("images/img02_00010.png"), 200, 100);

        let record = record_with_images(&["images/img02_00010.png", "images/missing.png"]);
        let out = render_slides(&record, dir.path(), 1024);

        assert_eq!(out.images_used, vec!["images/img02_00010.png"]);
        assert!(out.markdown.ends_with("![width:1120](images/img02_00010.png)\n"));
        assert_eq!(out.markdown.matches(SECTION_BREAK).count(), 3);
    }

    #[test]
    fn title_section_layout() {
        let mut r = record_with_images(&[]);
        r.summary.title_original = "Paper".into();
        r.summary.year = "2024".into();
        r.summary.keywords = "k1, k2".into();
        r.summary.problem = "P".into();
        r.summary.method = "M".into();
        r.summary.result = "R".into();
        let out = render_slides(&r, Path::new("."), 0);
        assert!(out.markdown.starts_with(
            "\n---\n<!-- _class: title -->\n# 題名\nPaper\n[2024] k1, k2 2401.00001\n\
             __課題__ P\n__手法__ M\n__結果__ R\n\n---\n<!-- _class: info -->\n"
        ));
    }

    #[test]
    fn discovery_prefers_own_record_then_children() {
        let root = TempDir::new().unwrap();
        for id in ["b", "a"] {
            let d = root.path().join(id);
            std::fs::create_dir(&d).unwrap();
            write_record(&PaperRecord::default(), &d).unwrap();
        }
        std::fs::create_dir(root.path().join("empty")).unwrap();

        let found = discover_records(root.path()).unwrap();
        assert_eq!(
            found,
            vec![root.path().join("a/paper.json"), root.path().join("b/paper.json")]
        );

        let single = discover_records(&root.path().join("a")).unwrap();
        assert_eq!(single, vec![root.path().join("a/paper.json")]);
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = discover_records(Path::new("/nonexistent/records")).unwrap_err();
        assert!(matches!(err, DigestError::DirectoryNotFound { .. }));
    }

    #[test]
    fn make_slides_skips_non_matching_record() {
        let dir = TempDir::new().unwrap();
        let path = write_record(&record_with_images(&[]), dir.path()).unwrap();
        let config = SlideConfig {
            keywords: vec!["quantum".into()],
            ..SlideConfig::default()
        };
        assert_eq!(make_slides(&path, &config).unwrap(), None);
    }

    #[test]
    fn make_slides_writes_named_file() {
        let dir = TempDir::new().unwrap();
        let mut record = record_with_images(&[]);
        record.bibliography.title = "LoRA: Low-Rank Adaptation".into();
        let path = write_record(&record, dir.path()).unwrap();

        let out = make_slides(&path, &SlideConfig::default()).unwrap().unwrap();
        assert_eq!(out, dir.path().join("LoRA__Low-Rank_output.md"));
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.contains("__結果__ N/A"));
    }
}
