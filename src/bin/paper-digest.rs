//! CLI binary for paper-digest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigestConfig` / `SlideConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use paper_digest::{
    digest_path, inspect, make_all_slides, DigestConfig, DigestError, DigestProgressCallback,
    ProgressCallback, SelectionCriteria, SlideConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch, one log line per paper.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the paper currently being digested.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} papers  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Digesting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Digesting {total} paper(s)…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, path: &Path) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(file_label(path));
    }

    fn on_document_complete(&self, index: usize, total: usize, path: &Path, images: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            green("✓"),
            index,
            total,
            file_label(path),
            dim(&format!("{images} image(s)")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep one line per paper.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            red("✗"),
            index,
            total,
            file_label(path),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} paper(s) digested successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} paper(s) digested  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digest one paper into ./records/<file stem>/
  paper-digest summarize 1706.03762.pdf

  # Digest every PDF in a directory with a specific model
  paper-digest summarize papers/ -d out --provider openai --model gpt-4.1-mini

  # Render every record under ./records into Marp slides
  paper-digest slides

  # Only records mentioning diffusion or GAN, images above 50 KB
  paper-digest slides -d out --min-size-kb 50 diffusion gan

  # Show PDF metadata and image inventory (no API key needed)
  paper-digest inspect paper.pdf --json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory (or file) of the pdfium shared library
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Digest research-paper PDFs into records and Marp slides.
#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Digest research-paper PDFs into summary records and Marp slides",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "PAPER_DIGEST_PASSWORD")]
    password: Option<String>,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PAPER_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAPER_DIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAPER_DIGEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Digest a PDF, or every PDF in a directory, into records.
    Summarize(SummarizeArgs),

    /// Render stored records into Marp slide decks.
    Slides(SlidesArgs),

    /// Print PDF metadata and embedded image inventory.
    Inspect(InspectArgs),
}

#[derive(clap::Args, Debug)]
struct SummarizeArgs {
    /// A PDF file or a directory of PDF files.
    path: PathBuf,

    /// Output directory; each paper gets a subdirectory named after its file stem.
    #[arg(short = 'd', long = "dir", env = "PAPER_DIGEST_OUTPUT_DIR", default_value = "./records")]
    output_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Maximum number of figures kept per paper.
    #[arg(long, env = "PAPER_DIGEST_MAX_IMAGES", default_value_t = 5)]
    max_images: usize,

    /// Images narrower than this *and* shorter than --min-height are dropped.
    #[arg(long, env = "PAPER_DIGEST_MIN_WIDTH", default_value_t = 400)]
    min_width: u32,

    /// See --min-width.
    #[arg(long, env = "PAPER_DIGEST_MIN_HEIGHT", default_value_t = 400)]
    min_height: u32,

    /// Encoded images of this many bytes or fewer are dropped.
    #[arg(long, env = "PAPER_DIGEST_MIN_BYTES", default_value_t = 2048)]
    min_bytes: usize,

    /// Largest accepted long-side / short-side ratio (> 1).
    #[arg(long, env = "PAPER_DIGEST_MAX_ASPECT_RATIO", default_value_t = 8.0)]
    max_aspect_ratio: f64,

    /// Zoom factor for the page-1 cover render.
    #[arg(long, env = "PAPER_DIGEST_COVER_ZOOM", default_value_t = 2.0)]
    cover_zoom: f32,

    /// Path to a text file containing a custom summary prompt.
    #[arg(long, env = "PAPER_DIGEST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAPER_DIGEST_TEMPERATURE", default_value_t = 0.25)]
    temperature: f32,

    /// Max LLM output tokens per summary.
    #[arg(long, env = "PAPER_DIGEST_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Retries per paper on LLM failure.
    #[arg(long, env = "PAPER_DIGEST_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,
}

#[derive(clap::Args, Debug)]
struct SlidesArgs {
    /// A record directory, or a directory of record directories.
    #[arg(short = 'd', long = "dir", env = "PAPER_DIGEST_OUTPUT_DIR", default_value = "./records")]
    dir: PathBuf,

    /// Images whose file is not larger than this many KB are left out.
    #[arg(long, env = "PAPER_DIGEST_MIN_SIZE_KB", default_value_t = 100)]
    min_size_kb: u64,

    /// Only render records containing one of these words (case-insensitive).
    keywords: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct InspectArgs {
    /// The PDF to inspect.
    pdf: PathBuf,

    /// Output JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress =
        !cli.quiet && !cli.no_progress && matches!(cli.command, Command::Summarize(_));
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Summarize(args) => run_summarize(&cli, args, show_progress).await,
        Command::Slides(args) => run_slides(&cli, args),
        Command::Inspect(args) => run_inspect(&cli, args).await,
    }
}

async fn run_summarize(cli: &Cli, args: &SummarizeArgs, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, args, progress_cb).await?;
    let report = digest_path(&args.path, &config)
        .await
        .with_context(|| format!("Failed to digest {}", args.path.display()))?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Digested {}/{} paper(s) into {}",
            report.succeeded(),
            report.documents.len(),
            config.output_dir.display()
        );
    }
    if !cli.quiet {
        for doc in &report.documents {
            if let Ok(out) = &doc.result {
                eprintln!(
                    "   {}  →  {}",
                    dim(&doc.pdf_path.display().to_string()),
                    bold(&out.record_path.display().to_string()),
                );
            }
        }
    }

    if !report.documents.is_empty() && report.succeeded() == 0 {
        anyhow::bail!("No paper could be digested");
    }
    Ok(())
}

fn run_slides(cli: &Cli, args: &SlidesArgs) -> Result<()> {
    let config = SlideConfig {
        keywords: args.keywords.clone(),
        min_image_kb: args.min_size_kb,
    };

    let written = match make_all_slides(&args.dir, &config) {
        Ok(written) => written,
        Err(DigestError::DirectoryNotFound { path }) => {
            eprintln!("{} Directory {} does not exist.", cyan("⚠"), path.display());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to render slides"),
    };

    if !cli.quiet {
        for path in &written {
            eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
        }
        if written.is_empty() {
            eprintln!("{} No slides written", cyan("⚠"));
        }
    }
    Ok(())
}

async fn run_inspect(cli: &Cli, args: &InspectArgs) -> Result<()> {
    let report = inspect(&args.pdf, cli.password.as_deref(), &SelectionCriteria::default())
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    let meta = &report.metadata;
    println!("File:         {}", args.pdf.display());
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    if let Some(ref d) = meta.creation_date {
        println!("Created:      {}", d);
    }
    if let Some(ref d) = meta.modification_date {
        println!("Modified:     {}", d);
    }
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    println!("Images:       {}", report.images.len());
    for img in &report.images {
        println!(
            "  p{:<3} #{:<6} {:>5}x{:<5} {}{}",
            img.page,
            img.resource_id,
            img.width,
            img.height,
            if img.passes_dimensions { green("✓") } else { dim("·") },
            if img.has_soft_mask { dim("  smask") } else { String::new() },
        );
    }
    Ok(())
}

/// Map CLI args to `DigestConfig`.
async fn build_config(
    cli: &Cli,
    args: &SummarizeArgs,
    progress: Option<ProgressCallback>,
) -> Result<DigestConfig> {
    let system_prompt = if let Some(ref path) = args.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let selection = SelectionCriteria {
        min_width: args.min_width,
        min_height: args.min_height,
        min_bytes: args.min_bytes,
        max_aspect_ratio: args.max_aspect_ratio,
        max_count: args.max_images,
    };

    let mut builder = DigestConfig::builder()
        .output_dir(&args.output_dir)
        .selection(selection)
        .cover_zoom(args.cover_zoom)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
