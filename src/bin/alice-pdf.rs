//! CLI binary for alice-pdf.
//!
//! A thin shim over the library crate: maps CLI flags to an
//! `ExtractionConfig`, resolves the Mistral API key, and runs the extraction.
//! Exit status is 1 on a missing key, an unusable schema or a failed run.

use anyhow::{Context, Result};
use clap::Parser;
use alice_pdf::credentials;
use alice_pdf::{
    extract_tables, inspect, prompt_from_schema, AnyEngine, EngineKind, ExtractionConfig,
    ExtractionOutput, ExtractionProgressCallback, PageSelection, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
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

/// Terminal progress bar with one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, tables: usize) {
        let secs = self.page_elapsed_secs();
        self.bar.println(format!(
            "  {} Page {:>3}  {:<10}  {}",
            green("✓"),
            page_num,
            dim(&format!("{tables:>2} tables")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
        let secs = self.page_elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            red("✗"),
            page_num,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, tables: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let mark = if failed == 0 {
            green("✔")
        } else if failed == total_pages {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{} Extraction complete: {} tables processed",
            mark,
            bold(&tables.to_string())
        );
        if failed > 0 {
            eprintln!("  {}/{} pages failed", red(&failed.to_string()), total_pages);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract all tables (requires MISTRAL_API_KEY env var)
  alice-pdf input.pdf output/

  # Extract specific pages
  alice-pdf input.pdf output/ --pages "1-3,5"

  # Merge all tables into one CSV
  alice-pdf input.pdf output/ --merge

  # Use table schema for better accuracy
  alice-pdf input.pdf output/ --schema table_schema.yaml

  # Use API key directly
  alice-pdf input.pdf output/ --api-key "your-key-here"

  # Mistral document OCR instead of the vision model
  alice-pdf input.pdf output/ --engine ocr

  # Local extraction with tabula (build with --features tabula)
  alice-pdf input.pdf output/ --engine tabula --tabula-jar tabula.jar

  # Inspect PDF metadata (no API key needed)
  alice-pdf --inspect-only input.pdf

OUTPUT:
  output/<stem>_page<N>_table<i>.csv   one file per non-empty table
  output/<stem>_merged.csv             all tables (--merge), spaces in
                                       column names replaced by "_"

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY          Mistral API key (vision and OCR engines)
  ALICE_PDF_IGNORE_ENV     Do not read the key from ./.env
  ALICE_PDF_*              Defaults for most flags (see --help)
  PDFIUM_LIB_PATH          Directory containing libpdfium
  RUST_LOG                 Log filter, overrides --debug/--quiet

API KEY LOOKUP ORDER:
  1. --api-key
  2. MISTRAL_API_KEY
  3. .env in the current directory (MISTRAL_API_KEY= or api_key=)
"#;

/// Extract tables from PDFs into CSV files.
#[derive(Parser, Debug)]
#[command(
    name = "alice-pdf",
    version,
    about = "Extract tables from PDFs into CSV using Mistral vision, OCR or tabula",
    long_about = "Extract tables from PDF documents (local files or URLs) into CSV files. \
Each page is handed to a table engine: a Mistral vision model (default), Mistral \
document OCR, or tabula-java. Every table becomes its own CSV; --merge also writes \
all of them into a single file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path or HTTP/HTTPS URL of the PDF.
    pdf_path: String,

    /// Output directory for CSV files (cleared first).
    #[arg(required_unless_present = "inspect_only")]
    output_dir: Option<PathBuf>,

    /// Mistral API key (or set MISTRAL_API_KEY env var).
    #[arg(long)]
    api_key: Option<String>,

    /// Pages to process: all, 1, 1-3, 1,3,5 or 1-3,5.
    #[arg(long, env = "ALICE_PDF_PAGES", default_value = "all")]
    pages: String,

    /// Table engine: vision (alias: mistral), ocr, tabula.
    #[arg(long, env = "ALICE_PDF_ENGINE", default_value = "vision")]
    engine: String,

    /// LLM provider for the vision engine.
    #[arg(long, env = "ALICE_PDF_PROVIDER", default_value = "mistral")]
    provider: String,

    /// Model ID (default: pixtral-12b-2409, or mistral-ocr-latest for --engine ocr).
    #[arg(long, env = "ALICE_PDF_MODEL")]
    model: Option<String>,

    /// Image resolution for the vision engine (72–400).
    #[arg(long, env = "ALICE_PDF_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Merge all tables into a single CSV.
    #[arg(short, long, env = "ALICE_PDF_MERGE")]
    merge: bool,

    /// Table schema file (YAML/JSON) used to generate the prompt.
    #[arg(long, env = "ALICE_PDF_SCHEMA")]
    schema: Option<PathBuf>,

    /// Custom prompt describing the table structure (overrides --schema).
    #[arg(long)]
    prompt: Option<String>,

    /// Pause before each API call, in milliseconds.
    #[arg(long, env = "ALICE_PDF_RATE_LIMIT_MS", default_value_t = 1200)]
    rate_limit_ms: u64,

    /// Path to the tabula-java jar (tabula engine).
    #[arg(long, env = "ALICE_PDF_TABULA_JAR")]
    tabula_jar: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "ALICE_PDF_PASSWORD")]
    password: Option<String>,

    /// Do not clear the output directory first.
    #[arg(long, env = "ALICE_PDF_KEEP_EXISTING")]
    keep_existing: bool,

    /// Print a JSON summary of the run to stdout.
    #[arg(long)]
    json: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress bar.
    #[arg(long, env = "ALICE_PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ALICE_PDF_QUIET")]
    quiet: bool,

    /// Enable debug logging.
    #[arg(short, long, env = "ALICE_PDF_DEBUG")]
    debug: bool,
}

impl Cli {
    fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress && !self.json && !self.inspect_only
    }

    fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else if self.show_progress() {
            // The bar replaces the per-page info lines; warnings stay visible.
            "warn"
        } else {
            "info"
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.inspect_only {
        return runtime()?.block_on(run_inspect(&cli));
    }

    let progress_cb: Option<ProgressCallback> = if cli.show_progress() {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let mut config = build_config(&cli, progress_cb)?;

    // ── API key ──────────────────────────────────────────────────────────
    if config.needs_api_key() {
        let key = credentials::resolve_api_key(cli.api_key.as_deref())
            .ok_or(alice_pdf::AlicePdfError::MissingApiKey)?;
        debug!("Using API key from {:?}", key.source());
        config.api_key = Some(key.expose().to_string());
    }

    // ── Prompt ───────────────────────────────────────────────────────────
    config.custom_prompt = resolve_prompt(&cli)?;

    let output_dir = cli
        .output_dir
        .clone()
        .context("output directory is required")?;

    let output = runtime()?.block_on(async {
        let engine = AnyEngine::from_config(&config)?;
        extract_tables(&cli.pdf_path, &output_dir, &engine, &config).await
    });
    let output = output.context("Extraction failed")?;

    info!(
        "Extraction complete: {} tables processed",
        output.stats.tables_written
    );
    report(&cli, &output)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start tokio runtime")
}

async fn run_inspect(cli: &Cli) -> Result<()> {
    let meta = inspect(&cli.pdf_path)
        .await
        .context("Failed to inspect PDF")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
    } else {
        println!("File:         {}", cli.pdf_path);
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
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
    }
    Ok(())
}

/// `--prompt` wins over `--schema`.
fn resolve_prompt(cli: &Cli) -> Result<Option<String>> {
    if let Some(ref prompt) = cli.prompt {
        return Ok(Some(prompt.clone()));
    }
    match cli.schema {
        Some(ref path) => {
            let prompt = prompt_from_schema(path)
                .context("Failed to generate prompt from schema")?;
            info!("Generated prompt from schema: {}", path.display());
            Ok(Some(prompt))
        }
        None => Ok(None),
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let engine: EngineKind = cli.engine.parse()?;
    let pages: PageSelection = cli.pages.parse()?;

    let mut builder = ExtractionConfig::builder()
        .engine(engine)
        .pages(pages)
        .provider_name(cli.provider.as_str())
        .dpi(cli.dpi)
        .rate_limit_ms(cli.rate_limit_ms)
        .merge(cli.merge)
        .clear_output(!cli.keep_existing);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref jar) = cli.tabula_jar {
        builder = builder.tabula_jar(jar);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn report(cli: &Cli, output: &ExtractionOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    if !cli.quiet && !cli.show_progress() {
        if output.stats.failed_pages > 0 {
            eprintln!(
                "  {} of {} pages failed",
                output.stats.failed_pages,
                output.stats.processed_pages + output.stats.failed_pages
            );
        }
        if let Some(ref merged) = output.merged_file {
            eprintln!("  merged → {}", merged.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("alice-pdf").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = parse(&["in.pdf", "out"]);
        assert_eq!(cli.pages, "all");
        assert_eq!(cli.engine, "vision");
        assert_eq!(cli.provider, "mistral");
        assert_eq!(cli.dpi, 150);
        assert!(!cli.merge);
        assert!(cli.model.is_none());

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.effective_model(), "pixtral-12b-2409");
        assert!(config.clear_output);
    }

    #[test]
    fn output_dir_required_unless_inspecting() {
        assert!(Cli::try_parse_from(["alice-pdf", "in.pdf"]).is_err());
        let cli = parse(&["--inspect-only", "in.pdf"]);
        assert!(cli.output_dir.is_none());
    }

    #[test]
    fn short_flags() {
        let cli = parse(&["in.pdf", "out", "-m", "-d"]);
        assert!(cli.merge);
        assert!(cli.debug);
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn log_level_follows_output_mode() {
        assert_eq!(parse(&["in.pdf", "out"]).log_filter(), "warn");
        assert_eq!(parse(&["in.pdf", "out", "--no-progress"]).log_filter(), "info");
        assert_eq!(parse(&["in.pdf", "out", "--json"]).log_filter(), "info");
        assert_eq!(parse(&["in.pdf", "out", "-q"]).log_filter(), "error");
        assert_eq!(parse(&["in.pdf", "out", "-q", "-d"]).log_filter(), "debug");
    }

    #[test]
    fn dpi_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["alice-pdf", "in.pdf", "out", "--dpi", "20"]).is_err());
    }

    #[test]
    fn pages_and_engine_flow_into_config() {
        let cli = parse(&[
            "in.pdf", "out", "--pages", "1-3,5", "--engine", "ocr", "--keep-existing",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.engine, EngineKind::Ocr);
        assert_eq!(config.pages, PageSelection::Pages(vec![1, 2, 3, 5]));
        assert_eq!(config.effective_model(), "mistral-ocr-latest");
        assert!(!config.clear_output);
    }

    #[test]
    fn bad_pages_is_a_config_error() {
        let cli = parse(&["in.pdf", "out", "--pages", "x-2"]);
        assert!(build_config(&cli, None).is_err());
    }

    #[test]
    fn prompt_overrides_schema() {
        let cli = parse(&[
            "in.pdf",
            "out",
            "--prompt",
            "Only the totals table",
            "--schema",
            "/does/not/exist.yaml",
        ]);
        assert_eq!(
            resolve_prompt(&cli).unwrap().as_deref(),
            Some("Only the totals table")
        );
    }

    #[test]
    fn missing_schema_is_an_error() {
        let cli = parse(&["in.pdf", "out", "--schema", "/does/not/exist.yaml"]);
        let err = resolve_prompt(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("schema"), "{err:#}");
    }

    #[test]
    fn schema_prompt_generated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        std::fs::write(&path, "columns:\n  - name: TOTALE PERCEPITO\n").unwrap();
        let cli = parse(&["in.pdf", "out", "--schema", path.to_str().unwrap()]);
        let prompt = resolve_prompt(&cli).unwrap().unwrap();
        assert!(prompt.contains("Extract all tables"));
        assert!(prompt.contains("TOTALE PERCEPITO"));
    }
}
