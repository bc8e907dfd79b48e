//! Extraction entry points.
//!
//! [`extract_tables`] resolves the input, reads the page count and hands the
//! document to [`extract_document`], which drives the engine page by page and
//! writes the CSV files. Pages are processed strictly in order, one at a
//! time; a failed page is logged and skipped, only I/O on the output
//! directory aborts the run.

use crate::config::ExtractionConfig;
use crate::engine::{SourceDocument, TableEngine};
use crate::error::AlicePdfError;
use crate::output::{DocumentMetadata, ExtractionOutput, ExtractionStats, PageReport};
use crate::pipeline::{input, render};
use crate::table::Table;
use crate::writer;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Extract every table from a PDF file or URL into CSV files.
///
/// # Arguments
/// * `input` — local path or HTTP/HTTPS URL of the PDF
/// * `output_dir` — where the CSV files go; cleared first unless
///   `config.clear_output` is false
/// * `engine` — the table-recognition backend
/// * `config` — page selection, merge flag, timeouts, …
///
/// # Errors
/// Fatal errors only: unreadable or invalid input, no selected page in range,
/// output directory or file I/O. Per-page engine failures are recorded in
/// [`ExtractionOutput::pages`] instead.
///
/// # Example
/// ```rust,no_run
/// use alice_pdf::{extract_tables, AnyEngine, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::builder()
///     .pages("1-3".parse()?)
///     .merge(true)
///     .build()?;
/// let engine = AnyEngine::from_config(&config)?;
/// let output = extract_tables("report.pdf", "out", &engine, &config).await?;
/// println!("{} tables", output.stats.tables_written);
/// # Ok(())
/// # }
/// ```
pub async fn extract_tables<E: TableEngine>(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    engine: &E,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, AlicePdfError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Page count and metadata ──────────────────────────────────
    let metadata = render::extract_metadata(resolved.path(), config.password.as_deref()).await?;
    let doc = SourceDocument::new(resolved.path(), metadata.page_count);

    // ── Step 3: Per-page extraction ──────────────────────────────────────
    let mut output =
        extract_document(&doc, &resolved.stem(), output_dir.as_ref(), engine, config).await?;
    output.metadata = metadata;
    Ok(output)
}

/// Blocking wrapper around [`extract_tables`] for non-async callers.
pub fn extract_tables_sync<E: TableEngine>(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    engine: &E,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, AlicePdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AlicePdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_tables(input_str, output_dir, engine, config))
}

/// Read PDF metadata without extracting anything.
///
/// Needs neither an engine nor an API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, AlicePdfError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), None).await
}

/// Run the engine over the selected pages of an already-opened document.
///
/// `stem` names the output files (`{stem}_page{N}_table{i}.csv`). The
/// returned metadata only carries the page count.
pub async fn extract_document<E: TableEngine>(
    doc: &SourceDocument,
    stem: &str,
    output_dir: &Path,
    engine: &E,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, AlicePdfError> {
    let start = Instant::now();
    let total_pages = doc.page_count;

    // ── Page selection ───────────────────────────────────────────────────
    let out_of_range = config.pages.out_of_range(total_pages);
    for page in &out_of_range {
        warn!("Page {} out of range, skipping", page);
    }
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        warn!("No selected page is in range (document has {} pages)", total_pages);
    }
    let selected = page_indices.len();

    info!("Processing {} pages from: {}", selected, doc.path.display());
    info!(
        "Engine: {}, model: {}, DPI: {}",
        engine.name(),
        config.effective_model(),
        config.dpi
    );

    // ── Output directory ─────────────────────────────────────────────────
    writer::prepare_output_dir(output_dir, config.clear_output).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(selected);
    }

    // ── Pages, in order ──────────────────────────────────────────────────
    let mut tables: Vec<Table> = Vec::new();
    let mut files: Vec<PathBuf> = Vec::new();
    let mut reports: Vec<PageReport> = Vec::with_capacity(selected);

    for (n, &page_index) in page_indices.iter().enumerate() {
        let page_num = page_index + 1;
        let page_start = Instant::now();
        info!("Processing page {} ({}/{})", page_num, n + 1, selected);
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, selected);
        }

        let raw_tables = match engine.extract_page(doc, page_index).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("  {}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, selected, &e.to_string());
                }
                reports.push(PageReport {
                    page_num,
                    tables: 0,
                    duration_ms: page_start.elapsed().as_millis() as u64,
                    error: Some(e),
                });
                continue;
            }
        };
        debug!("  Engine returned {} table(s)", raw_tables.len());

        let mut written = 0;
        for (i, raw) in raw_tables.into_iter().enumerate() {
            let Some(table) = Table::from_raw(page_num, i, raw) else {
                info!("  Table {}: empty, skipping", i);
                continue;
            };
            let (rows, cols) = table.shape();
            info!("  Table {}: ({}, {})", i, rows, cols);

            let path = writer::write_table_csv(output_dir, stem, &table).await?;
            info!("    Saved: {}", path.display());

            files.push(path);
            tables.push(table);
            written += 1;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page_num, selected, written);
        }
        reports.push(PageReport {
            page_num,
            tables: written,
            duration_ms: page_start.elapsed().as_millis() as u64,
            error: None,
        });
    }

    // ── Merge ────────────────────────────────────────────────────────────
    let merged_file = if config.merge && !tables.is_empty() {
        let merged = writer::merge_tables(&tables);
        let path = writer::write_merged_csv(output_dir, stem, &merged).await?;
        info!(
            "Merged all tables into: {} ({}, {})",
            path.display(),
            merged.rows.len(),
            merged.headers.len()
        );
        Some(path)
    } else {
        if config.merge {
            info!("No tables found, nothing to merge");
        }
        None
    };

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let stats = ExtractionStats {
        total_pages,
        processed_pages: selected - failed,
        failed_pages: failed,
        skipped_pages: out_of_range.len(),
        tables_written: tables.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    if failed > 0 {
        warn!("{} of {} pages failed", failed, selected);
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(selected, stats.tables_written);
    }

    Ok(ExtractionOutput {
        tables,
        files,
        merged_file,
        pages: reports,
        metadata: DocumentMetadata {
            page_count: total_pages,
            ..Default::default()
        },
        stats,
    })
}
