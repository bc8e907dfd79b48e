//! # alice-pdf
//!
//! Extract tables from PDF documents into CSV files.
//!
//! ## Why this crate?
//!
//! Tables in scanned or visually complex PDFs defeat text-layer extractors:
//! merged cells, rotated headers and multi-line rows come out scrambled.
//! This crate delegates table recognition to an engine that sees the page
//! the way a reader does (a vision model, a cloud OCR service, or tabula for
//! born-digital files) and normalises whatever comes back into tidy CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Pages    page count via pdfium, parse "1-3,5" selections
//!  ├─ 3. Engine   per page: render → vision LLM │ Mistral OCR │ tabula
//!  ├─ 4. Tables   JSON / Markdown reply → rectangular tables
//!  └─ 5. Output   {stem}_page{N}_table{i}.csv (+ {stem}_merged.csv)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alice_pdf::{extract_tables, AnyEngine, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Vision engine with Mistral pixtral; key from .api_key() or MISTRAL_API_KEY
//!     let config = ExtractionConfig::builder().merge(true).build()?;
//!     let engine = AnyEngine::from_config(&config)?;
//!     let output = extract_tables("statement.pdf", "tables/", &engine, &config).await?;
//!     eprintln!("{} tables, merged into {:?}",
//!         output.stats.tables_written,
//!         output.merged_file);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `alice-pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `tabula` | off     | Enables the tabula engine; needs a JVM and the tabula-java jar |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! alice-pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod table;
pub mod writer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineKind, ExtractionConfig, ExtractionConfigBuilder, PageSelection};
pub use credentials::{resolve_api_key, ApiKey, KeySource};
pub use engine::{AnyEngine, SourceDocument, TableEngine};
pub use error::{AlicePdfError, PageError};
pub use extract::{extract_document, extract_tables, extract_tables_sync, inspect};
pub use output::{DocumentMetadata, ExtractionOutput, ExtractionStats, PageReport};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{prompt_from_schema, TableSchema};
pub use table::{RawTable, Table};
pub use writer::{merge_tables, normalise_column_name, MergedTable};
