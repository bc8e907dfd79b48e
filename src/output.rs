//! Result types returned by an extraction run.

use crate::error::PageError;
use crate::table::Table;
use serde::Serialize;
use std::path::PathBuf;

/// Document-level metadata read from the PDF info dictionary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// What happened on one processed page.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Tables written for this page (empty tables excluded).
    pub tables: usize,
    pub duration_ms: u64,
    /// Set when the engine failed on this page; it then contributed no tables.
    pub error: Option<PageError>,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages that were sent to the engine.
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Requested pages that do not exist in the document.
    pub skipped_pages: usize,
    pub tables_written: usize,
    pub total_duration_ms: u64,
}

/// Everything an extraction run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    /// Normalised, non-empty tables in page order.
    pub tables: Vec<Table>,
    /// Per-table CSV files, parallel to `tables`.
    pub files: Vec<PathBuf>,
    /// The merged CSV, when merging was requested and a table was found.
    pub merged_file: Option<PathBuf>,
    pub pages: Vec<PageReport>,
    pub metadata: DocumentMetadata,
    pub stats: ExtractionStats,
}
