//! Error types for the alice-pdf library.
//!
//! Two error types reflect two failure modes:
//!
//! * [`AlicePdfError`] — **Fatal**: extraction cannot start or cannot finish
//!   (bad input file, missing API key, unreadable schema, output directory not
//!   writable). Returned as `Err(AlicePdfError)` from [`crate::extract_tables`].
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render glitch, API
//!   error, reply that is not valid JSON). It is logged, recorded in
//!   [`crate::output::PageReport`], and the run moves on to the next page.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the alice-pdf library.
#[derive(Debug, Error)]
pub enum AlicePdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The `--pages` string could not be parsed.
    #[error("Invalid page selection '{input}': {reason}")]
    InvalidPageRange { input: String, reason: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No API key could be found for an engine that needs one.
    #[error(
        "API key required. Set MISTRAL_API_KEY env var, use --api-key, or add to .env file"
    )]
    MissingApiKey,

    /// The configured LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The requested engine was not compiled into this build or cannot start.
    #[error("Engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    // ── Schema errors ─────────────────────────────────────────────────────
    /// The table schema file does not exist.
    #[error("Schema file not found: '{path}'")]
    SchemaNotFound { path: PathBuf },

    /// The table schema file exists but is not a usable schema.
    #[error("Invalid table schema '{path}': {detail}")]
    InvalidSchema { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not prepare the output directory.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium system-wide or set PDFIUM_LIB_PATH to the directory that contains it."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The page contributes no tables; extraction continues with the next page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation or image encoding failed.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The engine request failed (network, HTTP status, provider error).
    #[error("Page {page}: {engine} request failed: {detail}")]
    RequestFailed {
        page: usize,
        engine: String,
        detail: String,
    },

    /// The engine answered but the reply held no parseable table data.
    #[error("Page {page}: could not parse {engine} response: {detail}")]
    InvalidResponse {
        page: usize,
        engine: String,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::RequestFailed { page, .. }
            | PageError::InvalidResponse { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_mentions_all_sources() {
        let msg = AlicePdfError::MissingApiKey.to_string();
        assert!(msg.contains("MISTRAL_API_KEY"), "got: {msg}");
        assert!(msg.contains("--api-key"), "got: {msg}");
        assert!(msg.contains(".env"), "got: {msg}");
    }

    #[test]
    fn invalid_page_range_display() {
        let e = AlicePdfError::InvalidPageRange {
            input: "3-1".into(),
            reason: "start must be <= end".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'3-1'"), "got: {msg}");
        assert!(msg.contains("start must be <= end"), "got: {msg}");
    }

    #[test]
    fn page_error_reports_its_page() {
        let e = PageError::InvalidResponse {
            page: 7,
            engine: "vision".into(),
            detail: "expected value at line 1 column 1".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().starts_with("Page 7:"));
        assert!(e.to_string().contains("vision"));
    }

    #[test]
    fn request_failed_display() {
        let e = PageError::RequestFailed {
            page: 2,
            engine: "ocr".into(),
            detail: "HTTP 401 Unauthorized".into(),
        };
        assert!(e.to_string().contains("ocr request failed"));
        assert!(e.to_string().contains("401"));
    }
}
