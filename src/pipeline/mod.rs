//! Pipeline stages shared by the engines.
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ (engine) ──▶ response
//! (URL/path) (pdfium)  (base64)              (JSON / Markdown → tables)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]   — page count, metadata and page rasterisation via pdfium
//! 3. [`encode`]   — base64 PNG pages and PDF data URIs for request bodies
//! 4. [`response`] — turn engine replies into [`crate::table::TableSet`]s

pub mod encode;
pub mod input;
pub mod render;
pub mod response;
