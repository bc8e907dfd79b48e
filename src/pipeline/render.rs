//! PDF rasterisation and metadata via pdfium.
//!
//! pdfium is a blocking C++ library, so every call here runs on
//! `tokio::task::spawn_blocking`. `Pdfium` is not `Send`, so each blocking
//! call binds its own instance; `PDFIUM_LIB_PATH` may point at the directory
//! holding the library, otherwise the system library is used.
//!
//! The render scale is `dpi / 72` (PDF user space is 72 units per inch), with
//! `max_rendered_pixels` capping either dimension so a poster-sized page
//! cannot produce a gigantic image.

use crate::error::AlicePdfError;
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory containing libpdfium; overrides the system library lookup.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium, preferring `PDFIUM_LIB_PATH` over the system library.
///
/// Must be called on the thread that uses the returned instance.
pub fn bind_pdfium() -> Result<Pdfium, AlicePdfError> {
    let dir = std::env::var(PDFIUM_LIB_PATH_ENV).ok();
    bind_pdfium_from(dir.as_deref().filter(|d| !d.is_empty()))
}

fn bind_pdfium_from(dir: Option<&str>) -> Result<Pdfium, AlicePdfError> {
    let bindings = match dir {
        Some(dir) => {
            debug!("Binding pdfium from {}", dir);
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AlicePdfError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Extract document metadata (page count, title, …) without rendering.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, AlicePdfError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| AlicePdfError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, AlicePdfError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let page_count = document.pages().len() as usize;
    info!("PDF loaded: {} pages", page_count);

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count,
        pdf_version: format!("{:?}", document.version()),
    })
}

/// Options for rendering a single page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_pixels: u32,
    pub password: Option<String>,
}

/// Rasterise one page (0-indexed) of a PDF.
pub async fn render_page(
    pdf_path: &Path,
    page_index: usize,
    options: &RenderOptions,
) -> Result<DynamicImage, AlicePdfError> {
    let path: PathBuf = pdf_path.to_path_buf();
    let options = options.clone();

    tokio::task::spawn_blocking(move || render_page_blocking(&path, page_index, &options))
        .await
        .map_err(|e| AlicePdfError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_page_blocking(
    pdf_path: &Path,
    page_index: usize,
    options: &RenderOptions,
) -> Result<DynamicImage, AlicePdfError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, options.password.as_deref())?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.dpi as f32 / 72.0)
        .set_maximum_width(options.max_pixels as i32)
        .set_maximum_height(options.max_pixels as i32);

    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| AlicePdfError::Internal(format!("page {}: {:?}", page_index + 1, e)))?;

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| AlicePdfError::Internal(format!("page {}: {:?}", page_index + 1, e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_index + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, AlicePdfError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                AlicePdfError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                AlicePdfError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            AlicePdfError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_from_empty_dir_fails_with_binding_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = bind_pdfium_from(dir.path().to_str()).err().expect("no library there");
        assert!(matches!(err, AlicePdfError::PdfiumBindingFailed(_)));
    }
}
