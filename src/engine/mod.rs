//! Table-recognition engines.
//!
//! An engine turns one page of a PDF into zero or more [`RawTable`]s. The
//! engines share nothing beyond that contract:
//!
//! | Engine | Backend | Needs |
//! |--------|---------|-------|
//! | [`vision::VisionEngine`] | vision LLM (default: Mistral pixtral) over a rendered PNG | pdfium, provider API key |
//! | [`ocr::OcrEngine`] | Mistral document OCR, Markdown tables | `MISTRAL_API_KEY` |
//! | `tabula::TabulaEngine` | tabula-java through JNI (feature `tabula`) | a JVM and the tabula jar |
//!
//! [`AnyEngine`] picks one from an [`ExtractionConfig`].

pub mod ocr;
#[cfg(feature = "tabula")]
pub mod tabula;
pub mod vision;

use crate::config::{EngineKind, ExtractionConfig};
use crate::error::{AlicePdfError, PageError};
use crate::table::RawTable;
use std::future::Future;
use std::path::{Path, PathBuf};

/// The PDF being processed.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub page_count: usize,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, page_count: usize) -> Self {
        Self {
            path: path.into(),
            page_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A backend that recognises tables on a single page.
pub trait TableEngine: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Extract the tables on page `page_index` (0-based).
    ///
    /// A failure here is confined to the page: the caller logs it and moves
    /// on. An empty `Vec` means the page has no tables.
    fn extract_page(
        &self,
        doc: &SourceDocument,
        page_index: usize,
    ) -> impl Future<Output = Result<Vec<RawTable>, PageError>> + Send;
}

/// Runtime choice between the compiled-in engines.
pub enum AnyEngine {
    Vision(vision::VisionEngine),
    Ocr(ocr::OcrEngine),
    #[cfg(feature = "tabula")]
    Tabula(tabula::TabulaEngine),
}

impl AnyEngine {
    /// Build the engine selected by `config.engine`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, AlicePdfError> {
        match config.engine {
            EngineKind::Vision => vision::VisionEngine::from_config(config).map(AnyEngine::Vision),
            EngineKind::Ocr => ocr::OcrEngine::from_config(config).map(AnyEngine::Ocr),
            #[cfg(feature = "tabula")]
            EngineKind::Tabula => tabula::TabulaEngine::from_config(config).map(AnyEngine::Tabula),
            #[cfg(not(feature = "tabula"))]
            EngineKind::Tabula => Err(AlicePdfError::EngineUnavailable {
                engine: "tabula".into(),
                reason: "this build was compiled without the `tabula` feature".into(),
            }),
        }
    }
}

impl TableEngine for AnyEngine {
    fn name(&self) -> &'static str {
        match self {
            AnyEngine::Vision(e) => e.name(),
            AnyEngine::Ocr(e) => e.name(),
            #[cfg(feature = "tabula")]
            AnyEngine::Tabula(e) => e.name(),
        }
    }

    async fn extract_page(
        &self,
        doc: &SourceDocument,
        page_index: usize,
    ) -> Result<Vec<RawTable>, PageError> {
        match self {
            AnyEngine::Vision(e) => e.extract_page(doc, page_index).await,
            AnyEngine::Ocr(e) => e.extract_page(doc, page_index).await,
            #[cfg(feature = "tabula")]
            AnyEngine::Tabula(e) => e.extract_page(doc, page_index).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "tabula"))]
    #[test]
    fn tabula_unavailable_without_feature() {
        let config = ExtractionConfig::builder()
            .engine(EngineKind::Tabula)
            .build()
            .unwrap();
        let err = AnyEngine::from_config(&config).err().expect("must fail");
        assert!(matches!(err, AlicePdfError::EngineUnavailable { .. }), "{err:?}");
    }

    #[test]
    fn ocr_without_key_is_missing_api_key() {
        let config = ExtractionConfig::builder()
            .engine(EngineKind::Ocr)
            .build()
            .unwrap();
        let err = AnyEngine::from_config(&config).err().expect("must fail");
        assert!(matches!(err, AlicePdfError::MissingApiKey), "{err:?}");
    }

    #[test]
    fn ocr_with_key_builds() {
        let config = ExtractionConfig::builder()
            .engine(EngineKind::Ocr)
            .api_key("test_key")
            .build()
            .unwrap();
        let engine = AnyEngine::from_config(&config).expect("engine");
        assert_eq!(engine.name(), "ocr");
    }
}
