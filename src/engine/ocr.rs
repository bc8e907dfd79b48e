//! Cloud OCR engine: Mistral document OCR.
//!
//! The whole PDF is sent as a `data:` URI together with the single page index
//! wanted; the service answers with the page transcribed to Markdown, and the
//! pipe tables in it become [`RawTable`]s. No rendering happens locally, so
//! this engine does not need pdfium beyond the page count.

use crate::config::ExtractionConfig;
use crate::engine::{SourceDocument, TableEngine};
use crate::error::{AlicePdfError, PageError};
use crate::pipeline::{encode, response};
use crate::table::RawTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

pub const MISTRAL_OCR_URL: &str = "https://api.mistral.ai/v1/ocr";

const ENGINE_NAME: &str = "ocr";

/// Longest slice of an error body kept in a [`PageError`].
const MAX_ERROR_BODY: usize = 300;

pub struct OcrEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    rate_limit: Duration,
    // The same document is sent for every page; encode it once.
    document: OnceCell<(PathBuf, String)>,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument<'a>,
    pages: Vec<usize>,
    include_image_base64: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OcrDocument<'a> {
    DocumentUrl { document_url: &'a str },
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    index: usize,
    #[serde(default)]
    markdown: String,
}

impl OcrEngine {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, AlicePdfError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(AlicePdfError::MissingApiKey)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| AlicePdfError::EngineUnavailable {
                engine: ENGINE_NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: MISTRAL_OCR_URL.to_string(),
            api_key,
            model: config.effective_model().to_string(),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
            document: OnceCell::new(),
        })
    }

    /// Point the engine at another OCR endpoint (a proxy or a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn document_uri(&self, doc: &SourceDocument) -> std::io::Result<String> {
        let cached = self
            .document
            .get_or_try_init(|| async {
                let uri = read_data_uri(doc).await?;
                Ok::<_, std::io::Error>((doc.path.clone(), uri))
            })
            .await?;
        if cached.0 == doc.path {
            Ok(cached.1.clone())
        } else {
            read_data_uri(doc).await
        }
    }
}

async fn read_data_uri(doc: &SourceDocument) -> std::io::Result<String> {
    let bytes = tokio::fs::read(&doc.path).await?;
    debug!("Encoding {} bytes of PDF for OCR", bytes.len());
    Ok(encode::pdf_data_uri(&bytes))
}

fn build_request<'a>(model: &'a str, document_url: &'a str, page_index: usize) -> OcrRequest<'a> {
    OcrRequest {
        model,
        document: OcrDocument::DocumentUrl { document_url },
        pages: vec![page_index],
        include_image_base64: false,
    }
}

/// Markdown of the requested page, or of the only page returned.
fn page_markdown(response: OcrResponse, page_index: usize) -> Option<String> {
    let mut pages = response.pages;
    match pages.iter().position(|p| p.index == page_index) {
        Some(i) => Some(pages.swap_remove(i).markdown),
        None if pages.len() == 1 => pages.pop().map(|p| p.markdown),
        None => None,
    }
}

impl TableEngine for OcrEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn extract_page(
        &self,
        doc: &SourceDocument,
        page_index: usize,
    ) -> Result<Vec<RawTable>, PageError> {
        let page = page_index + 1;
        let failed = |detail: String| PageError::RequestFailed {
            page,
            engine: ENGINE_NAME.to_string(),
            detail,
        };

        let document_url = self
            .document_uri(doc)
            .await
            .map_err(|e| failed(format!("cannot read {}: {e}", doc.path.display())))?;
        let request = build_request(&self.model, &document_url, page_index);

        sleep(self.rate_limit).await;
        info!("  Sending page {} to {}...", page, self.model);

        let http = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = http.status();
        if !status.is_success() {
            let body = http.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(failed(format!("HTTP {status}: {body}")));
        }

        let parsed: OcrResponse = http.json().await.map_err(|e| PageError::InvalidResponse {
            page,
            engine: ENGINE_NAME.to_string(),
            detail: e.to_string(),
        })?;

        let Some(markdown) = page_markdown(parsed, page_index) else {
            warn!("  OCR response has no page {}", page);
            return Ok(Vec::new());
        };
        debug!("  OCR markdown for page {}: {} chars", page, markdown.len());

        Ok(response::parse_markdown_tables(&markdown))
    }
}
