//! Vision-model engine: render the page, ask the model for JSON tables.
//!
//! Each page becomes one chat request: the table prompt plus the page as a
//! base64 PNG. The reply is expected to hold `{"tables": [...]}`, possibly
//! wrapped in a Markdown fence; see [`crate::pipeline::response`].
//!
//! Requests are strictly sequential with a fixed pause before each one, which
//! keeps a free-tier Mistral key under its one-request-per-second limit.
//! There is no retry: a failed page is reported and the run moves on.

use crate::config::ExtractionConfig;
use crate::credentials::API_KEY_ENV;
use crate::engine::{SourceDocument, TableEngine};
use crate::error::{AlicePdfError, PageError};
use crate::pipeline::render::{self, RenderOptions};
use crate::pipeline::{encode, response};
use crate::prompts::default_table_prompt;
use crate::table::RawTable;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, MistralProvider, ProviderFactory,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

const ENGINE_NAME: &str = "vision";

/// Embedding model the Mistral provider is built with; never used here.
const MISTRAL_EMBEDDING_MODEL: &str = "mistral-embed";

pub struct VisionEngine {
    provider: Arc<dyn LLMProvider>,
    model: String,
    prompt: String,
    render: RenderOptions,
    temperature: f32,
    max_tokens: usize,
    rate_limit: Duration,
}

impl VisionEngine {
    /// Build the engine, creating the LLM provider unless one was supplied.
    ///
    /// The default `mistral` provider takes `config.api_key`, falling back to
    /// `MISTRAL_API_KEY`; a missing key fails here, before any page is
    /// rendered. Other providers configure themselves from their own
    /// environment variables.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, AlicePdfError> {
        let provider = match config.provider {
            Some(ref provider) => Arc::clone(provider),
            None if config.needs_api_key() => {
                let env_key = std::env::var(API_KEY_ENV).ok();
                let key = mistral_key(config.api_key.as_deref(), env_key.as_deref())?;
                create_mistral_provider(key, config.effective_model())?
            }
            None => create_vision_provider(&config.provider_name, config.effective_model())?,
        };
        Ok(Self::with_provider(provider, config))
    }

    /// Build the engine around an existing provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            model: config.effective_model().to_string(),
            prompt: config
                .custom_prompt
                .clone()
                .unwrap_or_else(default_table_prompt),
            render: RenderOptions {
                dpi: config.dpi,
                max_pixels: config.max_rendered_pixels,
                password: config.password.clone(),
            },
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn render_image(
        &self,
        doc: &SourceDocument,
        page_index: usize,
    ) -> Result<ImageData, PageError> {
        let page = page_index + 1;
        let image = render::render_page(doc.path(), page_index, &self.render)
            .await
            .map_err(|e| PageError::RenderFailed {
                page,
                detail: e.to_string(),
            })?;
        encode::encode_page(&image).map_err(|e| PageError::RenderFailed {
            page,
            detail: e.to_string(),
        })
    }

    /// Send one page image with the prompt and parse the reply.
    async fn request_tables(
        &self,
        page: usize,
        image: ImageData,
    ) -> Result<Vec<RawTable>, PageError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user_with_images(
            self.prompt.as_str(),
            vec![image],
        )];
        let options = self.build_options();

        sleep(self.rate_limit).await;
        info!("  Sending page {} to {}...", page, self.model);

        let reply = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| PageError::RequestFailed {
                page,
                engine: ENGINE_NAME.to_string(),
                detail: format!("{e}"),
            })?;

        debug!(
            "Page {}: {} input tokens, {} output tokens, {:?}",
            page,
            reply.prompt_tokens,
            reply.completion_tokens,
            start.elapsed()
        );

        match response::parse_table_response(&reply.content) {
            Ok(set) => Ok(set.tables),
            Err(e) => {
                error!("  JSON parsing error: {}", e);
                error!("  Response: {}", reply.content);
                Err(PageError::InvalidResponse {
                    page,
                    engine: ENGINE_NAME.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }
}

impl TableEngine for VisionEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn extract_page(
        &self,
        doc: &SourceDocument,
        page_index: usize,
    ) -> Result<Vec<RawTable>, PageError> {
        let image = self.render_image(doc, page_index).await?;
        self.request_tables(page_index + 1, image).await
    }
}

/// The configured key, else the environment's; blank values count as unset.
fn mistral_key(configured: Option<&str>, env: Option<&str>) -> Result<String, AlicePdfError> {
    [configured, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or(AlicePdfError::MissingApiKey)
}

fn create_mistral_provider(
    api_key: String,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AlicePdfError> {
    let provider = MistralProvider::new(
        api_key,
        model.to_string(),
        MISTRAL_EMBEDDING_MODEL.to_string(),
        None,
    )
    .map_err(|e| AlicePdfError::ProviderNotConfigured {
        provider: "mistral".to_string(),
        hint: format!("{e}"),
    })?;
    Ok(Arc::new(provider))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AlicePdfError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AlicePdfError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
