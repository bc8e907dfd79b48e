//! Configuration types for table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The builder clamps numeric knobs to
//! sane ranges and `build()` validates what cannot be clamped.

use crate::error::AlicePdfError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default vision model: Mistral's pixtral, the model the CLI has always used.
pub const DEFAULT_VISION_MODEL: &str = "pixtral-12b-2409";

/// Default model for the Mistral document OCR endpoint.
pub const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";

/// Default LLM provider for the vision engine.
pub const DEFAULT_PROVIDER: &str = "mistral";

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use alice_pdf::{EngineKind, ExtractionConfig};
///
/// let config = ExtractionConfig::builder()
///     .engine(EngineKind::Vision)
///     .pages("1-3,5".parse().unwrap())
///     .dpi(200)
///     .merge(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which backend recognises the tables. Default: [`EngineKind::Vision`].
    pub engine: EngineKind,

    /// Pages to process. Default: all pages.
    pub pages: PageSelection,

    /// Model identifier. If None, uses [`EngineKind::default_model`].
    pub model: Option<String>,

    /// LLM provider name for the vision engine (e.g. "mistral", "openai").
    pub provider_name: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// API key for engines that talk to Mistral directly (OCR engine).
    pub api_key: Option<String>,

    /// Rendering DPI for the vision engine. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Cap on either rendered image dimension, in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Sampling temperature for the vision model. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the vision model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Fixed delay before every remote call, in milliseconds. Default: 1200.
    ///
    /// Mistral's free tier allows one request per second; the extra 200 ms
    /// keeps sequential page calls under that limit.
    pub rate_limit_ms: u64,

    /// Per-request timeout for the OCR endpoint, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom prompt describing the table structure. If None, uses
    /// [`crate::prompts::default_table_prompt`].
    pub custom_prompt: Option<String>,

    /// Also write every table into a single `<stem>_merged.csv`. Default: false.
    pub merge: bool,

    /// Remove the output directory before writing. Default: true.
    pub clear_output: bool,

    /// tabula-java jar used by the tabula engine.
    pub tabula_jar: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            pages: PageSelection::default(),
            model: None,
            provider_name: DEFAULT_PROVIDER.to_string(),
            provider: None,
            api_key: None,
            dpi: 150,
            max_rendered_pixels: 4000,
            temperature: 0.0,
            max_tokens: 4096,
            rate_limit_ms: 1200,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            custom_prompt: None,
            merge: false,
            clear_output: true,
            tabula_jar: None,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("engine", &self.engine)
            .field("pages", &self.pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("rate_limit_ms", &self.rate_limit_ms)
            .field("custom_prompt", &self.custom_prompt.is_some())
            .field("merge", &self.merge)
            .field("clear_output", &self.clear_output)
            .field("tabula_jar", &self.tabula_jar)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to use: the configured one, or the engine's default.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.engine.default_model())
    }

    /// Whether this run talks to Mistral and so needs `MISTRAL_API_KEY`.
    ///
    /// True for the OCR engine, and for the vision engine when it builds the
    /// default `mistral` provider itself.
    pub fn needs_api_key(&self) -> bool {
        match self.engine {
            EngineKind::Ocr => true,
            EngineKind::Vision => {
                self.provider.is_none() && self.provider_name.eq_ignore_ascii_case("mistral")
            }
            EngineKind::Tabula => false,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.config, f)
    }
}

impl ExtractionConfigBuilder {
    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn rate_limit_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.custom_prompt = Some(prompt.into());
        self
    }

    pub fn merge(mut self, v: bool) -> Self {
        self.config.merge = v;
        self
    }

    pub fn clear_output(mut self, v: bool) -> Self {
        self.config.clear_output = v;
        self
    }

    pub fn tabula_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tabula_jar = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, AlicePdfError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(AlicePdfError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(AlicePdfError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.provider_name.trim().is_empty() && c.provider.is_none() {
            return Err(AlicePdfError::InvalidConfig(
                "provider name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The backend that recognises tables on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Render each page and ask a vision LLM for JSON tables. (default)
    #[default]
    Vision,
    /// Send the PDF to Mistral's document OCR endpoint and parse the
    /// Markdown tables it returns.
    Ocr,
    /// Extract tables locally with tabula-java (cargo feature `tabula`).
    Tabula,
}

impl EngineKind {
    /// Model used when the caller does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            EngineKind::Vision => DEFAULT_VISION_MODEL,
            EngineKind::Ocr => DEFAULT_OCR_MODEL,
            EngineKind::Tabula => "tabula",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Vision => "vision",
            EngineKind::Ocr => "ocr",
            EngineKind::Tabula => "tabula",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = AlicePdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vision" | "mistral" => Ok(EngineKind::Vision),
            "ocr" => Ok(EngineKind::Ocr),
            "tabula" => Ok(EngineKind::Tabula),
            other => Err(AlicePdfError::InvalidConfig(format!(
                "unknown engine '{other}' (expected vision, ocr or tabula)"
            ))),
        }
    }
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages (default).
    #[default]
    All,
    /// Process these pages (1-indexed, in the order given).
    Pages(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed
    /// page numbers. Pages past `total_pages` are dropped.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Pages(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Requested pages (1-indexed) that do not exist in a document with
    /// `total_pages` pages.
    pub fn out_of_range(&self, total_pages: usize) -> Vec<usize> {
        match self {
            PageSelection::All => Vec::new(),
            PageSelection::Pages(pages) => {
                let mut missing: Vec<usize> =
                    pages.iter().copied().filter(|&p| p > total_pages).collect();
                missing.sort_unstable();
                missing.dedup();
                missing
            }
        }
    }
}

/// Highest page number accepted in a selection; pdfium indexes pages with a `u16`.
pub const MAX_PAGE_NUMBER: usize = u16::MAX as usize;

impl FromStr for PageSelection {
    type Err = AlicePdfError;

    /// Parse `"all"`, `"5"`, `"1-3"`, or comma-separated mixes like `"1-3,5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason: String| AlicePdfError::InvalidPageRange {
            input: s.to_string(),
            reason,
        };

        if input.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        let parse_page = |part: &str| -> Result<usize, AlicePdfError> {
            let page: usize = part
                .trim()
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a page number", part.trim())))?;
            if page < 1 {
                return Err(invalid("pages are 1-indexed, minimum is 1".into()));
            }
            if page > MAX_PAGE_NUMBER {
                return Err(invalid(format!(
                    "page {page} exceeds the maximum of {MAX_PAGE_NUMBER}"
                )));
            }
            Ok(page)
        };

        let mut pages = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((start, end)) = part.split_once('-') {
                let start = parse_page(start)?;
                let end = parse_page(end)?;
                if start > end {
                    return Err(invalid(format!(
                        "range '{start}-{end}': start must be <= end"
                    )));
                }
                pages.extend(start..=end);
            } else {
                pages.push(parse_page(part)?);
            }
        }

        if pages.is_empty() {
            return Err(invalid("no pages selected".into()));
        }
        Ok(PageSelection::Pages(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(s: &str) -> Vec<usize> {
        match s.parse::<PageSelection>().expect("valid selection") {
            PageSelection::Pages(p) => p,
            PageSelection::All => panic!("expected explicit pages for {s:?}"),
        }
    }

    #[test]
    fn api_key_needed_only_for_mistral_backends() {
        let vision = ExtractionConfig::default();
        assert!(vision.needs_api_key());

        let openai = ExtractionConfig::builder().provider_name("openai").build().unwrap();
        assert!(!openai.needs_api_key());

        let ocr = ExtractionConfig::builder().engine(EngineKind::Ocr).build().unwrap();
        assert!(ocr.needs_api_key());

        let tabula = ExtractionConfig::builder().engine(EngineKind::Tabula).build().unwrap();
        assert!(!tabula.needs_api_key());
    }

    #[test]
    fn parse_all_is_case_insensitive() {
        assert_eq!("all".parse::<PageSelection>().unwrap(), PageSelection::All);
        assert_eq!(" ALL ".parse::<PageSelection>().unwrap(), PageSelection::All);
    }

    #[test]
    fn parse_single_range_and_mixed() {
        assert_eq!(pages("5"), vec![5]);
        assert_eq!(pages("1-3"), vec![1, 2, 3]);
        assert_eq!(pages("1-3,5"), vec![1, 2, 3, 5]);
        assert_eq!(pages("1,3,5"), vec![1, 3, 5]);
        assert_eq!(pages(" 2 - 4 , 7 "), vec![2, 3, 4, 7]);
        assert_eq!(pages("4,,6,"), vec![4, 6]);
    }

    #[test]
    fn parse_rejects_bad_input() {
        for bad in ["0", "abc", "3-1", "1-", "-2", "", " , ", "1-x"] {
            let err = bad.parse::<PageSelection>().unwrap_err();
            assert!(
                matches!(err, AlicePdfError::InvalidPageRange { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_huge_page_numbers() {
        for bad in ["1-100000000000", "65536", "2-70000,3"] {
            let err = bad.parse::<PageSelection>().unwrap_err();
            assert!(
                matches!(err, AlicePdfError::InvalidPageRange { .. }),
                "{bad:?} gave {err:?}"
            );
        }
        assert_eq!(pages("65535"), vec![65535]);
    }

    #[test]
    fn to_indices_sorts_dedups_and_clips() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::All.to_indices(0), Vec::<usize>::new());
        assert_eq!(
            PageSelection::Pages(vec![5, 1, 3, 1]).to_indices(4),
            vec![0, 2]
        );
        assert_eq!(
            "1-3,5".parse::<PageSelection>().unwrap().to_indices(10),
            vec![0, 1, 2, 4]
        );
    }

    #[test]
    fn out_of_range_lists_missing_pages() {
        let sel = PageSelection::Pages(vec![2, 9, 7, 9]);
        assert_eq!(sel.out_of_range(5), vec![7, 9]);
        assert!(PageSelection::All.out_of_range(5).is_empty());
    }

    #[test]
    fn engine_kind_parses_aliases() {
        assert_eq!("vision".parse::<EngineKind>().unwrap(), EngineKind::Vision);
        assert_eq!("Mistral".parse::<EngineKind>().unwrap(), EngineKind::Vision);
        assert_eq!("ocr".parse::<EngineKind>().unwrap(), EngineKind::Ocr);
        assert_eq!("tabula".parse::<EngineKind>().unwrap(), EngineKind::Tabula);
        assert!("camelot".parse::<EngineKind>().is_err());
    }

    #[test]
    fn defaults_match_cli_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.engine, EngineKind::Vision);
        assert_eq!(config.pages, PageSelection::All);
        assert_eq!(config.effective_model(), "pixtral-12b-2409");
        assert_eq!(config.provider_name, "mistral");
        assert_eq!(config.dpi, 150);
        assert_eq!(config.rate_limit_ms, 1200);
        assert!(!config.merge);
        assert!(config.clear_output);
    }

    #[test]
    fn effective_model_follows_engine() {
        let config = ExtractionConfig::builder()
            .engine(EngineKind::Ocr)
            .build()
            .unwrap();
        assert_eq!(config.effective_model(), DEFAULT_OCR_MODEL);

        let config = ExtractionConfig::builder()
            .engine(EngineKind::Ocr)
            .model("mistral-ocr-2505")
            .build()
            .unwrap();
        assert_eq!(config.effective_model(), "mistral-ocr-2505");
    }

    #[test]
    fn builder_clamps_dpi() {
        let config = ExtractionConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(config.dpi, 400);
        let config = ExtractionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(config.dpi, 72);
    }

    #[test]
    fn build_rejects_zero_max_tokens() {
        let err = ExtractionConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, AlicePdfError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ExtractionConfig::builder()
            .api_key("sk-secret")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
