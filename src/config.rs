//! Configuration types for receipt processing.
//!
//! All pipeline behaviour is controlled through [`ProcessingConfig`], built
//! via its [`ProcessingConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across requests, serialise them for
//! logging, and diff two deployments to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ReceiptError;
use crate::pipeline::extract::FieldExtractor;
use crate::schema::{ExtractionSchema, DEFAULT_CATEGORIES};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the receipt processing pipeline.
///
/// Built via [`ProcessingConfig::builder()`] or using
/// [`ProcessingConfig::default()`].
///
/// # Example
/// ```rust
/// use receipt2json::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .max_dimension(2048)
///     .jpeg_quality(80)
///     .receipts_dir("public/receipts")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Maximum width or height of the normalized image in pixels. Default: 2560.
    ///
    /// Receipts photographed on modern phones come in at 4000+ px; the VLM
    /// reads 2560 px just as well and the JPEG is a quarter of the size.
    /// The image is never upscaled to reach this bound.
    pub max_dimension: u32,

    /// JPEG quality for the normalized image, 1–100. Default: 70.
    ///
    /// A deliberate bandwidth/storage trade-off: 70 keeps thermal-printer
    /// text legible for both the VLM and the human reviewing the stored
    /// artifact, at roughly a third of the quality-90 file size.
    pub jpeg_quality: u8,

    /// Maximum accepted inbound payload in bytes. Default: 10 MiB.
    ///
    /// Mirrors the transfer limit of the socket transport the pipeline was
    /// built for; anything larger is rejected before decoding begins.
    pub max_payload_bytes: usize,

    /// Directory where normalized receipt images are persisted.
    /// Default: `dist/receipts` (resolved by the static file server).
    pub receipts_dir: PathBuf,

    /// URL path prefix under which the static server exposes `receipts_dir`.
    /// Default: `/receipts`.
    pub public_prefix: String,

    /// Closed set of allowed expense categories, injected into the
    /// extraction schema. Default: the six-category list the client renders.
    pub categories: Vec<String>,

    /// VLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// VLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `extractor`, the provider is auto-detected from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed field extractor. Takes precedence over
    /// `provider_name`; inject [`crate::pipeline::extract::StubExtractor`]
    /// here for tests and offline demo mode.
    pub extractor: Option<Arc<dyn FieldExtractor>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what is printed on the
    /// receipt — exactly what you want for transcription.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    ///
    /// The structured reply is ~200 tokens; 1024 leaves room for verbose
    /// merchants and long line-item descriptions without silent truncation.
    pub max_tokens: usize,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2560,
            jpeg_quality: 70,
            max_payload_bytes: 10 * 1024 * 1024,
            receipts_dir: PathBuf::from("dist/receipts"),
            public_prefix: "/receipts".to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            model: None,
            provider_name: None,
            extractor: None,
            temperature: 0.1,
            max_tokens: 1024,
            download_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("receipts_dir", &self.receipts_dir)
            .field("public_prefix", &self.public_prefix)
            .field("categories", &self.categories)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn FieldExtractor>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// The extraction schema derived from this config's injected lists.
    pub fn schema(&self) -> ExtractionSchema {
        ExtractionSchema::with_categories(self.categories.clone())
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(256);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn max_payload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_payload_bytes = bytes;
        self
    }

    pub fn receipts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.receipts_dir = dir.into();
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = prefix.into();
        self
    }

    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.config.categories = categories;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.config.extractor = Some(extractor);
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

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, ReceiptError> {
        let c = &self.config;
        if c.categories.is_empty() {
            return Err(ReceiptError::InvalidConfig(
                "Category list must not be empty".into(),
            ));
        }
        if c.max_payload_bytes == 0 {
            return Err(ReceiptError::InvalidConfig(
                "max_payload_bytes must be ≥ 1".into(),
            ));
        }
        if c.public_prefix.is_empty() || !c.public_prefix.starts_with('/') {
            return Err(ReceiptError::InvalidConfig(format!(
                "public_prefix must start with '/', got '{}'",
                c.public_prefix
            )));
        }
        Ok(self.config)
    }
}
