//! Field extraction: submit the normalized image to a vision model and get
//! structured receipt data back.
//!
//! The extraction capability is polymorphic behind [`FieldExtractor`]:
//! production deployments use [`LlmExtractor`] (a real multimodal call),
//! tests and offline demo mode inject [`StubExtractor`]. The pipeline in
//! [`crate::process`] never branches on which one it holds.
//!
//! ## No retries, no defaults
//!
//! The model reply is parsed strictly. Malformed JSON, a rotation value
//! outside {0, 90, 180, 270}, a category outside the configured set, or a
//! confidence outside [0, 100] all fail the request with
//! [`ReceiptError::ExtractionError`]. Nothing is silently defaulted and
//! nothing is retried here — the only second chance in the whole pipeline
//! is the orchestrator's single orientation-triggered re-extraction.

use crate::error::ReceiptError;
use crate::pipeline::normalize::NormalizedImage;
use crate::prompts;
use crate::response::ReceiptFields;
use crate::schema::{ExtractionSchema, Rotation};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// The validated result of one extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Clockwise rotation the model says would make the receipt readable.
    pub rotation_hint: Rotation,
    /// The structured record conforming to the extraction schema.
    pub fields: ReceiptFields,
    /// Model confidence in [0, 100].
    pub confidence: f64,
}

/// An external capability that reads a receipt image and returns structured
/// data matching the extraction schema.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(
        &self,
        image: &NormalizedImage,
        schema: &ExtractionSchema,
    ) -> Result<Extraction, ReceiptError>;
}

// ── Live extractor ───────────────────────────────────────────────────────

/// Field extractor backed by a real multimodal model.
pub struct LlmExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl FieldExtractor for LlmExtractor {
    /// ## Message layout
    ///
    /// 1. **System message** — the extraction prompt: few-shot example plus
    ///    the enumerated constraints from the schema.
    /// 2. **User message** — the receipt JPEG as a base64 image attachment
    ///    with empty text. VLM APIs require at least one user turn; the
    ///    image carries all the actual content.
    async fn extract(
        &self,
        image: &NormalizedImage,
        schema: &ExtractionSchema,
    ) -> Result<Extraction, ReceiptError> {
        let messages = vec![
            ChatMessage::system(prompts::extraction_prompt(schema)),
            ChatMessage::user_with_images("", vec![to_image_data(image)]),
        ];

        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ReceiptError::ExtractionError {
                detail: format!("{e}"),
            })?;

        debug!(
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens,
            "extraction call completed"
        );

        parse_extraction(&response.content, schema)
    }
}

/// Encode the normalized JPEG as a base64 attachment for the VLM request.
///
/// `detail: "high"` instructs GPT-4-class models to use the full image tile
/// budget; receipts are dense with small print and the low-detail overview
/// tile loses line items and totals.
pub fn to_image_data(image: &NormalizedImage) -> ImageData {
    let b64 = STANDARD.encode(image.bytes());
    ImageData::new(b64, "image/jpeg").with_detail("high")
}

// ── Reply parsing ────────────────────────────────────────────────────────

/// The model reply, mirroring the few-shot example in
/// [`crate::prompts::EXAMPLE_RESPONSE`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtraction {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    rotation_hint: Rotation,
    data: ReceiptFields,
    confidence: f64,
}

/// Parse and validate a model reply against the schema.
///
/// Non-conforming replies are a hard failure; see module docs.
pub fn parse_extraction(
    content: &str,
    schema: &ExtractionSchema,
) -> Result<Extraction, ReceiptError> {
    let body = strip_json_fences(content);

    let raw: RawExtraction =
        serde_json::from_str(body).map_err(|e| ReceiptError::ExtractionError {
            detail: format!("model reply is not schema-conforming JSON: {e}"),
        })?;

    if !schema.allows_category(&raw.data.category) {
        return Err(ReceiptError::ExtractionError {
            detail: format!(
                "category '{}' is not in the allowed set [{}]",
                raw.data.category,
                schema.categories.join(", ")
            ),
        });
    }

    if !raw.confidence.is_finite() || !(0.0..=100.0).contains(&raw.confidence) {
        return Err(ReceiptError::ExtractionError {
            detail: format!("confidence {} is outside [0, 100]", raw.confidence),
        });
    }

    Ok(Extraction {
        rotation_hint: raw.rotation_hint,
        fields: raw.data,
        confidence: raw.confidence,
    })
}

/// Strip an outer markdown code fence if the model disobeyed the prompt and
/// wrapped its JSON in one. Anything beyond that is left untouched — partial
/// repair would mask non-conforming output.
fn strip_json_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed,
    };
    inner.trim_end().trim_end_matches("```").trim()
}

// ── Stub extractor ───────────────────────────────────────────────────────

/// Deterministic extractor for tests and offline demo mode.
///
/// The browser client shipped with a simulator long before the real model
/// integration existed, so a canned-data mode is a product feature here, not
/// just test scaffolding. Scripted responses are consumed in order; once the
/// script is exhausted (or when constructed with [`StubExtractor::new`]) the
/// stub returns [`StubExtractor::sample_extraction`].
#[derive(Default)]
pub struct StubExtractor {
    scripted: Mutex<VecDeque<Result<Extraction, String>>>,
    calls: AtomicUsize,
    seen_dimensions: Mutex<Vec<(u32, u32)>>,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub that replays `responses` in order, then falls back to the
    /// sample extraction. `Err(message)` entries fail the call with an
    /// [`ReceiptError::ExtractionError`].
    pub fn scripted(responses: impl IntoIterator<Item = Result<Extraction, String>>) -> Self {
        Self {
            scripted: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Number of `extract` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(width, height)` of every image this stub was shown, in call order.
    pub fn seen_dimensions(&self) -> Vec<(u32, u32)> {
        self.seen_dimensions.lock().unwrap().clone()
    }

    /// The canned record the simulator mode returns.
    pub fn sample_extraction() -> Extraction {
        Extraction {
            rotation_hint: Rotation::None,
            fields: ReceiptFields {
                merchant: "Delta Airlines".into(),
                amount: 1005.1,
                currency: "USD".into(),
                date: "2025-07-23".into(),
                hour: "13:20".into(),
                category: "transport".into(),
                description: "Delta Airlines flight from New York to Los Angeles".into(),
                payment_method: "Credit Card".into(),
                receipt_number: "RCP-1230121".into(),
                location: "New York, NY".into(),
                image_url: None,
            },
            confidence: 90.0,
        }
    }
}

#[async_trait]
impl FieldExtractor for StubExtractor {
    async fn extract(
        &self,
        image: &NormalizedImage,
        _schema: &ExtractionSchema,
    ) -> Result<Extraction, ReceiptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_dimensions
            .lock()
            .unwrap()
            .push((image.width(), image.height()));

        match self.scripted.lock().unwrap().pop_front() {
            Some(Ok(extraction)) => Ok(extraction),
            Some(Err(detail)) => Err(ReceiptError::ExtractionError { detail }),
            None => Ok(Self::sample_extraction()),
        }
    }
}
