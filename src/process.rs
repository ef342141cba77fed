//! The pipeline orchestrator: normalize → extract → (rotate once) → store.
//!
//! ## The orientation feedback loop
//!
//! The normalizer's landscape heuristic guesses the upright orientation
//! before the model ever sees the image. When the guess is wrong the
//! extractor reports a `rotationHint`; the orchestrator applies it and
//! re-runs extraction **exactly once**. A hint from the second extraction is
//! logged and ignored — there is no unbounded loop, and the extractor is
//! invoked at most twice per request.
//!
//! ## Error boundary
//!
//! [`process`] is the fallible core for library callers.
//! [`process_receipt`] is the transport-facing boundary: it never fails,
//! converting every pipeline error into the wire envelope
//! `{ "success": false, "error": "<message>" }`. Whatever adapter fronts
//! the pipeline (socket handler, HTTP endpoint, CLI) just forwards that
//! envelope; the pipeline itself carries no transport-specific code.

use crate::config::ProcessingConfig;
use crate::error::ReceiptError;
use crate::pipeline::extract::{FieldExtractor, LlmExtractor};
use crate::pipeline::{normalize, store};
use crate::response::{ProcessedReceipt, ProcessingStats, ReceiptResponse};
use crate::schema::Rotation;
use edgequake_llm::ProviderFactory;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without an explicit model.
const DEFAULT_MODEL: &str = "gpt-4o";

/// How many receipts a batch processes concurrently.
///
/// Each item is its own independent pipeline run; the bound exists to keep
/// a large batch from opening dozens of simultaneous VLM calls.
const BATCH_CONCURRENCY: usize = 4;

/// Run the full pipeline on a raw image payload.
///
/// # Arguments
/// * `raw`    — the uploaded image bytes (JPEG, PNG, HEIC, ...)
/// * `config` — processing configuration
///
/// # Errors
/// Any [`ReceiptError`]: oversized payload, undecodable image, failed HEIC
/// conversion, extraction failure or non-conforming model output, or a
/// storage write failure. Errors are terminal for the request; the caller
/// must resubmit.
pub async fn process(
    raw: &[u8],
    config: &ProcessingConfig,
) -> Result<ProcessedReceipt, ReceiptError> {
    let total_start = Instant::now();

    if raw.len() > config.max_payload_bytes {
        return Err(ReceiptError::PayloadTooLarge {
            size: raw.len(),
            limit: config.max_payload_bytes,
        });
    }

    let extractor = resolve_extractor(config)?;
    let schema = config.schema();

    // ── Step 1: Normalize ────────────────────────────────────────────────
    // Decode/resize/encode is CPU-bound; keep it off the async runtime.
    let normalize_start = Instant::now();
    let image = {
        let raw = raw.to_vec();
        let cfg = config.clone();
        tokio::task::spawn_blocking(move || normalize::normalize(&raw, &cfg))
            .await
            .map_err(|e| ReceiptError::Internal(format!("normalize task panicked: {e}")))??
    };
    let normalize_duration_ms = normalize_start.elapsed().as_millis() as u64;
    info!(
        width = image.width(),
        height = image.height(),
        size = image.bytes().len(),
        "normalized receipt image in {}ms",
        normalize_duration_ms
    );

    // ── Step 2: Extract ──────────────────────────────────────────────────
    let extract_start = Instant::now();
    let first = extractor.extract(&image, &schema).await?;
    debug!(
        rotation_hint = first.rotation_hint.degrees(),
        confidence = first.confidence,
        "first extraction complete"
    );

    // ── Step 3: Orientation feedback, at most one retry ──────────────────
    let (final_image, final_extraction, extraction_calls, rotation_applied) =
        if first.rotation_hint != Rotation::None {
            let hint = first.rotation_hint;
            info!(
                degrees = hint.degrees(),
                "extractor requested rotation, re-running extraction once"
            );

            let rotated = {
                let img = image.clone();
                let quality = config.jpeg_quality;
                tokio::task::spawn_blocking(move || normalize::rotate(&img, hint, quality))
                    .await
                    .map_err(|e| ReceiptError::Internal(format!("rotate task panicked: {e}")))??
            };

            let second = extractor.extract(&rotated, &schema).await?;
            if second.rotation_hint != Rotation::None {
                warn!(
                    degrees = second.rotation_hint.degrees(),
                    "second extraction still requests rotation; ignoring"
                );
            }
            (rotated, second, 2u8, hint)
        } else {
            (image, first, 1u8, Rotation::None)
        };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Step 4: Persist the image the final extraction actually saw ──────
    let artifact = store::store(&final_image, &final_extraction.fields.description, config).await?;

    let mut fields = final_extraction.fields;
    fields.image_url = Some(artifact.url.clone());

    let stats = ProcessingStats {
        extraction_calls,
        rotation_applied,
        normalize_duration_ms,
        extract_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        calls = stats.extraction_calls,
        url = %artifact.url,
        "receipt processed in {}ms",
        stats.total_duration_ms
    );

    Ok(ProcessedReceipt {
        fields,
        confidence: final_extraction.confidence,
        artifact,
        stats,
    })
}

/// Transport-facing handler: run the pipeline and always return the wire
/// envelope.
///
/// On failure the envelope carries the triggering error's display message —
/// never a stack trace or debug formatting.
pub async fn process_receipt(raw: &[u8], config: &ProcessingConfig) -> ReceiptResponse {
    match process(raw, config).await {
        Ok(receipt) => receipt.into_response(),
        Err(e) => {
            warn!(error = %e, "receipt processing failed");
            ReceiptResponse::failure(e.to_string())
        }
    }
}

/// Process a batch of independent receipt payloads.
///
/// Each payload runs its own full pipeline; one bad image does not affect
/// the others. Responses come back in input order.
pub async fn process_batch(
    payloads: Vec<Vec<u8>>,
    config: &ProcessingConfig,
) -> Vec<ReceiptResponse> {
    let total = payloads.len();
    info!(total, "processing receipt batch");

    stream::iter(
        payloads
            .into_iter()
            .map(|payload| async move { process_receipt(&payload, config).await }),
    )
    .buffered(BATCH_CONCURRENCY)
    .collect()
    .await
}

/// Resolve the field extractor, from most-specific to least-specific.
///
/// 1. **Injected extractor** (`config.extractor`) — the caller constructed
///    the capability entirely: a stub in tests, or a provider with custom
///    middleware in production.
/// 2. **Named provider + model** (`config.provider_name`) — reads the
///    corresponding API key from the environment via `ProviderFactory`.
/// 3. **Full auto-detection** — the factory scans the known API key
///    variables and picks the first available provider.
fn resolve_extractor(config: &ProcessingConfig) -> Result<Arc<dyn FieldExtractor>, ReceiptError> {
    if let Some(ref extractor) = config.extractor {
        return Ok(Arc::clone(extractor));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ReceiptError::ExtractorNotConfigured {
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(LlmExtractor::new(
            provider,
            config.temperature,
            config.max_tokens,
        )));
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReceiptError::ExtractorNotConfigured {
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                 Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or inject an extractor.\n\
                 Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(LlmExtractor::new(
        provider,
        config.temperature,
        config.max_tokens,
    )))
}
