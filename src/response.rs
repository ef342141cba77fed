//! Response types: the wire contract returned to clients.
//!
//! The JSON shape is a compatibility contract with the browser client and
//! must not drift:
//!
//! ```json
//! { "success": true,
//!   "data": { "merchant": "...", "amount": 12.5, "currency": "USD",
//!             "date": "2025-07-23", "hour": "13:20", "category": "meals",
//!             "description": "...", "paymentMethod": "...",
//!             "receiptNumber": "...", "location": "...",
//!             "imageUrl": "/receipts/..." },
//!   "confidence": 92.0 }
//! ```
//!
//! or `{ "success": false, "error": "<message>" }`. Absent fields are
//! omitted entirely, never serialized as `null`.

use crate::pipeline::store::StoredArtifact;
use crate::schema::Rotation;
use serde::{Deserialize, Serialize};

/// Structured fields extracted from a receipt photo.
///
/// Field names serialize in camelCase to match the client contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptFields {
    pub merchant: String,
    pub amount: f64,
    pub currency: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Time of day, `HH:MM`.
    pub hour: String,
    /// One of the enumerated categories from the extraction schema.
    pub category: String,
    pub description: String,
    pub payment_method: String,
    pub receipt_number: String,
    pub location: String,
    /// Public URL of the persisted image. Set by the orchestrator after the
    /// artifact store succeeds; always references the buffer that was
    /// actually persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The envelope returned to the client for every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ReceiptFields>,
    /// Extraction confidence in [0, 100].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReceiptResponse {
    /// A successful response carrying extracted data.
    pub fn ok(data: ReceiptFields, confidence: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            confidence: Some(confidence),
            error: None,
        }
    }

    /// A failure response carrying only the error message — never a stack
    /// trace or debug formatting.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            confidence: None,
            error: Some(message.into()),
        }
    }
}

/// Timing and call-count bookkeeping for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// How many times the field extractor was invoked (1 or 2).
    pub extraction_calls: u8,
    /// The rotation applied by the orientation feedback loop, if any.
    pub rotation_applied: Rotation,
    pub normalize_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Full result of a successful pipeline run, as seen by library callers.
///
/// The CLI and other transport adapters usually only forward
/// [`ProcessedReceipt::into_response`]; the artifact and stats are there for
/// hosts that need the storage path or timing.
#[derive(Debug, Clone)]
pub struct ProcessedReceipt {
    pub fields: ReceiptFields,
    pub confidence: f64,
    pub artifact: StoredArtifact,
    pub stats: ProcessingStats,
}

impl ProcessedReceipt {
    /// Collapse into the wire envelope.
    pub fn into_response(self) -> ReceiptResponse {
        ReceiptResponse::ok(self.fields, self.confidence)
    }
}
