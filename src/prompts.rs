//! Prompts for VLM-based receipt field extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the example payload, the category
//!    constraint, and the rotation instruction are assembled in exactly one
//!    place, so the prompt and the response validator cannot drift apart.
//!
//! 2. **Testability** — unit tests can inspect the rendered prompt directly
//!    without spinning up a real VLM.
//!
//! The prompt works few-shot: instead of describing the output schema
//! field-by-field, it shows the model one complete example response and
//! annotates only the constrained fields. In practice this yields far more
//! reliable JSON than abstract schema descriptions.

use crate::schema::ExtractionSchema;

/// Preamble that frames the task and forbids prose around the JSON.
pub const EXTRACTION_PREAMBLE: &str = r#"You are an expense-tracking assistant. You will be shown a photo of a purchase receipt. Read it carefully and extract the structured data described below.

Respond with ONLY a single JSON object — no commentary, no markdown fences. The object must have exactly the same shape as this example:"#;

/// Few-shot example the model's reply must mirror.
///
/// The values are illustrative; only the shape and types matter.
pub const EXAMPLE_RESPONSE: &str = r#"{
  "success": true,
  "rotationHint": 0,
  "data": {
    "merchant": "Delta Airlines",
    "amount": 1005.1,
    "currency": "USD",
    "date": "2025-07-23",
    "hour": "13:20",
    "category": "transport",
    "description": "Delta Airlines flight from New York to Los Angeles",
    "paymentMethod": "Credit Card",
    "receiptNumber": "RCP-1230121",
    "location": "New York, NY"
  },
  "confidence": 90
}"#;

/// Instruction for the required `rotationHint` field.
pub const ROTATION_INSTRUCTION: &str = "rotationHint: the number of degrees (0, 90, 180, or 270) to rotate the image clockwise so that the receipt text is readable from top to bottom. 0 means no rotation needed. If you cannot read the receipt because of its orientation, set rotationHint and leave your best guess in the other fields.";

/// Render the full system prompt for the given schema.
///
/// The enumerated category list and the currency format instruction come
/// from the injected [`ExtractionSchema`], never from constants baked into
/// the pipeline.
pub fn extraction_prompt(schema: &ExtractionSchema) -> String {
    format!(
        "{preamble}\n\n{example}\n\nField constraints:\n\
         - {rotation}\n\
         - category: must be exactly one of: {categories}\n\
         - currency: {currency}\n\
         - date: calendar date as YYYY-MM-DD\n\
         - hour: time of day as HH:MM (24-hour)\n\
         - amount: decimal number, no currency symbol\n\
         - confidence: integer 0-100, your overall confidence in the extraction",
        preamble = EXTRACTION_PREAMBLE,
        example = EXAMPLE_RESPONSE,
        rotation = ROTATION_INSTRUCTION,
        categories = schema.categories.join("|"),
        currency = schema.currency_instruction,
    )
}
