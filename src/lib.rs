//! # receipt2json
//!
//! Turn a photo of a receipt into structured expense data using Vision
//! Language Models.
//!
//! The crate is a transport-agnostic processing pipeline: hand it raw image
//! bytes (JPEG, PNG or HEIC, as they come off a phone camera) and get back a
//! JSON-serialisable record with merchant, amount, currency, date, category
//! and friends — plus a persisted, normalized copy of the image and the
//! public URL it will be served under.
//!
//! ## Pipeline
//!
//! ```text
//! raw bytes ──▶ normalize ──▶ extract ──▶ (rotate? ──▶ extract) ──▶ store
//!              JPEG, upright,   VLM call     at most once           fs + URL
//!              bounded size
//! ```
//!
//! Receipts are portrait documents, so the normalizer rotates landscape
//! images upright before the model sees them. When the model still reports
//! the image as rotated it returns a `rotationHint`; the pipeline applies it
//! and re-extracts exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use receipt2json::{process_receipt, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from the environment (e.g. OPENAI_API_KEY).
//!     let config = ProcessingConfig::default();
//!
//!     let raw = std::fs::read("receipt.jpg")?;
//!     let response = process_receipt(&raw, &config).await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use receipt2json::ProcessingConfig;
//!
//! let config = ProcessingConfig::builder()
//!     .provider_name("anthropic")
//!     .model("claude-sonnet-4-20250514")
//!     .max_dimension(2048)
//!     .jpeg_quality(80)
//!     .receipts_dir("var/receipts")
//!     .public_prefix("/static/receipts")
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Testing Without a Provider
//!
//! Inject a [`StubExtractor`] (or any [`FieldExtractor`] implementation) to
//! run the whole pipeline offline:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use receipt2json::{ProcessingConfig, StubExtractor};
//!
//! let config = ProcessingConfig::builder()
//!     .extractor(Arc::new(StubExtractor::new()))
//!     .build()
//!     .unwrap();
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod response;
pub mod schema;

pub use config::{ProcessingConfig, ProcessingConfigBuilder};
pub use error::ReceiptError;
pub use pipeline::extract::{Extraction, FieldExtractor, LlmExtractor, StubExtractor};
pub use pipeline::input::{is_url, resolve_input};
pub use pipeline::normalize::NormalizedImage;
pub use pipeline::store::StoredArtifact;
pub use process::{process, process_batch, process_receipt};
pub use response::{ProcessedReceipt, ProcessingStats, ReceiptFields, ReceiptResponse};
pub use schema::{ExtractionSchema, Rotation, DEFAULT_CATEGORIES};
