//! Error types for the receipt2json library.
//!
//! Every failure in the pipeline is terminal for that request: there is no
//! partial success, and nothing is retried automatically except the single
//! orientation-triggered re-extraction driven by [`crate::process`]. The
//! boundary function [`crate::process::process_receipt`] catches every
//! variant and converts it into `{ "success": false, "error": "<message>" }`,
//! so callers over the wire only ever see the display message — variants and
//! their fields exist for library users and logs.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the receipt2json library.
#[derive(Debug, Error)]
pub enum ReceiptError {
    // ── Inbound errors ────────────────────────────────────────────────────
    /// The uploaded payload exceeds the configured transfer limit.
    #[error("Image payload is {size} bytes, exceeding the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The buffer could not be decoded as any recognized image type.
    #[error("Unsupported image format: buffer is not a recognizable image (first bytes: {magic:02x?})")]
    UnsupportedFormat { magic: [u8; 4] },

    // ── Normalizer errors ─────────────────────────────────────────────────
    /// A HEIC/HEIF container was detected but could not be converted.
    #[error("Failed to convert HEIC image to JPEG: {detail}")]
    ConversionError { detail: String },

    /// Decoding, resizing, or re-encoding the raster image failed.
    #[error("Image processing failed: {detail}")]
    ImageError { detail: String },

    // ── Extractor errors ──────────────────────────────────────────────────
    /// No extraction capability is configured (missing API key etc.).
    #[error("No extraction provider is configured.\n{hint}")]
    ExtractorNotConfigured { hint: String },

    /// The external capability failed, or its output did not conform to the
    /// extraction schema. Never retried, never silently defaulted.
    #[error("Field extraction failed: {detail}")]
    ExtractionError { detail: String },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The normalized image could not be persisted.
    #[error("Failed to store receipt image at '{}': {source}", path.display())]
    StorageError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors (CLI input resolution) ───────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{}'\nCheck the path exists and is readable.", path.display())]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
