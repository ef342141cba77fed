//! Artifact store: persist the normalized image and hand back its URL.
//!
//! Filenames are derived from the extracted description text, not from a
//! random ID: the first few words make the file recognisable in a directory
//! listing, and a SHA-256 prefix of the full description keeps unrelated
//! receipts apart. Identical descriptions produce identical filenames on
//! purpose — re-submitting the same receipt overwrites the previous copy
//! rather than accumulating duplicates (last write wins, no uniqueness
//! guard; concurrent requests with the same description race and the risk
//! is accepted).

use crate::config::ProcessingConfig;
use crate::error::ReceiptError;
use crate::pipeline::normalize::NormalizedImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::info;

/// How many leading words of the description appear in the filename.
const SLUG_WORDS: usize = 4;
/// Hex characters of the description hash appended to the slug.
const HASH_CHARS: usize = 10;

/// A persisted receipt image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Content-derived filename, e.g. `delta-airlines-flight-from-9f2ab0c1d2.jpg`.
    pub filename: String,
    /// Absolute or config-relative path of the written file.
    pub path: PathBuf,
    /// Public URL the static-serving collaborator resolves to the bytes.
    pub url: String,
}

/// Derive the deterministic filename for a description.
pub fn derive_filename(description: &str) -> String {
    let slug: Vec<String> = description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(SLUG_WORDS)
        .map(|w| w.to_lowercase())
        .collect();

    let digest = Sha256::digest(description.as_bytes());
    let hash = &hex::encode(digest)[..HASH_CHARS];

    if slug.is_empty() {
        format!("receipt-{hash}.jpg")
    } else {
        format!("{}-{hash}.jpg", slug.join("-"))
    }
}

/// Persist a normalized image under the configured receipts directory.
///
/// The directory is created on demand. Returns the filename, the written
/// path, and the public URL (`{public_prefix}/{filename}`).
pub async fn store(
    image: &NormalizedImage,
    description: &str,
    config: &ProcessingConfig,
) -> Result<StoredArtifact, ReceiptError> {
    let filename = derive_filename(description);
    let path = config.receipts_dir.join(&filename);
    let url = format!(
        "{}/{}",
        config.public_prefix.trim_end_matches('/'),
        filename
    );

    tokio::fs::create_dir_all(&config.receipts_dir)
        .await
        .map_err(|e| ReceiptError::StorageError {
            path: config.receipts_dir.clone(),
            source: e,
        })?;

    tokio::fs::write(&path, image.bytes())
        .await
        .map_err(|e| ReceiptError::StorageError {
            path: path.clone(),
            source: e,
        })?;

    info!(path = %path.display(), size = image.bytes().len(), "stored receipt image");

    Ok(StoredArtifact {
        filename,
        path,
        url,
    })
}
