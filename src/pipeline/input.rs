//! Input resolution: normalise a user-supplied path or URL to image bytes.
//!
//! The pipeline proper only ever sees a byte buffer — this module exists for
//! the CLI adapter, which accepts either a local file or an HTTP/HTTPS URL
//! the way users paste them. Nothing here inspects image content; format
//! detection belongs to [`crate::pipeline::normalize`].

use crate::config::ProcessingConfig;
use crate::error::ReceiptError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to raw image bytes.
pub async fn resolve_input(input: &str, config: &ProcessingConfig) -> Result<Vec<u8>, ReceiptError> {
    if is_url(input) {
        download_url(input, config.download_timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

async fn resolve_local(path_str: &str) -> Result<Vec<u8>, ReceiptError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ReceiptError::FileNotFound { path: path.clone() })?;
    debug!(path = %path.display(), size = bytes.len(), "read local image");
    Ok(bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ReceiptError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    debug!(size = bytes.len(), "downloaded image");
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/receipt.jpg"));
        assert!(is_url("http://example.com/receipt.jpg"));
        assert!(!is_url("/tmp/receipt.jpg"));
        assert!(!is_url("receipt.jpg"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn missing_local_file_is_reported() {
        let err = resolve_input(
            "/definitely/not/a/real/receipt.jpg",
            &ProcessingConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReceiptError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_bytes_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("r.jpg");
        std::fs::write(&path, b"\xFF\xD8fake").unwrap();

        let bytes = resolve_input(path.to_str().unwrap(), &ProcessingConfig::default())
            .await
            .expect("resolve");
        assert_eq!(bytes, b"\xFF\xD8fake");
    }
}
