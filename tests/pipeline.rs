//! End-to-end pipeline tests using a stubbed extractor and a temp receipts
//! directory. No network, no API keys.

use receipt2json::{
    process, process_batch, process_receipt, Extraction, ProcessingConfig, Rotation, StubExtractor,
};
use std::sync::Arc;
use tempfile::TempDir;

fn encoded_image(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img =
        image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([200, 180, 150])));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn config_with(dir: &TempDir, stub: Arc<StubExtractor>) -> ProcessingConfig {
    ProcessingConfig::builder()
        .receipts_dir(dir.path())
        .extractor(stub)
        .build()
        .unwrap()
}

fn extraction_with_hint(hint: Rotation) -> Extraction {
    let mut e = StubExtractor::sample_extraction();
    e.rotation_hint = hint;
    e
}

#[tokio::test]
async fn portrait_jpeg_processes_with_single_extraction() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::new());
    let config = config_with(&dir, Arc::clone(&stub));

    let raw = encoded_image(100, 200, image::ImageFormat::Jpeg);
    let receipt = process(&raw, &config).await.expect("process");

    assert_eq!(stub.calls(), 1);
    assert_eq!(receipt.stats.extraction_calls, 1);
    assert_eq!(receipt.stats.rotation_applied, Rotation::None);
    assert_eq!(receipt.fields.merchant, "Delta Airlines");
    assert_eq!(receipt.confidence, 90.0);

    // The artifact exists and imageUrl points at it under the public prefix.
    assert!(receipt.artifact.path.exists());
    assert_eq!(
        receipt.fields.image_url.as_deref(),
        Some(receipt.artifact.url.as_str())
    );
    assert!(receipt.artifact.url.starts_with("/receipts/"));
    assert!(receipt.artifact.url.ends_with(".jpg"));
}

#[tokio::test]
async fn landscape_input_is_rotated_upright_before_extraction() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::new());
    let config = config_with(&dir, Arc::clone(&stub));

    let raw = encoded_image(300, 150, image::ImageFormat::Png);
    process(&raw, &config).await.expect("process");

    // The extractor saw the portrait-oriented buffer, not the raw landscape.
    assert_eq!(stub.seen_dimensions(), vec![(150, 300)]);
}

#[tokio::test]
async fn rotation_hint_triggers_exactly_one_re_extraction() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::scripted([
        Ok(extraction_with_hint(Rotation::Cw90)),
        Ok(extraction_with_hint(Rotation::None)),
    ]));
    let config = config_with(&dir, Arc::clone(&stub));

    let raw = encoded_image(100, 200, image::ImageFormat::Jpeg);
    let receipt = process(&raw, &config).await.expect("process");

    assert_eq!(stub.calls(), 2);
    assert_eq!(receipt.stats.extraction_calls, 2);
    assert_eq!(receipt.stats.rotation_applied, Rotation::Cw90);

    // First call saw the normalized buffer, second the rotated one.
    assert_eq!(stub.seen_dimensions(), vec![(100, 200), (200, 100)]);

    // The persisted image is the buffer the final extraction saw.
    let written = std::fs::read(&receipt.artifact.path).unwrap();
    let persisted = image::load_from_memory(&written).unwrap();
    assert_eq!((persisted.width(), persisted.height()), (200, 100));
}

#[tokio::test]
async fn second_rotation_hint_is_ignored() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::scripted([
        Ok(extraction_with_hint(Rotation::Cw90)),
        Ok(extraction_with_hint(Rotation::Cw180)),
    ]));
    let config = config_with(&dir, Arc::clone(&stub));

    let raw = encoded_image(100, 200, image::ImageFormat::Jpeg);
    let receipt = process(&raw, &config).await.expect("process");

    // Two calls maximum, even when the second reply still asks for rotation.
    assert_eq!(stub.calls(), 2);
    assert_eq!(receipt.stats.rotation_applied, Rotation::Cw90);
}

#[tokio::test]
async fn extraction_failure_produces_failure_envelope_and_no_artifact() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::scripted([Err(
        "model endpoint unreachable".to_string()
    )]));
    let config = config_with(&dir, stub);

    let raw = encoded_image(100, 200, image::ImageFormat::Jpeg);
    let response = process_receipt(&raw, &config).await;

    assert!(!response.success);
    assert!(response.data.is_none());
    assert!(response.confidence.is_none());
    assert!(response
        .error
        .as_deref()
        .unwrap()
        .contains("model endpoint unreachable"));

    // Nothing persisted for a failed request.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn garbage_bytes_are_rejected_as_unsupported_format() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::new());
    let config = config_with(&dir, Arc::clone(&stub));

    let response = process_receipt(b"this is not an image at all", &config).await;

    assert!(!response.success);
    assert!(response.error.unwrap().contains("Unsupported image format"));
    // The extractor is never reached.
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn wire_format_is_camel_case_with_absent_fields_omitted() {
    let dir = TempDir::new().unwrap();
    let config = config_with(&dir, Arc::new(StubExtractor::new()));

    let raw = encoded_image(100, 200, image::ImageFormat::Jpeg);
    let response = process_receipt(&raw, &config).await;
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["success"], true);
    let data = &json["data"];
    assert!(data["paymentMethod"].is_string());
    assert!(data["receiptNumber"].is_string());
    assert!(data["imageUrl"].as_str().unwrap().starts_with("/receipts/"));
    // Success responses carry no error key at all.
    assert!(json.get("error").is_none());

    let failure = process_receipt(b"junk", &config).await;
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["success"], false);
    assert!(json.get("data").is_none());
    assert!(json.get("confidence").is_none());
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_failures() {
    let dir = TempDir::new().unwrap();
    let config = config_with(&dir, Arc::new(StubExtractor::new()));

    let payloads = vec![
        b"definitely not an image".to_vec(),
        encoded_image(100, 200, image::ImageFormat::Jpeg),
        encoded_image(120, 240, image::ImageFormat::Png),
    ];
    let responses = process_batch(payloads, &config).await;

    assert_eq!(responses.len(), 3);
    assert!(!responses[0].success);
    assert!(responses[1].success);
    assert!(responses[2].success);
}

#[tokio::test]
async fn resubmitting_the_same_receipt_overwrites_its_artifact() {
    let dir = TempDir::new().unwrap();
    let config = config_with(&dir, Arc::new(StubExtractor::new()));

    let raw = encoded_image(100, 200, image::ImageFormat::Jpeg);
    let first = process(&raw, &config).await.unwrap();
    let second = process(&raw, &config).await.unwrap();

    // Same description, same deterministic filename.
    assert_eq!(first.artifact.path, second.artifact.path);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn oversized_input_is_resized_within_the_bound() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubExtractor::new());
    let config = ProcessingConfig::builder()
        .receipts_dir(dir.path())
        .extractor(Arc::<StubExtractor>::clone(&stub))
        .max_dimension(256)
        .build()
        .unwrap();

    let raw = encoded_image(400, 800, image::ImageFormat::Jpeg);
    process(&raw, &config).await.expect("process");

    let seen = stub.seen_dimensions();
    let (w, h) = seen[0];
    assert!(w <= 256 && h <= 256, "got {w}x{h}");
    // Aspect ratio preserved (1:2).
    assert_eq!((w, h), (128, 256));
}
