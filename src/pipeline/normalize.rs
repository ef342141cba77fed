//! Image normalization: raw upload bytes → bounded, upright JPEG.
//!
//! ## Why normalize at all?
//!
//! Receipt photos arrive as whatever the phone produced: 12-megapixel HEIC
//! from an iPhone, sideways JPEG from an Android camera roll, the odd PNG
//! screenshot. The extraction capability and the artifact store both want
//! one thing — a reasonably sized JPEG whose text reads top-to-bottom — so
//! every upload is funnelled through here before anything else sees it.
//!
//! ## Orientation heuristic
//!
//! Receipts are portrait-dominant. If the decoded image is wider than it is
//! tall we rotate it 90° clockwise *before* the first extraction attempt;
//! the model's `rotationHint` feedback then corrects the cases where the
//! heuristic guessed wrong (see [`crate::process`]).
//!
//! Everything in this module is CPU-bound and synchronous; the orchestrator
//! wraps calls in `tokio::task::spawn_blocking` so decode/encode work never
//! stalls the async runtime.

use crate::config::ProcessingConfig;
use crate::error::ReceiptError;
use crate::schema::Rotation;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};
use std::fmt;
use tracing::debug;

/// ISO-BMFF brand strings that identify a HEIC/HEIF container.
///
/// `image::guess_format` does not recognise these, so we sniff the `ftyp`
/// box ourselves before falling back to it.
const HEIF_BRANDS: [&[u8; 4]; 7] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heif", b"mif1", b"msf1",
];

/// A normalized receipt image: JPEG bytes with bounded dimensions and
/// corrected orientation.
///
/// Superseded (replaced wholesale) when the orientation feedback loop
/// re-rotates; never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl NormalizedImage {
    /// The encoded JPEG bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Detected inbound image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// A raster format the `image` crate decodes directly.
    Standard(ImageFormat),
    /// HEIC/HEIF camera container; needs conversion before processing.
    Heic,
}

/// Detect the image format by inspecting buffer contents, never a filename.
pub fn detect_format(buf: &[u8]) -> Result<DetectedFormat, ReceiptError> {
    if is_heif(buf) {
        return Ok(DetectedFormat::Heic);
    }
    image::guess_format(buf)
        .map(DetectedFormat::Standard)
        .map_err(|_| ReceiptError::UnsupportedFormat { magic: magic(buf) })
}

/// First four bytes of the buffer, zero-padded, for error reporting.
fn magic(buf: &[u8]) -> [u8; 4] {
    let mut m = [0u8; 4];
    for (i, b) in buf.iter().take(4).enumerate() {
        m[i] = *b;
    }
    m
}

fn is_heif(buf: &[u8]) -> bool {
    if buf.len() < 12 || &buf[4..8] != b"ftyp" {
        return false;
    }
    let brand: &[u8] = &buf[8..12];
    HEIF_BRANDS.iter().any(|b| brand == *b)
}

/// Normalize a raw upload into a bounded, upright JPEG.
///
/// Steps, in order:
/// 1. Detect format from magic bytes ([`detect_format`]).
/// 2. HEIC/HEIF → decode via libheif into RGB; anything else → decode with
///    the `image` crate.
/// 3. Landscape input (width > height) → rotate 90° clockwise.
/// 4. Downscale so neither dimension exceeds `config.max_dimension`
///    (aspect preserved, never upscaled).
/// 5. Encode as JPEG at `config.jpeg_quality`.
pub fn normalize(raw: &[u8], config: &ProcessingConfig) -> Result<NormalizedImage, ReceiptError> {
    let format = detect_format(raw)?;
    debug!(?format, "detected inbound image format");

    let mut img = match format {
        DetectedFormat::Heic => decode_heic(raw)?,
        DetectedFormat::Standard(fmt) => image::load_from_memory_with_format(raw, fmt)
            .map_err(|e| ReceiptError::ImageError {
                detail: format!("decode failed: {e}"),
            })?,
    };

    if img.width() > img.height() {
        debug!(
            width = img.width(),
            height = img.height(),
            "landscape input, applying default 90° rotation"
        );
        img = img.rotate90();
    }

    if img.width() > config.max_dimension || img.height() > config.max_dimension {
        img = img.resize(
            config.max_dimension,
            config.max_dimension,
            image::imageops::FilterType::Lanczos3,
        );
        debug!(
            width = img.width(),
            height = img.height(),
            "resized to fit {} px bound",
            config.max_dimension
        );
    }

    encode_jpeg(&img, config.jpeg_quality)
}

/// Rotate an already-normalized image by the given amount, clockwise.
///
/// Used by the orientation feedback loop when the extractor reports a
/// non-zero rotation hint. `Rotation::None` is a strict no-op: the returned
/// image is byte-identical to the input, no decode/re-encode round trip.
pub fn rotate(
    image: &NormalizedImage,
    rotation: Rotation,
    jpeg_quality: u8,
) -> Result<NormalizedImage, ReceiptError> {
    if rotation == Rotation::None {
        return Ok(image.clone());
    }

    let img = image::load_from_memory_with_format(image.bytes(), ImageFormat::Jpeg).map_err(
        |e| ReceiptError::ImageError {
            detail: format!("re-decode for rotation failed: {e}"),
        },
    )?;

    let rotated = match rotation {
        Rotation::None => unreachable!("handled above"),
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    };

    debug!(degrees = rotation.degrees(), "re-rotated normalized image");
    encode_jpeg(&rotated, jpeg_quality)
}

/// Decode a HEIC/HEIF buffer into an RGB image.
fn decode_heic(buf: &[u8]) -> Result<DynamicImage, ReceiptError> {
    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(buf).map_err(|e| ReceiptError::ConversionError {
        detail: format!("HEIF container parse failed: {e}"),
    })?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| ReceiptError::ConversionError {
            detail: format!("no primary image in HEIF container: {e}"),
        })?;
    let heif_image = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| ReceiptError::ConversionError {
            detail: format!("HEIF decode failed: {e}"),
        })?;

    let planes = heif_image.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ReceiptError::ConversionError {
            detail: "HEIF decode produced no interleaved RGB plane".into(),
        })?;

    // The decoded rows may carry stride padding; copy row by row.
    let width = plane.width;
    let height = plane.height;
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * plane.stride;
        pixels.extend_from_slice(&plane.data[start..start + row_bytes]);
    }

    let rgb = image::RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        ReceiptError::ConversionError {
            detail: "HEIF pixel buffer did not match reported dimensions".into(),
        }
    })?;
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Encode as JPEG at the given quality, recording final dimensions.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<NormalizedImage, ReceiptError> {
    // JPEG has no alpha channel; flatten to RGB first.
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ReceiptError::ImageError {
            detail: format!("JPEG encode failed: {e}"),
        })?;

    debug!(width, height, size = bytes.len(), "encoded normalized JPEG");
    Ok(NormalizedImage {
        bytes,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([200, 180, 160]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    fn config() -> ProcessingConfig {
        ProcessingConfig::default()
    }

    #[test]
    fn detects_png_by_magic() {
        let buf = png_bytes(4, 4);
        assert_eq!(
            detect_format(&buf).unwrap(),
            DetectedFormat::Standard(ImageFormat::Png)
        );
    }

    #[test]
    fn detects_heic_by_ftyp_brand() {
        let mut buf = vec![0, 0, 0, 24];
        buf.extend_from_slice(b"ftypheic");
        buf.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_format(&buf).unwrap(), DetectedFormat::Heic);
    }

    #[test]
    fn rejects_garbage_with_unsupported_format() {
        let err = detect_format(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ReceiptError::UnsupportedFormat { .. }));
    }

    #[test]
    fn normalize_produces_decodable_jpeg() {
        let out = normalize(&png_bytes(40, 80), &config()).expect("normalize");
        let decoded =
            image::load_from_memory_with_format(out.bytes(), ImageFormat::Jpeg).expect("jpeg");
        assert_eq!(decoded.width(), out.width());
        assert_eq!(decoded.height(), out.height());
    }

    #[test]
    fn landscape_input_is_rotated_portrait() {
        let out = normalize(&png_bytes(120, 60), &config()).expect("normalize");
        assert!(
            out.height() >= out.width(),
            "expected portrait after heuristic rotation, got {}x{}",
            out.width(),
            out.height()
        );
        assert_eq!((out.width(), out.height()), (60, 120));
    }

    #[test]
    fn portrait_input_keeps_orientation() {
        let out = normalize(&png_bytes(60, 120), &config()).expect("normalize");
        assert_eq!((out.width(), out.height()), (60, 120));
    }

    #[test]
    fn oversized_input_is_bounded_without_distortion() {
        let cfg = ProcessingConfig::builder()
            .max_dimension(256)
            .build()
            .unwrap();
        let out = normalize(&png_bytes(300, 600), &cfg).expect("normalize");
        assert!(out.width() <= 256 && out.height() <= 256);
        // 1:2 aspect survives the resize
        assert_eq!(out.height(), out.width() * 2);
    }

    #[test]
    fn small_input_is_never_upscaled() {
        let out = normalize(&png_bytes(50, 100), &config()).expect("normalize");
        assert_eq!((out.width(), out.height()), (50, 100));
    }

    #[test]
    fn normalize_rejects_undecodable_buffer() {
        let err = normalize(&[0u8; 64], &config()).unwrap_err();
        assert!(matches!(err, ReceiptError::UnsupportedFormat { .. }));
    }

    #[test]
    fn rotate_zero_is_byte_identical() {
        let img = normalize(&png_bytes(60, 120), &config()).expect("normalize");
        let same = rotate(&img, Rotation::None, 70).expect("rotate");
        assert_eq!(same.bytes(), img.bytes());
    }

    #[test]
    fn rotate_90_swaps_dimensions() {
        let img = normalize(&png_bytes(60, 120), &config()).expect("normalize");
        let rotated = rotate(&img, Rotation::Cw90, 70).expect("rotate");
        assert_eq!((rotated.width(), rotated.height()), (120, 60));
    }

    #[test]
    fn rotate_180_keeps_dimensions() {
        let img = normalize(&png_bytes(60, 120), &config()).expect("normalize");
        let rotated = rotate(&img, Rotation::Cw180, 70).expect("rotate");
        assert_eq!((rotated.width(), rotated.height()), (60, 120));
    }
}
