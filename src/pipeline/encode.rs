//! Image encoding for the model request: pixels or raw bytes → base64 `ImageData`.
//!
//! Rasterised PDF pages are PNG-encoded (lossless keeps glyph edges crisp).
//! Photos and image documents in a format vision models take (PNG, JPEG,
//! WebP, GIF) are forwarded as-is. BMP and TIFF uploads are decoded and
//! re-encoded as PNG.

use crate::error::DocBotError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, DocBotError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| DocBotError::EncodeFailed(e.to_string()))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Formats decoded and re-encoded as PNG before they reach the model.
const TRANSCODED_FORMATS: &[ImageFormat] = &[ImageFormat::Bmp, ImageFormat::Tiff];

/// Wrap an uploaded image file for the model.
pub fn encode_image_bytes(bytes: &[u8]) -> Result<ImageData, DocBotError> {
    let format = sniff_image(bytes)?;
    match forwarded_mime(format) {
        Some(mime) => {
            let b64 = STANDARD.encode(bytes);
            debug!("Encoded {} upload → {} bytes base64", mime, b64.len());
            Ok(ImageData::new(b64, mime).with_detail("high"))
        }
        None => {
            let img = image::load_from_memory_with_format(bytes, format)
                .map_err(|e| DocBotError::EncodeFailed(format!("decode {format:?}: {e}")))?;
            debug!("Transcoding {:?} upload ({}x{}) to PNG", format, img.width(), img.height());
            encode_page(&img)
        }
    }
}

/// Identify an uploaded image from its magic bytes.
///
/// Fails with `UnsupportedMedia` for anything that is neither forwarded
/// verbatim nor transcoded.
pub fn sniff_image(bytes: &[u8]) -> Result<ImageFormat, DocBotError> {
    let format = image::guess_format(bytes).map_err(|e| DocBotError::UnsupportedMedia {
        detail: format!("not a recognised image ({e})"),
    })?;
    if forwarded_mime(format).is_some() || TRANSCODED_FORMATS.contains(&format) {
        Ok(format)
    } else {
        Err(DocBotError::UnsupportedMedia {
            detail: format!("image format {format:?} is not supported"),
        })
    }
}

/// MIME type for formats sent to the model without re-encoding.
fn forwarded_mime(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}
