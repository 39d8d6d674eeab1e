use std::io::Cursor;

use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat};

use crate::error::{IngestError, Result};

/// canonical thumbnail edge length
pub const THUMBNAIL_SIZE: u32 = 200;
/// fixed jpeg quality so identical input always encodes to identical bytes
pub const JPEG_QUALITY: u8 = 85;

/// render the canonical 200x200 jpeg thumbnail for an assembled file.
///
/// returns Ok(None) when the bytes are not a supported image format: that is
/// not an error, the file simply gets no thumbnail. a recognized format that
/// fails to decode is a real decode error and aborts the completion attempt.
pub fn render_thumbnail(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let format = match image::guess_format(bytes) {
        Ok(f) => f,
        Err(_) => {
            tracing::debug!("Unrecognized image format, no thumbnail");
            return Ok(None);
        }
    };

    let image = match format {
        ImageFormat::Jpeg => decode_jpeg_oriented(bytes)?,
        ImageFormat::Png | ImageFormat::Gif => {
            image::load_from_memory_with_format(bytes, format).map_err(|e| {
                IngestError::Decode(format!("corrupt {:?} data: {}", format, e))
            })?
        }
        other => {
            tracing::debug!("No thumbnail for {:?} input", other);
            return Ok(None);
        }
    };

    let thumb = image.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    thumb
        .write_with_encoder(encoder)
        .map_err(|e| IngestError::Decode(format!("thumbnail encode failed: {}", e)))?;

    Ok(Some(out))
}

// jpeg is the one format whose exif orientation we honor: cameras store the
// sensor image unrotated and tag how to display it (1..=8: identity, mirror,
// 180, vertical flip, transpose, rotate 90, transverse, rotate 270)
fn decode_jpeg_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = JpegDecoder::new(Cursor::new(bytes))
        .map_err(|e| IngestError::Decode(format!("corrupt jpeg data: {}", e)))?;

    // missing or unreadable exif is not fatal, just render as stored
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| IngestError::Decode(format!("corrupt jpeg data: {}", e)))?;
    image.apply_orientation(orientation);
    Ok(image)
}
