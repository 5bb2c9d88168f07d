//! Encoded bytes ⇄ [`Raster`].
//!
//! Decoding accepts anything the `image` crate recognizes from its magic
//! bytes (JPEG, PNG, WebP, GIF, BMP, ...) and always yields RGBA8.

use crate::raster::{Raster, RasterError};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no image data")]
    Empty,
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("decoded image is unusable: {0}")]
    Raster(#[from] RasterError),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Output container for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    /// Lossless, keeps alpha.
    Png,
    /// Lossy, alpha is dropped. Quality is clamped to 1-100.
    Jpeg { quality: u8 },
}

pub fn decode(bytes: &[u8]) -> Result<Raster, DecodeError> {
    let _span = tracing::debug_span!("decode", len = bytes.len()).entered();

    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory(bytes)?;
    Ok(Raster::from_image(image.into_rgba8())?)
}

/// Detected container format, if the magic bytes are recognized.
pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

pub fn encode(raster: &Raster, format: EncodeFormat) -> Result<Vec<u8>, EncodeError> {
    let _span = tracing::debug_span!("encode", ?format).entered();

    let (width, height) = raster.dimensions();
    let mut out = Vec::new();

    match format {
        EncodeFormat::Png => {
            PngEncoder::new(&mut out).write_image(
                raster.as_bytes(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        EncodeFormat::Jpeg { quality } => {
            let rgb: Vec<u8> = raster
                .as_bytes()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Raster {
        Raster::from_fn(width, height, |x, y| {
            [(x * 17) as u8, (y * 29) as u8, ((x + y) * 7) as u8, (255 - x * 3) as u8]
        })
        .unwrap()
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let raster = gradient(13, 7);
        let bytes = encode(&raster, EncodeFormat::Png).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn png_encoding_is_deterministic() {
        let raster = gradient(8, 8);
        let a = encode(&raster, EncodeFormat::Png).unwrap();
        let b = encode(&raster, EncodeFormat::Png).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions_and_drops_alpha() {
        let raster = gradient(20, 10);
        let bytes = encode(&raster, EncodeFormat::Jpeg { quality: 90 }).unwrap();
        assert_eq!(guess_format(&bytes), Some(ImageFormat::Jpeg));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (20, 10));
        assert!(decoded.as_bytes().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(DecodeError::Image(_))
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(decode(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn truncated_png_is_rejected() {
        let bytes = encode(&gradient(16, 16), EncodeFormat::Png).unwrap();
        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
    }
}
