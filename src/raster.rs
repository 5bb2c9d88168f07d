use image::{Rgba, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RasterError {
    #[error("raster dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("buffer holds {actual} values, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Decoded RGBA8 bitmap, row-major, with non-zero dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    /// Build a raster from a packed RGBA buffer of `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, RasterError> {
        check_dimensions(width, height)?;
        let expected = rgba_len(width, height);
        let actual = rgba.len();
        let image = RgbaImage::from_raw(width, height, rgba).ok_or(RasterError::BufferSize {
            width,
            height,
            expected,
            actual,
        })?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbaImage) -> Result<Self, RasterError> {
        let (width, height) = image.dimensions();
        check_dimensions(width, height)?;
        Ok(Self { image })
    }

    /// Raster filled with a single color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, RasterError> {
        check_dimensions(width, height)?;
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, Rgba(rgba)),
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self, RasterError>
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        check_dimensions(width, height)?;
        Ok(Self {
            image: RgbaImage::from_fn(width, height, |x, y| Rgba(f(x, y))),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Packed RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Copy of this raster with every alpha value set to 255.
    pub fn opaque(&self) -> Raster {
        let mut image = self.image.clone();
        for px in image.pixels_mut() {
            px.0[3] = u8::MAX;
        }
        Raster { image }
    }

    /// Copy with alpha taken from `alpha`, one value per pixel in row-major order.
    pub(crate) fn with_alpha(&self, alpha: &[u8]) -> Raster {
        self.map_pixels(|i, px| [px[0], px[1], px[2], alpha.get(i).copied().unwrap_or(px[3])])
    }

    /// Same-sized copy with each pixel replaced by `f(index, pixel)`, index row-major.
    pub fn map_pixels<F>(&self, mut f: F) -> Raster
    where
        F: FnMut(usize, [u8; 4]) -> [u8; 4],
    {
        let mut image = self.image.clone();
        for (i, px) in image.pixels_mut().enumerate() {
            px.0 = f(i, px.0);
        }
        Raster { image }
    }

    /// The alpha channel as a standalone mask.
    pub fn alpha_mask(&self) -> Mask {
        Mask {
            width: self.width(),
            height: self.height(),
            alpha: self.image.pixels().map(|px| px.0[3]).collect(),
        }
    }

    /// Rotate by 180 degrees about the center.
    pub fn rotate180(&self) -> Raster {
        Raster {
            image: image::imageops::rotate180(&self.image),
        }
    }
}

/// Per-pixel alpha aligned 1:1 with a raster. 0 = background, 255 = subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl Mask {
    pub fn new(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self, RasterError> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(RasterError::BufferSize {
                width,
                height,
                expected,
                actual: alpha.len(),
            });
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// Mask that keeps every pixel (no cutout).
    pub fn opaque(width: u32, height: u32) -> Result<Self, RasterError> {
        Self::new(
            width,
            height,
            vec![u8::MAX; width as usize * height as usize],
        )
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self, RasterError>
    where
        F: FnMut(u32, u32) -> u8,
    {
        check_dimensions(width, height)?;
        let mut alpha = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                alpha.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.alpha[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn values(&self) -> &[u8] {
        &self.alpha
    }

    /// Fraction of pixels with non-zero alpha.
    pub fn coverage(&self) -> f32 {
        let kept = self.alpha.iter().filter(|a| **a > 0).count();
        kept as f32 / self.alpha.len() as f32
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), RasterError> {
    if width == 0 || height == 0 {
        return Err(RasterError::EmptyDimensions { width, height });
    }
    Ok(())
}

fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimensions() {
        assert_eq!(
            Raster::filled(0, 4, [0, 0, 0, 255]),
            Err(RasterError::EmptyDimensions {
                width: 0,
                height: 4
            })
        );
        assert!(Mask::opaque(3, 0).is_err());
    }

    #[test]
    fn rejects_short_buffer() {
        let err = Raster::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            RasterError::BufferSize {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn opaque_forces_alpha_only() {
        let raster = Raster::filled(2, 1, [10, 20, 30, 0]).unwrap();
        let opaque = raster.opaque();
        assert_eq!(opaque.pixel(1, 0), [10, 20, 30, 255]);
    }

    #[test]
    fn alpha_mask_matches_channel() {
        let raster = Raster::from_fn(3, 2, |x, y| [0, 0, 0, (x + y * 3) as u8]).unwrap();
        let mask = raster.alpha_mask();
        assert_eq!(mask.values(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(mask.get(2, 1), 5);
    }

    #[test]
    fn map_pixels_keeps_size_and_visits_in_row_order() {
        let raster = Raster::filled(3, 2, [0, 0, 0, 255]).unwrap();
        let mapped = raster.map_pixels(|i, px| [i as u8, px[1], px[2], px[3]]);
        assert_eq!(mapped.dimensions(), (3, 2));
        assert_eq!(mapped.pixel(0, 1), [3, 0, 0, 255]);
        assert_eq!(mapped.pixel(2, 1), [5, 0, 0, 255]);
    }

    #[test]
    fn coverage_counts_kept_pixels() {
        let mask = Mask::new(2, 2, vec![0, 255, 128, 0]).unwrap();
        assert_eq!(mask.coverage(), 0.5);
    }
}
