//! Separable Gaussian blur.
//!
//! Colors are convolved premultiplied by alpha, so fully transparent pixels
//! contribute no color to their neighbors. Samples past the border repeat the
//! nearest edge pixel.

use crate::config::MAX_BLUR_RADIUS;
use crate::raster::Raster;

/// Normalized 1D Gaussian weights of length `2 * radius + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurKernel {
    weights: Vec<f32>,
}

impl BlurKernel {
    /// Kernel for `radius`, with `sigma = radius / 2` (at least 0.5).
    ///
    /// Radii above [`MAX_BLUR_RADIUS`] are clamped to it.
    pub fn from_radius(radius: u32) -> Self {
        let radius = radius.min(MAX_BLUR_RADIUS);
        if radius == 0 {
            return Self { weights: vec![1.0] };
        }

        let sigma = (radius as f64 / 2.0).max(0.5);
        let denom = 2.0 * sigma * sigma;
        let r = radius as i64;

        let raw: Vec<f64> = (-r..=r)
            .map(|i| {
                let x = i as f64;
                (-x * x / denom).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();

        Self {
            weights: raw.into_iter().map(|w| (w / sum) as f32).collect(),
        }
    }

    pub fn radius(&self) -> usize {
        self.weights.len() / 2
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Blur `raster` with a Gaussian of the given radius.
///
/// Radius 0 returns a pixel-identical copy and radii above
/// [`MAX_BLUR_RADIUS`] are clamped. Output dimensions always equal the input's.
pub fn gaussian_blur(raster: &Raster, radius: u32) -> Raster {
    if radius == 0 {
        return raster.clone();
    }

    let _span = tracing::debug_span!("gaussian_blur", radius).entered();

    let kernel = BlurKernel::from_radius(radius);
    let (width, height) = raster.dimensions();
    let (w, h) = (width as usize, height as usize);

    let src = premultiply(raster.as_bytes());
    let mut tmp = vec![[0.0f32; 4]; w * h];
    let mut out = vec![[0.0f32; 4]; w * h];

    horizontal_pass(&src, &mut tmp, w, h, kernel.weights());
    vertical_pass(&tmp, &mut out, w, h, kernel.weights());

    raster.map_pixels(|i, _| unpremultiply(out[i]))
}

fn premultiply(bytes: &[u8]) -> Vec<[f32; 4]> {
    bytes
        .chunks_exact(4)
        .map(|px| {
            let a = px[3] as f32 / 255.0;
            [px[0] as f32 * a, px[1] as f32 * a, px[2] as f32 * a, px[3] as f32]
        })
        .collect()
}

fn unpremultiply(px: [f32; 4]) -> [u8; 4] {
    let alpha = px[3].clamp(0.0, 255.0);
    let a = alpha / 255.0;
    let color = |v: f32| if a > 0.0 { to_u8(v / a) } else { 0 };
    [color(px[0]), color(px[1]), color(px[2]), to_u8(alpha)]
}

fn horizontal_pass(src: &[[f32; 4]], dst: &mut [[f32; 4]], w: usize, h: usize, k: &[f32]) {
    let radius = (k.len() / 2) as isize;
    let max_x = w as isize - 1;
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius).clamp(0, max_x) as usize;
                let px = &src[row + sx];
                for c in 0..4 {
                    acc[c] += kw * px[c];
                }
            }
            dst[row + x] = acc;
        }
    }
}

fn vertical_pass(src: &[[f32; 4]], dst: &mut [[f32; 4]], w: usize, h: usize, k: &[f32]) {
    let radius = (k.len() / 2) as isize;
    let max_y = h as isize - 1;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius).clamp(0, max_y) as usize;
                let px = &src[sy * w + x];
                for c in 0..4 {
                    acc[c] += kw * px[c];
                }
            }
            dst[y * w + x] = acc;
        }
    }
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
