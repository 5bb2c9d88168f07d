//! Cover-fit blitting of layers onto a viewport surface.
//!
//! A layer is scaled uniformly until it covers the whole viewport, centered,
//! and whatever overflows is cropped. The transform is cheap and recomputed
//! for every draw.

use crate::pipeline::ParallaxLayers;
use crate::raster::Raster;
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Uniform scale plus offset placing a source inside a target rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl ViewportTransform {
    /// Size of the source once scaled.
    pub fn scaled_size(&self, source: (u32, u32)) -> (f64, f64) {
        (source.0 as f64 * self.scale, source.1 as f64 * self.scale)
    }
}

/// Cover-fit transform for drawing `source` into `target`.
///
/// `scale = max(tw / sw, th / sh)`, centered. Returns `None` when either
/// rectangle has a zero side, in which case there is nothing to draw.
///
/// # Examples
/// ```
/// # use parallax::viewport::compute_transform;
/// // 400x300 into 800x400: width drives the scale, 100px cropped top and bottom
/// let t = compute_transform((400, 300), (800, 400)).unwrap();
/// assert_eq!(t.scale, 2.0);
/// assert_eq!((t.offset_x, t.offset_y), (0.0, -100.0));
/// ```
pub fn compute_transform(source: (u32, u32), target: (u32, u32)) -> Option<ViewportTransform> {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 || tgt_w == 0 || tgt_h == 0 {
        return None;
    }

    let (src_w, src_h) = (src_w as f64, src_h as f64);
    let (tgt_w, tgt_h) = (tgt_w as f64, tgt_h as f64);

    let scale = (tgt_w / src_w).max(tgt_h / src_h);

    Some(ViewportTransform {
        scale,
        offset_x: (tgt_w - src_w * scale) / 2.0,
        offset_y: (tgt_h - src_h * scale) / 2.0,
    })
}

/// Draw `raster` onto `surface` with full opacity.
pub fn draw(raster: &Raster, transform: &ViewportTransform, surface: &mut RgbaImage) {
    draw_with_opacity(raster, transform, surface, 1.0);
}

/// Draw `raster` onto `surface`, source-over, scaled by `opacity` (0.0-1.0).
///
/// Each covered destination pixel samples the source bilinearly at its
/// center. A source shrunk below its own size is first resized with a
/// Lanczos3 filter so fine detail averages out instead of aliasing. Pixels
/// outside the surface are skipped.
pub fn draw_with_opacity(
    raster: &Raster,
    transform: &ViewportTransform,
    surface: &mut RgbaImage,
    opacity: f32,
) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity == 0.0 || transform.scale <= 0.0 {
        return;
    }

    let _span = tracing::debug_span!("draw", scale = transform.scale).entered();

    let (scaled_w, scaled_h) = transform.scaled_size(raster.dimensions());
    let reduced;
    let source = if transform.scale < 1.0 {
        let width = (scaled_w.round() as u32).max(1);
        let height = (scaled_h.round() as u32).max(1);
        reduced = imageops::resize(raster.as_image(), width, height, FilterType::Lanczos3);
        &reduced
    } else {
        raster.as_image()
    };
    let step_x = source.width() as f64 / scaled_w;
    let step_y = source.height() as f64 / scaled_h;

    let left = transform.offset_x;
    let top = transform.offset_y;
    let right = left + scaled_w;
    let bottom = top + scaled_h;

    let x0 = left.floor().max(0.0) as u32;
    let y0 = top.floor().max(0.0) as u32;
    let x1 = (right.ceil().max(0.0) as u32).min(surface.width());
    let y1 = (bottom.ceil().max(0.0) as u32).min(surface.height());

    for dy in y0..y1 {
        let cy = dy as f64 + 0.5;
        if cy < top || cy >= bottom {
            continue;
        }
        let sy = (cy - top) * step_y - 0.5;

        for dx in x0..x1 {
            let cx = dx as f64 + 0.5;
            if cx < left || cx >= right {
                continue;
            }
            let sx = (cx - left) * step_x - 0.5;

            let src = sample_bilinear(source, sx, sy);
            let dst = surface.get_pixel_mut(dx, dy);
            dst.0 = over(dst.0, src, opacity);
        }
    }
}

/// Cover-fit `raster` to the whole surface. No-op on a degenerate size.
pub fn blit(raster: &Raster, surface: &mut RgbaImage) {
    if let Some(transform) = compute_transform(raster.dimensions(), surface.dimensions()) {
        draw(raster, &transform, surface);
    }
}

/// Per-layer opacity for [`compose_scene`], e.g. from a fade-in animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOpacity {
    pub background: f32,
    pub overlay: f32,
    pub foreground: f32,
}

impl Default for LayerOpacity {
    fn default() -> Self {
        Self {
            background: 1.0,
            overlay: 1.0,
            foreground: 1.0,
        }
    }
}

/// Render background, overlay, then foreground into a fresh viewport.
///
/// Returns `None` for a zero-sized viewport.
pub fn compose_scene(
    layers: &ParallaxLayers,
    overlay: Option<&Raster>,
    viewport: (u32, u32),
    opacity: LayerOpacity,
) -> Option<RgbaImage> {
    let (width, height) = viewport;
    if width == 0 || height == 0 {
        return None;
    }

    let _span = tracing::debug_span!("compose_scene", width, height).entered();

    let mut surface = RgbaImage::new(width, height);
    let stack = [
        (Some(layers.background()), opacity.background),
        (overlay, opacity.overlay),
        (Some(layers.foreground()), opacity.foreground),
    ];

    for (layer, alpha) in stack {
        let Some(layer) = layer else { continue };
        if let Some(transform) = compute_transform(layer.dimensions(), viewport) {
            draw_with_opacity(layer, &transform, &mut surface, alpha);
        }
    }

    Some(surface)
}

/// Premultiplied RGBA in 0..=1, interpolated from the four nearest pixels.
fn sample_bilinear(image: &RgbaImage, sx: f64, sy: f64) -> [f32; 4] {
    let (w, h) = image.dimensions();
    let sx = sx.clamp(0.0, (w - 1) as f64);
    let sy = sy.clamp(0.0, (h - 1) as f64);

    let x0 = sx.floor() as u32;
    let y0 = sy.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (sx - x0 as f64) as f32;
    let fy = (sy - y0 as f64) as f32;

    let p00 = premultiplied(image.get_pixel(x0, y0).0);
    let p10 = premultiplied(image.get_pixel(x1, y0).0);
    let p01 = premultiplied(image.get_pixel(x0, y1).0);
    let p11 = premultiplied(image.get_pixel(x1, y1).0);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * fx;
        let bottom = p01[c] + (p11[c] - p01[c]) * fx;
        out[c] = top + (bottom - top) * fy;
    }
    out
}

fn premultiplied(px: [u8; 4]) -> [f32; 4] {
    let a = px[3] as f32 / 255.0;
    [
        px[0] as f32 / 255.0 * a,
        px[1] as f32 / 255.0 * a,
        px[2] as f32 / 255.0 * a,
        a,
    ]
}

/// Source-over of a premultiplied source onto a straight-alpha destination.
fn over(dst: [u8; 4], src: [f32; 4], opacity: f32) -> [u8; 4] {
    let sa = src[3] * opacity;
    if sa <= 0.0 {
        return dst;
    }

    let d = premultiplied(dst);
    let inv = 1.0 - sa;
    let out_a = sa + d[3] * inv;
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let premul = src[c] * opacity + d[c] * inv;
        out[c] = to_u8(premul / out_a);
    }
    out[3] = to_u8(out_a);
    out
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
