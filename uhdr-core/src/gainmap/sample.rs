//! Pixel sampling for the gain map stages.

use crate::color::gamut::Rgb;
use crate::types::PixelBuffer;

#[inline]
fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Read a 4:2:0 pixel with 4:4:4 chroma upsampling.
///
/// Luma comes from the addressed pixel; U and V are bilinearly sampled at
/// the pixel's position on the half-resolution chroma grid, keeping the
/// chroma lattice consistent across the scale factor.
pub(crate) fn sample_yuv420(img: &PixelBuffer, x: usize, y: usize) -> Rgb {
    let luma = img.luma();
    let yy = luma[y * img.luma_stride + x] as f32 / 255.0;

    let (u_plane, v_plane) = img.chroma_planes();
    let cw = img.width / 2;
    let ch = img.height / 2;

    let cx = x as f32 * 0.5;
    let cy = y as f32 * 0.5;
    let x0 = (cx as usize).min(cw - 1);
    let y0 = (cy as usize).min(ch - 1);
    let x1 = (x0 + 1).min(cw - 1);
    let y1 = (y0 + 1).min(ch - 1);
    let fx = cx - x0 as f32;
    let fy = cy - y0 as f32;

    let stride = img.chroma_stride;
    let fetch = |plane: &[u8], px: usize, py: usize| plane[py * stride + px] as f32 / 255.0;

    let u = bilinear(
        fetch(u_plane, x0, y0),
        fetch(u_plane, x1, y0),
        fetch(u_plane, x0, y1),
        fetch(u_plane, x1, y1),
        fx,
        fy,
    );
    let v = bilinear(
        fetch(v_plane, x0, y0),
        fetch(v_plane, x1, y0),
        fetch(v_plane, x0, y1),
        fetch(v_plane, x1, y1),
        fx,
        fy,
    );

    [yy, u - 0.5, v - 0.5]
}

/// Read a 4:2:0 pixel with nearest-neighbor chroma.
pub(crate) fn get_yuv420_pixel(img: &PixelBuffer, x: usize, y: usize) -> Rgb {
    let luma = img.luma();
    let yy = luma[y * img.luma_stride + x] as f32 / 255.0;

    let (u_plane, v_plane) = img.chroma_planes();
    let idx = (y / 2) * img.chroma_stride + x / 2;
    let u = u_plane[idx] as f32 / 255.0 - 0.5;
    let v = v_plane[idx] as f32 / 255.0 - 0.5;
    [yy, u, v]
}

/// Read a P010 pixel as normalized 10-bit YUV.
///
/// Each 16-bit word carries the sample in its top 10 bits; chroma is
/// interleaved UVUV at half resolution.
pub(crate) fn sample_p010(img: &PixelBuffer, x: usize, y: usize) -> Rgb {
    let read_u16 = |offset: usize| u16::from_le_bytes([img.data[offset], img.data[offset + 1]]);

    let luma_offset = (y * img.luma_stride + x) * 2;
    let yy = (read_u16(luma_offset) >> 6) as f32 / 1023.0;

    let chroma_row = y / 2;
    let pair = (x / 2) * 2;
    let chroma_offset = img.chroma_start() + (chroma_row * img.chroma_stride + pair) * 2;
    let u = (read_u16(chroma_offset) >> 6) as f32 / 1023.0 - 0.5;
    let v = (read_u16(chroma_offset + 2) >> 6) as f32 / 1023.0 - 0.5;

    [yy, u, v]
}

/// Shepard's inverse-distance-weighted interpolation table.
///
/// For each sub-pixel offset within an `S x S` block, the table holds the
/// normalized weights of the four enclosing gain map samples, turning the
/// per-pixel map lookup into one table read plus four multiplies.
pub struct ShepardsIdw {
    scale: usize,
    /// Weights for corners (0,0), (1,0), (0,1), (1,1), row major by offset.
    weights: Vec<[f32; 4]>,
}

impl ShepardsIdw {
    /// Build the weight table for an integral map scale factor.
    pub fn new(scale: usize) -> Self {
        let mut weights = Vec::with_capacity(scale * scale);
        for dy in 0..scale {
            for dx in 0..scale {
                let px = dx as f32 / scale as f32;
                let py = dy as f32 / scale as f32;
                let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];

                let mut w = [0.0f32; 4];
                let mut exact = None;
                for (i, (cx, cy)) in corners.iter().enumerate() {
                    let dist = ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt();
                    if dist < 1e-6 {
                        exact = Some(i);
                        break;
                    }
                    w[i] = 1.0 / dist;
                }
                if let Some(i) = exact {
                    w = [0.0; 4];
                    w[i] = 1.0;
                } else {
                    let total: f32 = w.iter().sum();
                    for entry in &mut w {
                        *entry /= total;
                    }
                }
                weights.push(w);
            }
        }
        Self { scale, weights }
    }

    /// The scale factor the table was built for.
    pub fn scale(&self) -> usize {
        self.scale
    }
}

/// Sample the gain map at image coordinates using the IDW table.
///
/// Valid only when the base/map ratio equals the table's scale factor.
/// Returns the interpolated sample normalized to `[0, 1]`.
pub(crate) fn sample_map_idw(map: &PixelBuffer, x: usize, y: usize, idw: &ShepardsIdw) -> f32 {
    let scale = idw.scale;
    let luma = map.luma();
    let fetch = |px: usize, py: usize| luma[py * map.luma_stride + px] as f32;

    let x0 = (x / scale).min(map.width - 1);
    let y0 = (y / scale).min(map.height - 1);
    let x1 = (x0 + 1).min(map.width - 1);
    let y1 = (y0 + 1).min(map.height - 1);

    let w = &idw.weights[(y % scale) * scale + (x % scale)];
    let sample = w[0] * fetch(x0, y0) + w[1] * fetch(x1, y0) + w[2] * fetch(x0, y1)
        + w[3] * fetch(x1, y1);
    sample / 255.0
}

/// Sample the gain map at image coordinates with plain bilinear filtering.
///
/// Fallback for non-integral map scale factors; works in normalized
/// coordinates so any base/map ratio is accepted.
pub(crate) fn sample_map_bilinear(
    map: &PixelBuffer,
    x: usize,
    y: usize,
    image_width: usize,
    image_height: usize,
) -> f32 {
    let gx = x as f32 / image_width as f32 * map.width as f32;
    let gy = y as f32 / image_height as f32 * map.height as f32;

    let x0 = (gx as usize).min(map.width - 1);
    let y0 = (gy as usize).min(map.height - 1);
    let x1 = (x0 + 1).min(map.width - 1);
    let y1 = (y0 + 1).min(map.height - 1);
    let fx = gx - x0 as f32;
    let fy = gy - y0 as f32;

    let luma = map.luma();
    let fetch = |px: usize, py: usize| luma[py * map.luma_stride + px] as f32;
    bilinear(fetch(x0, y0), fetch(x1, y0), fetch(x0, y1), fetch(x1, y1), fx.min(1.0), fy.min(1.0))
        / 255.0
}
