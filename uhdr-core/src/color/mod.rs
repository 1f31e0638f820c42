//! Color science: transfer curves, gamut math and gain formulas.

pub mod gain;
pub mod gamut;
pub mod transfer;

use crate::types::{ColorGamut, Error, PixelBuffer, PixelFormat, Result};

/// Convert a 4:2:0 buffer to packed RGBA8888 in gamma space.
///
/// BT.601 decoding is used unconditionally, matching the treatment of
/// JPEG-decoded SDR images elsewhere in the pipeline.
pub fn yuv420_to_rgba8888(src: &PixelBuffer) -> Result<PixelBuffer> {
    if src.format != PixelFormat::Yuv420 {
        return Err(Error::UnsupportedFeature("RGBA conversion needs a 4:2:0 input"));
    }
    if src.data.is_empty() {
        return Err(Error::BadPointer("yuv image"));
    }

    let mut out = PixelBuffer::new(src.width, src.height, PixelFormat::Rgba8888, src.gamut)?;
    let luma = src.luma();
    let (u_plane, v_plane) = src.chroma_planes();

    for y in 0..src.height {
        for x in 0..src.width {
            let yy = luma[y * src.luma_stride + x] as f32 / 255.0;
            let c_idx = (y / 2) * src.chroma_stride + x / 2;
            let u = u_plane[c_idx] as f32 / 255.0 - 0.5;
            let v = v_plane[c_idx] as f32 / 255.0 - 0.5;
            let rgb = gamut::bt601_yuv_to_rgb([yy, u, v]);

            let o = (y * out.luma_stride + x) * 4;
            out.data[o] = (rgb[0].clamp(0.0, 1.0) * 255.0).round() as u8;
            out.data[o + 1] = (rgb[1].clamp(0.0, 1.0) * 255.0).round() as u8;
            out.data[o + 2] = (rgb[2].clamp(0.0, 1.0) * 255.0).round() as u8;
            out.data[o + 3] = 255;
        }
    }
    out.gamut = if src.gamut == ColorGamut::Unspecified {
        ColorGamut::Bt709
    } else {
        src.gamut
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_yuv_converts_to_gray_rgba() {
        let mut src = PixelBuffer::new(4, 4, PixelFormat::Yuv420, ColorGamut::Bt709).unwrap();
        {
            let (luma, chroma) = src.split_planes_mut();
            luma.fill(128);
            chroma.fill(128);
        }
        let out = yuv420_to_rgba8888(&src).unwrap();
        assert_eq!(out.format, PixelFormat::Rgba8888);
        assert_eq!(out.width, 4);
        // 128/255 with near-neutral chroma stays close to gray, alpha opaque.
        let px = &out.data[..4];
        for c in 0..3 {
            assert!((px[c] as i32 - 128).abs() <= 2, "channel {c} = {}", px[c]);
        }
        assert_eq!(px[3], 255);
    }
}
