//! Conservative HDR to SDR tone mapping.

use crate::types::{Error, PixelBuffer, PixelFormat, Result};

/// Tone map a P010 image to 8-bit 4:2:0 by dropping the low two bits of
/// each 10-bit sample.
///
/// The mapping is deliberately a pure bit-depth reduction so that gain map
/// generation stays reproducible downstream; a perceptual tone curve is a
/// future concern. Interleaved UV samples are split into planar U and V.
/// Stride padding at the right edge of each output row stays zeroed.
pub fn tone_map(src: &PixelBuffer) -> Result<PixelBuffer> {
    if src.data.is_empty() {
        return Err(Error::BadPointer("hdr image"));
    }
    if src.format != PixelFormat::P010 {
        return Err(Error::UnsupportedFeature("tone mapping needs a P010 input"));
    }

    let mut dest = PixelBuffer::with_strides(
        src.width,
        src.height,
        PixelFormat::Yuv420,
        src.gamut,
        src.luma_stride,
        src.luma_stride / 2,
    )?;

    let width = src.width;
    let height = src.height;
    let src_luma_stride = src.luma_stride;
    let src_chroma_stride = src.chroma_stride;
    let src_chroma_start = src.chroma_start();
    let dst_luma_stride = dest.luma_stride;
    let dst_chroma_stride = dest.chroma_stride;

    let read_u16 =
        |offset: usize| u16::from_le_bytes([src.data[offset], src.data[offset + 1]]);

    let (dst_luma, dst_chroma) = dest.split_planes_mut();
    for y in 0..height {
        let src_row = (y * src_luma_stride) * 2;
        let dst_row = y * dst_luma_stride;
        for x in 0..width {
            let sample10 = read_u16(src_row + x * 2) >> 6;
            dst_luma[dst_row + x] = ((sample10 >> 2) & 0xff) as u8;
        }
    }

    let v_offset = dst_chroma_stride * (height / 2);
    for y in 0..height / 2 {
        let src_row = src_chroma_start + (y * src_chroma_stride) * 2;
        let dst_row = y * dst_chroma_stride;
        for x in 0..width / 2 {
            let u10 = read_u16(src_row + (x * 2) * 2) >> 6;
            let v10 = read_u16(src_row + (x * 2 + 1) * 2) >> 6;
            dst_chroma[dst_row + x] = ((u10 >> 2) & 0xff) as u8;
            dst_chroma[v_offset + dst_row + x] = ((v10 >> 2) & 0xff) as u8;
        }
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColorGamut;

    #[test]
    fn every_sample_is_the_high_eight_bits() {
        let mut src = PixelBuffer::new(8, 8, PixelFormat::P010, ColorGamut::Bt2100).unwrap();
        let luma_bytes = src.luma_plane_bytes();
        for (i, pair) in src.data[..luma_bytes].chunks_mut(2).enumerate() {
            let value10 = ((i * 17) % 1024) as u16;
            pair.copy_from_slice(&(value10 << 6).to_le_bytes());
        }
        for (i, pair) in src.data[luma_bytes..].chunks_mut(2).enumerate() {
            let value10 = ((i * 29) % 1024) as u16;
            pair.copy_from_slice(&(value10 << 6).to_le_bytes());
        }

        let out = tone_map(&src).unwrap();
        assert_eq!(out.format, PixelFormat::Yuv420);
        assert_eq!(out.width, 8);
        assert_eq!(out.height, 8);
        assert_eq!(out.gamut, ColorGamut::Bt2100);

        for (i, &sample) in out.luma().iter().enumerate() {
            let value10 = ((i * 17) % 1024) as u16;
            assert_eq!(sample, ((value10 >> 2) & 0xff) as u8, "luma sample {i}");
        }
        let (u_plane, v_plane) = out.chroma_planes();
        for y in 0..4 {
            for x in 0..4 {
                let u10 = (((y * 8 + x * 2) * 29) % 1024) as u16;
                let v10 = (((y * 8 + x * 2 + 1) * 29) % 1024) as u16;
                assert_eq!(u_plane[y * 4 + x], ((u10 >> 2) & 0xff) as u8);
                assert_eq!(v_plane[y * 4 + x], ((v10 >> 2) & 0xff) as u8);
            }
        }
    }

    #[test]
    fn stride_padding_stays_zero() {
        let src =
            PixelBuffer::with_strides(8, 8, PixelFormat::P010, ColorGamut::Bt2100, 12, 12).unwrap();
        let out = tone_map(&src).unwrap();
        assert_eq!(out.luma_stride, 12);
        assert_eq!(out.chroma_stride, 6);
        for y in 0..8 {
            for pad in 8..12 {
                assert_eq!(out.luma()[y * 12 + pad], 0);
            }
        }
    }

    #[test]
    fn wrong_format_is_rejected() {
        let src = PixelBuffer::new(8, 8, PixelFormat::Yuv420, ColorGamut::Bt709).unwrap();
        assert!(matches!(
            tone_map(&src),
            Err(Error::UnsupportedFeature(_))
        ));
    }
}
