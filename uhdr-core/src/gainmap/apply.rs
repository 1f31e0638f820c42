//! Gain map application: reconstructing HDR pixels from an SDR base image.

use tracing::warn;

use crate::color::gain::GainLut;
use crate::color::gamut::bt601_yuv_to_rgb;
use crate::color::transfer::{hlg_oetf, pq_oetf, TransferLut};
use crate::gainmap::sample::{get_yuv420_pixel, sample_map_bilinear, sample_map_idw, ShepardsIdw};
use crate::jobs::{JobQueue, Parallelism};
use crate::types::{Error, GainMapMetadata, PixelBuffer, PixelFormat, Result};
use crate::{GAINMAP_VERSION, MAP_SCALE_FACTOR};

/// Requested pixel layout for the reconstructed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// SDR RGBA8888 in gamma space; the gain map is not applied.
    Sdr,
    /// Linear RGBA F16, normalized so 1.0 is the applied display boost.
    HdrLinear,
    /// Linear planar 10-bit RGB in 16-bit words.
    HdrLinearRgb10Bit,
    /// HLG-encoded RGBA1010102.
    HdrHlg,
    /// PQ-encoded RGBA1010102.
    HdrPq,
}

impl OutputFormat {
    fn pixel_format(self) -> PixelFormat {
        match self {
            Self::Sdr => PixelFormat::Rgba8888,
            Self::HdrLinear => PixelFormat::RgbaF16,
            Self::HdrLinearRgb10Bit => PixelFormat::Rgb10Planar,
            Self::HdrHlg | Self::HdrPq => PixelFormat::Rgba1010102,
        }
    }
}

enum OutChunk<'a> {
    Packed(&'a mut [u8]),
    Planar {
        r: &'a mut [u8],
        g: &'a mut [u8],
        b: &'a mut [u8],
    },
}

/// Apply a gain map to an SDR 4:2:0 image.
///
/// The SDR image is assumed to come from a JPEG decode, so BT.601 YUV
/// decoding and the sRGB transfer are used unconditionally. The applied
/// boost is `min(max_display_boost, metadata.max_content_boost)` and the
/// HDR output is normalized by it.
pub fn apply_gainmap(
    sdr: &PixelBuffer,
    map: &PixelBuffer,
    metadata: &GainMapMetadata,
    output_format: OutputFormat,
    max_display_boost: f32,
    parallelism: Parallelism,
) -> Result<PixelBuffer> {
    if sdr.data.is_empty() {
        return Err(Error::BadPointer("sdr image"));
    }
    if map.data.is_empty() {
        return Err(Error::BadPointer("gain map"));
    }
    if sdr.format != PixelFormat::Yuv420 || map.format != PixelFormat::Monochrome {
        return Err(Error::UnsupportedFeature(
            "gain map application needs a YUV420 base and a monochrome map",
        ));
    }
    if !(max_display_boost >= 1.0) {
        return Err(Error::InvalidDisplayBoost(max_display_boost));
    }
    if metadata.version != GAINMAP_VERSION {
        warn!(version = %metadata.version, "unsupported metadata version");
        return Err(Error::BadMetadata(format!(
            "unsupported version: {}",
            metadata.version
        )));
    }
    if metadata.gamma != 1.0 {
        warn!(gamma = metadata.gamma, "unsupported metadata gamma");
        return Err(Error::BadMetadata(format!(
            "unsupported gamma: {}",
            metadata.gamma
        )));
    }
    if metadata.offset_sdr != 0.0 || metadata.offset_hdr != 0.0 {
        warn!(
            offset_sdr = metadata.offset_sdr,
            offset_hdr = metadata.offset_hdr,
            "unsupported metadata offsets"
        );
        return Err(Error::BadMetadata("unsupported nonzero offsets".into()));
    }
    if metadata.hdr_capacity_min != metadata.min_content_boost
        || metadata.hdr_capacity_max != metadata.max_content_boost
    {
        warn!("metadata hdr capacity does not match content boost range");
        return Err(Error::BadMetadata(
            "hdr capacity must match the content boost range".into(),
        ));
    }
    // Both axes must share one scale factor, though it need not be integral.
    if sdr.width * map.height != sdr.height * map.width {
        return Err(Error::UnsupportedMapScaleFactor);
    }

    let idw = if sdr.width % map.width == 0 {
        Some(ShepardsIdw::new(sdr.width / map.width))
    } else {
        None
    };

    let width = sdr.width;
    let height = sdr.height;
    let display_boost = max_display_boost.min(metadata.max_content_boost);
    let gain_lut = GainLut::new(metadata, display_boost);
    let srgb_inv = TransferLut::srgb_inv_oetf();
    // The forward OETFs are evaluated exactly; their unbounded slope at
    // zero makes an interpolated table inaccurate near black.
    let out_oetf: Option<fn(f32) -> f32> = match output_format {
        OutputFormat::HdrHlg => Some(hlg_oetf),
        OutputFormat::HdrPq => Some(pq_oetf),
        _ => None,
    };

    let mut out = PixelBuffer::new(width, height, output_format.pixel_format(), sdr.gamut)?;

    let workers = parallelism.workers();
    let tile_rows = if workers == 1 {
        height
    } else {
        idw.as_ref().map(ShepardsIdw::scale).unwrap_or(MAP_SCALE_FACTOR)
    };

    // The parallel phase borrows disjoint row chunks of the output; the
    // block ends those borrows before the buffer is returned.
    {
        let queue = JobQueue::new();
        let chunk_list: Vec<Option<OutChunk>> = match output_format.pixel_format() {
            PixelFormat::Rgb10Planar => {
                let plane = height * width * 2;
                let (r_plane, rest) = out.data.split_at_mut(plane);
                let (g_plane, b_plane) = rest.split_at_mut(plane);
                let chunk_bytes = tile_rows * width * 2;
                r_plane
                    .chunks_mut(chunk_bytes)
                    .zip(g_plane.chunks_mut(chunk_bytes))
                    .zip(b_plane.chunks_mut(chunk_bytes))
                    .map(|((r, g), b)| Some(OutChunk::Planar { r, g, b }))
                    .collect()
            }
            format => {
                let bpp = format.bytes_per_pixel().unwrap_or(4);
                out.data
                    .chunks_mut(tile_rows * width * bpp)
                    .map(|chunk| Some(OutChunk::Packed(chunk)))
                    .collect()
            }
        };
        let chunks = parking_lot::Mutex::new(chunk_list);

        let worker = || {
            while let Some((row_start, row_end)) = queue.dequeue() {
                let Some(mut chunk) = chunks.lock()[row_start / tile_rows].take() else {
                    continue;
                };
                for y in row_start..row_end {
                    let local = y - row_start;
                    for x in 0..width {
                        let yuv = get_yuv420_pixel(sdr, x, y);
                        let rgb_gamma = bt601_yuv_to_rgb(yuv);

                        if output_format == OutputFormat::Sdr {
                            if let OutChunk::Packed(buf) = &mut chunk {
                                let o = (local * width + x) * 4;
                                buf[o] = (rgb_gamma[0].clamp(0.0, 1.0) * 255.0).round() as u8;
                                buf[o + 1] = (rgb_gamma[1].clamp(0.0, 1.0) * 255.0).round() as u8;
                                buf[o + 2] = (rgb_gamma[2].clamp(0.0, 1.0) * 255.0).round() as u8;
                                buf[o + 3] = 255;
                            }
                            continue;
                        }

                        let rgb = [
                            srgb_inv.sample(rgb_gamma[0]),
                            srgb_inv.sample(rgb_gamma[1]),
                            srgb_inv.sample(rgb_gamma[2]),
                        ];
                        let gain = match &idw {
                            Some(table) => sample_map_idw(map, x, y, table),
                            None => sample_map_bilinear(map, x, y, width, height),
                        };
                        let rgb_hdr = gain_lut.apply(rgb, gain, metadata);
                        let rgb_n = [
                            (rgb_hdr[0] / display_boost).max(0.0),
                            (rgb_hdr[1] / display_boost).max(0.0),
                            (rgb_hdr[2] / display_boost).max(0.0),
                        ];

                        match (&mut chunk, output_format) {
                            (OutChunk::Packed(buf), OutputFormat::HdrLinear) => {
                                let o = (local * width + x) * 8;
                                for (c, value) in rgb_n.iter().enumerate() {
                                    let bits = half::f16::from_f32(*value).to_le_bytes();
                                    buf[o + c * 2..o + c * 2 + 2].copy_from_slice(&bits);
                                }
                                let alpha = half::f16::from_f32(1.0).to_le_bytes();
                                buf[o + 6..o + 8].copy_from_slice(&alpha);
                            }
                            (OutChunk::Planar { r, g, b }, OutputFormat::HdrLinearRgb10Bit) => {
                                let o = (local * width + x) * 2;
                                let quantize =
                                    |v: f32| ((v.min(1.0) * 1023.0) as u16 & 0x3ff).to_le_bytes();
                                r[o..o + 2].copy_from_slice(&quantize(rgb_n[0]));
                                g[o..o + 2].copy_from_slice(&quantize(rgb_n[1]));
                                b[o..o + 2].copy_from_slice(&quantize(rgb_n[2]));
                            }
                            (OutChunk::Packed(buf), OutputFormat::HdrHlg | OutputFormat::HdrPq) => {
                                if let Some(oetf) = out_oetf {
                                    let encode = |v: f32| {
                                        (oetf(v.clamp(0.0, 1.0)) * 1023.0).round().clamp(0.0, 1023.0)
                                            as u32
                                    };
                                    let packed = encode(rgb_n[0])
                                        | (encode(rgb_n[1]) << 10)
                                        | (encode(rgb_n[2]) << 20)
                                        | (3 << 30);
                                    let o = (local * width + x) * 4;
                                    buf[o..o + 4].copy_from_slice(&packed.to_le_bytes());
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        };

        std::thread::scope(|scope| {
            for _ in 0..workers - 1 {
                scope.spawn(worker);
            }
            let mut row_start = 0;
            while row_start < height {
                let row_end = (row_start + tile_rows).min(height);
                queue.enqueue(row_start, row_end);
                row_start = row_end;
            }
            queue.mark_done();
            worker();
        });
    }

    Ok(out)
}
