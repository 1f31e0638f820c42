//! Gain map generation from an SDR / HDR image pair.

use tracing::debug;

use crate::color::gain::encode_gain;
use crate::color::gamut::{bt601_yuv_to_rgb, luminance_for_gamut, yuv_to_rgb_for_gamut, GamutConversion};
use crate::color::transfer::TransferLut;
use crate::gainmap::sample::{sample_p010, sample_yuv420};
use crate::jobs::{JobQueue, Parallelism};
use crate::types::{
    ColorGamut, Error, GainMapMetadata, HdrTransfer, PixelBuffer, PixelFormat, Result,
};
use crate::{nits, GAINMAP_VERSION, JOB_SIZE_ROWS, MAP_SCALE_FACTOR};

/// Compute a monochrome gain map at 1/4 resolution per axis.
///
/// The SDR input must be 8-bit 4:2:0 and is assumed to carry the sRGB
/// transfer; the HDR input must be P010 with the given transfer function.
/// `sdr_is_bt601` forces BT.601 YUV decoding regardless of the declared
/// SDR gamut, for images that came out of a JPEG decoder.
///
/// Returns the map image plus the metadata needed to apply it.
pub fn generate_gainmap(
    sdr: &PixelBuffer,
    hdr: &PixelBuffer,
    hdr_tf: HdrTransfer,
    sdr_is_bt601: bool,
    parallelism: Parallelism,
) -> Result<(PixelBuffer, GainMapMetadata)> {
    if sdr.data.is_empty() {
        return Err(Error::BadPointer("sdr image"));
    }
    if hdr.data.is_empty() {
        return Err(Error::BadPointer("hdr image"));
    }
    if sdr.format != PixelFormat::Yuv420 || hdr.format != PixelFormat::P010 {
        return Err(Error::UnsupportedFeature(
            "gain map generation needs YUV420 SDR and P010 HDR inputs",
        ));
    }
    if sdr.width != hdr.width || sdr.height != hdr.height {
        return Err(Error::ResolutionMismatch(
            hdr.width, hdr.height, sdr.width, sdr.height,
        ));
    }
    if sdr.gamut == ColorGamut::Unspecified || hdr.gamut == ColorGamut::Unspecified {
        return Err(Error::InvalidGamut);
    }
    if sdr.width % MAP_SCALE_FACTOR != 0 || sdr.height % MAP_SCALE_FACTOR != 0 {
        return Err(Error::UnsupportedWidthHeight(sdr.width, sdr.height));
    }

    let map_width = sdr.width / MAP_SCALE_FACTOR;
    let map_height = sdr.height / MAP_SCALE_FACTOR;

    let (hdr_inv_oetf, hdr_white_nits) = match hdr_tf {
        // Linear input is treated as normalized to the HLG peak; brighter
        // content clips.
        HdrTransfer::Linear => (None, nits::HLG_MAX_NITS),
        HdrTransfer::Hlg => (Some(TransferLut::hlg_inv_oetf()), nits::HLG_MAX_NITS),
        HdrTransfer::Pq => (Some(TransferLut::pq_inv_oetf()), nits::PQ_MAX_NITS),
    };

    let metadata = GainMapMetadata {
        version: GAINMAP_VERSION.into(),
        max_content_boost: hdr_white_nits / nits::SDR_WHITE_NITS,
        min_content_boost: 1.0,
        gamma: 1.0,
        offset_sdr: 0.0,
        offset_hdr: 0.0,
        hdr_capacity_min: 1.0,
        hdr_capacity_max: hdr_white_nits / nits::SDR_WHITE_NITS,
    };
    let log2_min = metadata.min_content_boost.log2();
    let log2_max = metadata.max_content_boost.log2();

    let srgb_inv = TransferLut::srgb_inv_oetf();
    let luminance = luminance_for_gamut(sdr.gamut)?;
    let sdr_yuv_to_rgb = if sdr_is_bt601 {
        bt601_yuv_to_rgb
    } else {
        yuv_to_rgb_for_gamut(sdr.gamut)?
    };
    let hdr_yuv_to_rgb = yuv_to_rgb_for_gamut(hdr.gamut)?;
    let hdr_to_sdr_gamut = GamutConversion::new(hdr.gamut, sdr.gamut)?;

    let workers = parallelism.workers();
    let rows_per_job = if workers == 1 {
        map_height
    } else {
        JOB_SIZE_ROWS / MAP_SCALE_FACTOR
    };
    debug!(map_width, map_height, workers, "generating gain map");

    let mut map_data = vec![0u8; map_width * map_height];
    // The parallel phase borrows disjoint row chunks of the map; the block
    // ends those borrows before the map is moved into its buffer.
    {
        let queue = JobQueue::new();
        let chunks: Vec<Option<&mut [u8]>> =
            map_data.chunks_mut(rows_per_job * map_width).map(Some).collect();
        let chunks = parking_lot::Mutex::new(chunks);

        let worker = || {
            while let Some((row_start, _row_end)) = queue.dequeue() {
                let Some(chunk) = chunks.lock()[row_start / rows_per_job].take() else {
                    continue;
                };
                for (i, row) in chunk.chunks_mut(map_width).enumerate() {
                    let gy = row_start + i;
                    for (gx, out) in row.iter_mut().enumerate() {
                        let x = gx * MAP_SCALE_FACTOR;
                        let y = gy * MAP_SCALE_FACTOR;

                        let sdr_yuv = sample_yuv420(sdr, x, y);
                        let sdr_rgb_gamma = sdr_yuv_to_rgb(sdr_yuv);
                        let sdr_rgb = [
                            srgb_inv.sample(sdr_rgb_gamma[0]),
                            srgb_inv.sample(sdr_rgb_gamma[1]),
                            srgb_inv.sample(sdr_rgb_gamma[2]),
                        ];
                        let sdr_y_nits = luminance(sdr_rgb) * nits::SDR_WHITE_NITS;

                        let hdr_yuv = sample_p010(hdr, x, y);
                        let hdr_rgb_gamma = hdr_yuv_to_rgb(hdr_yuv);
                        let hdr_rgb = match &hdr_inv_oetf {
                            Some(lut) => [
                                lut.sample(hdr_rgb_gamma[0]),
                                lut.sample(hdr_rgb_gamma[1]),
                                lut.sample(hdr_rgb_gamma[2]),
                            ],
                            None => hdr_rgb_gamma,
                        };
                        let hdr_rgb = hdr_to_sdr_gamut.apply(hdr_rgb);
                        let hdr_y_nits = luminance(hdr_rgb) * hdr_white_nits;

                        *out = encode_gain(sdr_y_nits, hdr_y_nits, &metadata, log2_min, log2_max);
                    }
                }
            }
        };

        std::thread::scope(|scope| {
            for _ in 0..workers - 1 {
                scope.spawn(worker);
            }
            let mut row_start = 0;
            while row_start < map_height {
                let row_end = (row_start + rows_per_job).min(map_height);
                queue.enqueue(row_start, row_end);
                row_start = row_end;
            }
            queue.mark_done();
            // The calling thread drains jobs alongside the workers.
            worker();
        });
    }

    let map = PixelBuffer::from_data(
        map_width,
        map_height,
        PixelFormat::Monochrome,
        ColorGamut::Unspecified,
        map_data,
    )?;
    Ok((map, metadata))
}
