//! Gain encoding and application formulas.

use crate::color::gamut::Rgb;
use crate::types::GainMapMetadata;

/// Encode the HDR/SDR luminance ratio as an 8-bit gain map sample.
///
/// `log2_min` and `log2_max` are `log2` of the metadata content boosts,
/// hoisted out by the caller since they are loop invariant.
#[inline]
pub fn encode_gain(
    y_sdr_nits: f32,
    y_hdr_nits: f32,
    metadata: &GainMapMetadata,
    log2_min: f32,
    log2_max: f32,
) -> u8 {
    if log2_max <= log2_min {
        return 0;
    }
    let ratio = (y_hdr_nits + metadata.offset_hdr) / (y_sdr_nits + metadata.offset_sdr);
    if !(ratio > 0.0) {
        return 0;
    }
    let mut g = (ratio.log2() - log2_min) / (log2_max - log2_min);
    if metadata.gamma != 1.0 {
        g = g.max(0.0).powf(1.0 / metadata.gamma);
    }
    (g * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Recover an HDR linear RGB triple from an SDR triple and a gain sample.
///
/// `gain` is the decoded map sample in `[0, 1]`. `display_boost` caps the
/// applied factor at what the display can show.
#[inline]
pub fn apply_gain(rgb: Rgb, gain: f32, metadata: &GainMapMetadata, display_boost: f32) -> Rgb {
    let g = if metadata.gamma != 1.0 {
        gain.max(0.0).powf(metadata.gamma)
    } else {
        gain
    };
    let log_boost = metadata.min_content_boost.log2() * (1.0 - g)
        + metadata.max_content_boost.log2() * g;
    let factor = log_boost.exp2().min(display_boost);
    [
        (rgb[0] + metadata.offset_sdr) * factor - metadata.offset_hdr,
        (rgb[1] + metadata.offset_sdr) * factor - metadata.offset_hdr,
        (rgb[2] + metadata.offset_sdr) * factor - metadata.offset_hdr,
    ]
}

/// Number of entries in a [`GainLut`].
const GAIN_LUT_SIZE: usize = 256;

/// Precomputed gain factors for fixed metadata and display boost.
///
/// Replaces the per-pixel `exp2`/`powf` with a table lookup.
pub struct GainLut {
    table: Box<[f32; GAIN_LUT_SIZE]>,
}

impl GainLut {
    /// Tabulate the effective gain factor over the `[0, 1]` gain domain.
    pub fn new(metadata: &GainMapMetadata, display_boost: f32) -> Self {
        let log2_min = metadata.min_content_boost.log2();
        let log2_max = metadata.max_content_boost.log2();
        let mut table = Box::new([0.0f32; GAIN_LUT_SIZE]);
        for (i, entry) in table.iter_mut().enumerate() {
            let gain = i as f32 / (GAIN_LUT_SIZE - 1) as f32;
            let g = if metadata.gamma != 1.0 {
                gain.powf(metadata.gamma)
            } else {
                gain
            };
            let log_boost = log2_min * (1.0 - g) + log2_max * g;
            *entry = log_boost.exp2().min(display_boost);
        }
        Self { table }
    }

    /// Effective gain factor for a decoded map sample in `[0, 1]`.
    #[inline]
    pub fn factor(&self, gain: f32) -> f32 {
        let idx = (gain.clamp(0.0, 1.0) * (GAIN_LUT_SIZE - 1) as f32 + 0.5) as usize;
        self.table[idx.min(GAIN_LUT_SIZE - 1)]
    }

    /// Apply the tabulated factor to an SDR triple.
    #[inline]
    pub fn apply(&self, rgb: Rgb, gain: f32, metadata: &GainMapMetadata) -> Rgb {
        let factor = self.factor(gain);
        [
            (rgb[0] + metadata.offset_sdr) * factor - metadata.offset_hdr,
            (rgb[1] + metadata.offset_sdr) * factor - metadata.offset_hdr,
            (rgb[2] + metadata.offset_sdr) * factor - metadata.offset_hdr,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_metadata() -> GainMapMetadata {
        GainMapMetadata {
            min_content_boost: 1.0,
            max_content_boost: 4.0,
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 4.0,
            ..Default::default()
        }
    }

    #[test]
    fn encode_gain_endpoints_and_midpoint() {
        let meta = test_metadata();
        let (lo, hi) = (0.0, 2.0); // log2 of 1.0 and 4.0

        // Equal luminance: ratio 1 is the bottom of the range.
        assert_eq!(encode_gain(100.0, 100.0, &meta, lo, hi), 0);
        // Ratio 4 is the top.
        assert_eq!(encode_gain(100.0, 400.0, &meta, lo, hi), 255);
        // Ratio 2 sits at the log midpoint.
        assert_eq!(encode_gain(100.0, 200.0, &meta, lo, hi), 128);
        // Out-of-range ratios saturate.
        assert_eq!(encode_gain(100.0, 1600.0, &meta, lo, hi), 255);
        assert_eq!(encode_gain(400.0, 100.0, &meta, lo, hi), 0);
    }

    #[test]
    fn apply_gain_reaches_boost_limits() {
        let meta = test_metadata();
        let rgb = [0.5, 0.5, 0.5];

        let out = apply_gain(rgb, 1.0, &meta, 4.0);
        assert!((out[0] - 2.0).abs() < 1e-5, "full gain should be 4x: {out:?}");

        let out = apply_gain(rgb, 0.0, &meta, 4.0);
        assert!((out[0] - 0.5).abs() < 1e-5, "zero gain should be 1x: {out:?}");

        // Display boost caps the factor.
        let out = apply_gain(rgb, 1.0, &meta, 2.0);
        assert!((out[0] - 1.0).abs() < 1e-5, "capped gain should be 2x: {out:?}");
    }

    #[test]
    fn gain_lut_matches_exact_path() {
        let mut meta = test_metadata();
        meta.offset_sdr = 1.0 / 64.0;
        meta.offset_hdr = 1.0 / 64.0;
        let lut = GainLut::new(&meta, 4.0);
        for i in 0..=255u32 {
            let g = i as f32 / 255.0;
            let exact = apply_gain([0.25, 0.5, 0.75], g, &meta, 4.0);
            let fast = lut.apply([0.25, 0.5, 0.75], g, &meta);
            for c in 0..3 {
                assert!((exact[c] - fast[c]).abs() < 1e-4, "mismatch at gain {g}");
            }
        }
    }

    /// Encoding with a non-unit gamma and decoding with the same gamma
    /// recovers the original ratio.
    #[test]
    fn gamma_roundtrip_recovers_ratio() {
        let mut meta = test_metadata();
        meta.gamma = 2.0;
        let (lo, hi) = (0.0, 2.0);

        for ratio in [1.0f32, 1.5, 2.0, 3.0, 4.0] {
            let sample = encode_gain(100.0, 100.0 * ratio, &meta, lo, hi);
            let out = apply_gain([1.0, 1.0, 1.0], sample as f32 / 255.0, &meta, 4.0);
            assert!(
                (out[0] - ratio).abs() / ratio < 0.02,
                "ratio {ratio} decoded as {}",
                out[0]
            );
        }
    }
}
