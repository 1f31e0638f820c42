//! Gamut conversion, luminance weights and YUV decoding matrices.

#![allow(clippy::excessive_precision)]

use crate::types::{ColorGamut, Error, Result};

/// An RGB (or YUV) triple.
pub type Rgb = [f32; 3];

type Matrix3 = [[f32; 3]; 3];

// Primaries conversion matrices, RGB-to-RGB, row major.
const BT709_TO_P3: Matrix3 = [
    [0.822462, 0.177537, 0.000001],
    [0.033194, 0.966807, -0.000001],
    [0.017083, 0.072398, 0.910519],
];
const BT709_TO_BT2100: Matrix3 = [
    [0.627404, 0.329283, 0.043313],
    [0.069097, 0.919541, 0.011362],
    [0.016391, 0.088013, 0.895595],
];
const P3_TO_BT709: Matrix3 = [
    [1.224940, -0.224940, 0.000000],
    [-0.042057, 1.042057, 0.000000],
    [-0.019638, -0.078636, 1.098274],
];
const P3_TO_BT2100: Matrix3 = [
    [0.753833, 0.198597, 0.047570],
    [0.045744, 0.941777, 0.012479],
    [-0.001210, 0.017601, 0.983608],
];
const BT2100_TO_BT709: Matrix3 = [
    [1.660491, -0.587641, -0.072850],
    [-0.124551, 1.132900, -0.008349],
    [-0.018151, -0.100579, 1.118730],
];
const BT2100_TO_P3: Matrix3 = [
    [1.343578, -0.282179, -0.061399],
    [-0.065298, 1.075788, -0.010491],
    [0.002822, -0.019598, 1.016777],
];

#[inline]
fn apply_matrix(m: &Matrix3, [r, g, b]: Rgb) -> Rgb {
    [
        m[0][0] * r + m[0][1] * g + m[0][2] * b,
        m[1][0] * r + m[1][1] * g + m[1][2] * b,
        m[2][0] * r + m[2][1] * g + m[2][2] * b,
    ]
}

/// Primaries conversion between two specified gamuts.
///
/// Identity when source equals destination.
#[derive(Debug, Clone, Copy)]
pub struct GamutConversion {
    matrix: Option<&'static Matrix3>,
}

impl GamutConversion {
    /// Select the matrix for an ordered gamut pair.
    pub fn new(source: ColorGamut, destination: ColorGamut) -> Result<Self> {
        use ColorGamut::*;
        let matrix = match (source, destination) {
            (Unspecified, _) | (_, Unspecified) => return Err(Error::InvalidGamut),
            (Bt709, P3) => Some(&BT709_TO_P3),
            (Bt709, Bt2100) => Some(&BT709_TO_BT2100),
            (P3, Bt709) => Some(&P3_TO_BT709),
            (P3, Bt2100) => Some(&P3_TO_BT2100),
            (Bt2100, Bt709) => Some(&BT2100_TO_BT709),
            (Bt2100, P3) => Some(&BT2100_TO_P3),
            _ => None,
        };
        Ok(Self { matrix })
    }

    /// Convert a linear RGB triple.
    #[inline]
    pub fn apply(&self, rgb: Rgb) -> Rgb {
        match self.matrix {
            Some(m) => apply_matrix(m, rgb),
            None => rgb,
        }
    }
}

// ============================================================================
// Luminance
// ============================================================================

/// BT.709 luminance from linear RGB.
#[inline]
pub fn srgb_luminance([r, g, b]: Rgb) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Display P3 luminance from linear RGB.
#[inline]
pub fn p3_luminance([r, g, b]: Rgb) -> f32 {
    0.20949 * r + 0.72160 * g + 0.06891 * b
}

/// BT.2100 luminance from linear RGB.
#[inline]
pub fn bt2100_luminance([r, g, b]: Rgb) -> f32 {
    0.2627 * r + 0.6780 * g + 0.0593 * b
}

/// Luminance function keyed by gamut.
pub fn luminance_for_gamut(gamut: ColorGamut) -> Result<fn(Rgb) -> f32> {
    match gamut {
        ColorGamut::Bt709 => Ok(srgb_luminance),
        ColorGamut::P3 => Ok(p3_luminance),
        ColorGamut::Bt2100 => Ok(bt2100_luminance),
        ColorGamut::Unspecified => Err(Error::InvalidGamut),
    }
}

// ============================================================================
// Full-range YUV decoding
// ============================================================================

/// Full-range BT.601 YUV to RGB. Also the matrix for JPEG-decoded SDR
/// regardless of declared gamut, and for Display P3 content.
#[inline]
pub fn bt601_yuv_to_rgb([y, u, v]: Rgb) -> Rgb {
    [
        y + 1.402 * v,
        y - 0.344136 * u - 0.714136 * v,
        y + 1.772 * u,
    ]
}

/// Full-range BT.709 YUV to RGB.
#[inline]
pub fn bt709_yuv_to_rgb([y, u, v]: Rgb) -> Rgb {
    [
        y + 1.5748 * v,
        y - 0.18733 * u - 0.46813 * v,
        y + 1.8556 * u,
    ]
}

/// Full-range BT.2020 YUV to RGB.
#[inline]
pub fn bt2020_yuv_to_rgb([y, u, v]: Rgb) -> Rgb {
    [
        y + 1.4746 * v,
        y - 0.16455 * u - 0.57135 * v,
        y + 1.8814 * u,
    ]
}

/// YUV decoding matrix keyed by gamut.
pub fn yuv_to_rgb_for_gamut(gamut: ColorGamut) -> Result<fn(Rgb) -> Rgb> {
    match gamut {
        ColorGamut::Bt709 => Ok(bt709_yuv_to_rgb),
        ColorGamut::P3 => Ok(bt601_yuv_to_rgb),
        ColorGamut::Bt2100 => Ok(bt2020_yuv_to_rgb),
        ColorGamut::Unspecified => Err(Error::InvalidGamut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_conversion_for_equal_gamuts() {
        let conv = GamutConversion::new(ColorGamut::P3, ColorGamut::P3).unwrap();
        let rgb = [0.25, 0.5, 0.75];
        assert_eq!(conv.apply(rgb), rgb);
    }

    #[test]
    fn unspecified_gamut_is_rejected() {
        assert!(GamutConversion::new(ColorGamut::Unspecified, ColorGamut::Bt709).is_err());
        assert!(luminance_for_gamut(ColorGamut::Unspecified).is_err());
        assert!(yuv_to_rgb_for_gamut(ColorGamut::Unspecified).is_err());
    }

    /// White must map to white through every conversion matrix.
    #[test]
    fn conversions_preserve_white() {
        use ColorGamut::*;
        for (src, dst) in [
            (Bt709, P3),
            (Bt709, Bt2100),
            (P3, Bt709),
            (P3, Bt2100),
            (Bt2100, Bt709),
            (Bt2100, P3),
        ] {
            let conv = GamutConversion::new(src, dst).unwrap();
            let white = conv.apply([1.0, 1.0, 1.0]);
            for c in white {
                assert!((c - 1.0).abs() < 2e-3, "{src:?}->{dst:?} white drifted: {c}");
            }
        }
    }

    /// Forward and reverse matrices must compose to near identity.
    #[test]
    fn conversions_invert() {
        use ColorGamut::*;
        let probes = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.3, 0.6, 0.1]];
        for (a, b) in [(Bt709, P3), (Bt709, Bt2100), (P3, Bt2100)] {
            let fwd = GamutConversion::new(a, b).unwrap();
            let rev = GamutConversion::new(b, a).unwrap();
            for probe in probes {
                let roundtrip = rev.apply(fwd.apply(probe));
                for i in 0..3 {
                    assert!(
                        (roundtrip[i] - probe[i]).abs() < 5e-3,
                        "{a:?}<->{b:?} roundtrip drifted: {roundtrip:?} vs {probe:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn luminance_weights_sum_to_one() {
        for lum in [srgb_luminance, p3_luminance, bt2100_luminance] {
            assert!((lum([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn yuv_gray_decodes_to_gray() {
        for decode in [bt601_yuv_to_rgb, bt709_yuv_to_rgb, bt2020_yuv_to_rgb] {
            let rgb = decode([0.5, 0.0, 0.0]);
            for c in rgb {
                assert!((c - 0.5).abs() < 1e-6);
            }
        }
    }
}
