//! Rational gain map metadata records for HEIF containers.
//!
//! HEIC/AVIF gain map items carry their parameters as `N/D` rationals.
//! Boost and capacity values are stored in log2 space like XMP; gamma and
//! offsets are linear with a fixed 10^6 denominator. The monochrome
//! pipeline writes three identical channel entries.

use uhdr_core::{GainMapMetadata, Result, GAINMAP_VERSION};

/// Fixed denominator for gamma and offset rationals.
pub const FRACTION_DENOMINATOR: u32 = 1_000_000;

/// A signed rational number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fraction {
    /// Numerator.
    pub numerator: i32,
    /// Denominator; zero denotes an invalid fraction and reads as 0.
    pub denominator: u32,
}

impl Fraction {
    /// Approximate a float with a `N / 10^6` rational.
    pub fn from_f32(value: f32) -> Self {
        Self {
            numerator: (value * FRACTION_DENOMINATOR as f32).round() as i32,
            denominator: FRACTION_DENOMINATOR,
        }
    }

    /// Recover the float value; zero when the denominator is zero.
    pub fn to_f32(self) -> f32 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f32 / self.denominator as f32
        }
    }
}

/// Gain map metadata as stored in a HEIF gain map item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsoGainMapRecord {
    /// Per-channel log2 minimum content boost.
    pub gainmap_min: [Fraction; 3],
    /// Per-channel log2 maximum content boost.
    pub gainmap_max: [Fraction; 3],
    /// Per-channel encoding gamma (linear).
    pub gamma: [Fraction; 3],
    /// Per-channel SDR offset (linear).
    pub base_offset: [Fraction; 3],
    /// Per-channel HDR offset (linear).
    pub alternate_offset: [Fraction; 3],
    /// log2 display headroom where the map starts to apply.
    pub base_hdr_headroom: Fraction,
    /// log2 display headroom where the map applies fully.
    pub alternate_hdr_headroom: Fraction,
}

impl IsoGainMapRecord {
    /// Encode linear metadata into the rational wire representation.
    pub fn from_metadata(metadata: &GainMapMetadata) -> Self {
        Self {
            gainmap_min: [Fraction::from_f32(metadata.min_content_boost.log2()); 3],
            gainmap_max: [Fraction::from_f32(metadata.max_content_boost.log2()); 3],
            gamma: [Fraction::from_f32(metadata.gamma); 3],
            base_offset: [Fraction::from_f32(metadata.offset_sdr); 3],
            alternate_offset: [Fraction::from_f32(metadata.offset_hdr); 3],
            base_hdr_headroom: Fraction::from_f32(metadata.hdr_capacity_min.log2()),
            alternate_hdr_headroom: Fraction::from_f32(metadata.hdr_capacity_max.log2()),
        }
    }

    /// Decode back to linear metadata, validating the recovered ranges.
    pub fn to_metadata(&self) -> Result<GainMapMetadata> {
        let metadata = GainMapMetadata {
            version: GAINMAP_VERSION.into(),
            min_content_boost: self.gainmap_min[0].to_f32().exp2(),
            max_content_boost: self.gainmap_max[0].to_f32().exp2(),
            gamma: self.gamma[0].to_f32(),
            offset_sdr: self.base_offset[0].to_f32(),
            offset_hdr: self.alternate_offset[0].to_f32(),
            hdr_capacity_min: self.base_hdr_headroom.to_f32().exp2(),
            hdr_capacity_max: self.alternate_hdr_headroom.to_f32().exp2(),
        };
        metadata.validate()?;
        Ok(metadata)
    }
}
