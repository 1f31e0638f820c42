//! Core gain map math for Ultra HDR still images.
//!
//! This crate provides the pure computational half of the pipeline:
//! - Gain map generation from an SDR / HDR image pair
//! - Gain map application for HDR reconstruction
//! - A conservative HDR to SDR tone mapper
//! - Geometric editing (crop, mirror, rotate, resize) of base/map pairs
//! - Color space conversions and transfer functions
//!
//! This crate has **no codec dependency**. Container assembly and the
//! pipeline orchestrator live in the `uhdr` crate, which consumes JPEG and
//! HEIF codecs through narrow collaborator traits.
//!
//! # Example
//!
//! ```ignore
//! use uhdr_core::{
//!     gainmap::{apply_gainmap, generate_gainmap, OutputFormat},
//!     HdrTransfer, Parallelism,
//! };
//!
//! let (map, metadata) =
//!     generate_gainmap(&sdr, &hdr, HdrTransfer::Hlg, false, Parallelism::detect())?;
//! let hdr_out = apply_gainmap(
//!     &sdr, &map, &metadata, OutputFormat::HdrLinear, 4.0, Parallelism::detect(),
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod color;
pub mod editor;
pub mod gainmap;
mod jobs;
pub mod tonemap;
mod types;

pub use jobs::{JobQueue, Parallelism};
pub use types::{
    ColorGamut, CompressedImage, Effect, Error, GainMapMetadata, HdrTransfer, MirrorAxis,
    PixelBuffer, PixelFormat, Result,
};

/// Gain map format version emitted by the generator.
pub const GAINMAP_VERSION: &str = "1.0";

/// Fixed ratio between base image and gain map dimensions on each axis.
pub const MAP_SCALE_FACTOR: usize = 4;

/// Height of a parallel job tile in base-image rows.
///
/// A multiple of [`MAP_SCALE_FACTOR`] so map tiles stay whole.
pub const JOB_SIZE_ROWS: usize = 16;

/// Worst-case intermediate allocation: a 4K 4:2:0 frame.
pub const MAX_BUFFER_SIZE: usize = 3840 * 2160 * 3 / 2;

/// Reference display luminances in nits.
pub mod nits {
    /// SDR reference white.
    pub const SDR_WHITE_NITS: f32 = 203.0;
    /// HLG nominal peak.
    pub const HLG_MAX_NITS: f32 = 1000.0;
    /// PQ nominal peak.
    pub const PQ_MAX_NITS: f32 = 10000.0;
}

/// Safety limits for parsing and allocation.
pub mod limits {
    /// Maximum image dimension (width or height).
    pub const MAX_IMAGE_DIMENSION: usize = 65535;

    /// Maximum total pixels (width * height).
    pub const MAX_TOTAL_PIXELS: u64 = 500_000_000;
}

const _: () = assert!(JOB_SIZE_ROWS % MAP_SCALE_FACTOR == 0);
