//! Ultra HDR container assembly and pipeline orchestration.
//!
//! An Ultra HDR image is a backwards-compatible SDR base picture plus an
//! embedded gain map: a small monochrome image and a handful of scalar
//! parameters that together reconstruct the HDR picture on a capable
//! display. Legacy viewers see the SDR image; HDR viewers apply the map.
//!
//! # Crate structure
//!
//! - [`uhdr_core`] - gain map math, tone mapping, geometric editing (no
//!   codec dependency)
//! - `uhdr` (this crate) - JPEG/R and HEIF/R containers, XMP/MPF/ISO
//!   metadata, and the [`UltraHdr`] pipeline assembler
//!
//! The actual JPEG/HEVC/AV1 codecs are external collaborators supplied
//! through the [`codec::JpegCodec`] and [`codec::HeifCodec`] traits.
//!
//! # Example
//!
//! ```ignore
//! use uhdr::{ConvertConfig, OutputCodec, UltraHdr};
//!
//! let mut pipeline = UltraHdr::new(Box::new(my_jpeg_codec));
//! pipeline.add_uncompressed(&hdr_p010)?;
//! pipeline.add_uncompressed(&sdr_yuv)?;
//!
//! let config = ConvertConfig::new(OutputCodec::JpegR);
//! let jpegr = pipeline.convert(&config)?;
//! ```
//!
//! # Standards
//!
//! - [Ultra HDR Image Format v1.1](https://developer.android.com/media/platform/hdr-image-format)
//! - Adobe XMP (hdrgm namespace), CIPA DC-007 (MPF)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod container;
pub mod jpeg;
pub mod metadata;
mod pipeline;

pub use pipeline::{ConvertConfig, OutputCodec, UltraHdr, GAINMAP_JPEG_QUALITY};

// Re-export the core so downstream users need a single dependency.
pub use uhdr_core::{
    ColorGamut, CompressedImage, Effect, Error, GainMapMetadata, HdrTransfer, MirrorAxis,
    Parallelism, PixelBuffer, PixelFormat, Result,
};
