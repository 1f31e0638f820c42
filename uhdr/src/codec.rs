//! Codec collaborator traits.
//!
//! The pipeline treats the actual JPEG, HEVC and AV1 codecs as opaque
//! collaborators behind these narrow interfaces. Implementations wrap
//! whatever codec library the embedding application ships; the test suite
//! uses structural fakes. Codec failures surface as
//! [`Error::EncodeError`] / [`Error::DecodeError`] whatever the cause.

use uhdr_core::{PixelBuffer, Result};

use crate::metadata::IsoGainMapRecord;

/// A decoded JPEG plus the side data the container layer cares about.
#[derive(Debug)]
pub struct DecodedJpeg {
    /// Decoded pixels. YUV 4:2:0 for color images, monochrome for gain
    /// maps; decoders that only produce RGBA may return that for SDR
    /// display paths.
    pub image: PixelBuffer,
    /// ICC profile bytes, when the stream carried one.
    pub icc: Option<Vec<u8>>,
    /// EXIF payload, when present.
    pub exif: Option<Vec<u8>>,
    /// XMP packet text, when present.
    pub xmp: Option<String>,
}

/// JPEG encode/decode collaborator.
pub trait JpegCodec {
    /// Compress planar image data.
    ///
    /// `chroma` is `None` for single-channel (gain map) images. Strides
    /// are in samples. `icc`, when given, is embedded as an APP2 profile.
    #[allow(clippy::too_many_arguments)]
    fn compress(
        &self,
        luma: &[u8],
        chroma: Option<&[u8]>,
        width: usize,
        height: usize,
        luma_stride: usize,
        chroma_stride: usize,
        quality: u8,
        icc: Option<&[u8]>,
    ) -> Result<Vec<u8>>;

    /// Decompress a JPEG stream.
    fn decompress(&self, data: &[u8]) -> Result<DecodedJpeg>;
}

/// Compression backend for an ISOBMFF container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeifCompression {
    /// HEVC-backed HEIC.
    Hevc,
    /// AV1-backed AVIF.
    Av1,
}

/// A decoded HEIF container.
#[derive(Debug)]
pub struct HeifDecoded {
    /// Luma bit depth of the primary item (8 or 10).
    pub bit_depth: u8,
    /// Primary image: YUV 4:2:0 for 8-bit, P010 for 10-bit.
    pub image: PixelBuffer,
    /// Gain map secondary item with its metadata record, when present.
    pub gainmap: Option<(PixelBuffer, IsoGainMapRecord)>,
    /// EXIF metadata block, when present.
    pub exif: Option<Vec<u8>>,
}

/// HEIC/AVIF encode/decode collaborator.
pub trait HeifCodec {
    /// Write a container with a primary image and an optional gain map
    /// secondary item.
    ///
    /// The primary is YUV 4:2:0 8-bit or planar 10-bit RGB; the gain map
    /// is monochrome and travels with its rational metadata record.
    fn encode(
        &self,
        primary: &PixelBuffer,
        gainmap: Option<(&PixelBuffer, &IsoGainMapRecord)>,
        quality: u8,
        compression: HeifCompression,
        exif: Option<&[u8]>,
    ) -> Result<Vec<u8>>;

    /// Read a container.
    fn decode(&self, data: &[u8]) -> Result<HeifDecoded>;
}
