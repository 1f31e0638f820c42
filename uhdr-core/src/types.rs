//! Core types shared by every pipeline stage.

use thiserror::Error;

use crate::limits;

/// Errors reported by the gain map pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required input buffer is missing or empty.
    #[error("required input is missing or empty: {0}")]
    BadPointer(&'static str),

    /// Image dimensions are zero, odd where evenness is required, or exceed limits.
    #[error("unsupported image dimensions: {0}x{1}")]
    UnsupportedWidthHeight(usize, usize),

    /// A color gamut was left unspecified where one is required.
    #[error("color gamut must be specified")]
    InvalidGamut,

    /// A plane stride is smaller than the plane width.
    #[error("invalid stride for {0} plane")]
    InvalidStride(&'static str),

    /// The HDR transfer function is unknown or not usable here.
    #[error("invalid transfer function")]
    InvalidTransfer,

    /// Two images that must share dimensions do not.
    #[error("resolution mismatch: {0}x{1} vs {2}x{3}")]
    ResolutionMismatch(usize, usize, usize, usize),

    /// Quality factor outside `0..=100`.
    #[error("quality factor out of range: {0}")]
    InvalidQuality(u8),

    /// Display boost below 1.0.
    #[error("invalid display boost: {0}")]
    InvalidDisplayBoost(f32),

    /// The requested output codec/pixel-format combination is not valid.
    #[error("invalid output format")]
    InvalidOutputFormat,

    /// Gain map metadata is out of range or inconsistent.
    #[error("bad gain map metadata: {0}")]
    BadMetadata(String),

    /// Crop rectangle, rotation angle or resize target is invalid.
    #[error("invalid cropping or geometry parameters")]
    InvalidCropping,

    /// A codec collaborator failed to encode.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// A codec collaborator failed to decode.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// A gain map container was expected but no secondary image was found.
    #[error("gain map image not found")]
    GainMapImageNotFound,

    /// An output buffer or size limit cannot hold the result.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required for the operation.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Metadata serialization or parsing failed structurally.
    #[error("metadata error: {0}")]
    MetadataError(String),

    /// The input bytes contain no recognizable image.
    #[error("no images found in input")]
    NoImagesFound,

    /// More than one EXIF block was supplied for a single container.
    #[error("multiple EXIF blocks received")]
    MultipleExifs,

    /// The base/map dimension ratio is not integral or differs per axis.
    #[error("unsupported gain map scale factor")]
    UnsupportedMapScaleFactor,

    /// The operation is valid but not supported by this implementation.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// The assembler does not hold the artifacts needed for the request.
    #[error("insufficient resources to satisfy request: {0}")]
    InsufficientResource(&'static str),

    /// Catch-all for unexpected internal failures.
    #[error("unknown error")]
    Unknown,
}

/// Result type used throughout the pipeline.
pub type Result<T> = core::result::Result<T, Error>;

/// Color gamut / primaries of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorGamut {
    /// No gamut declared. Rejected by the gain map stages.
    #[default]
    Unspecified,
    /// BT.709 / sRGB primaries.
    Bt709,
    /// Display P3 primaries.
    P3,
    /// BT.2100 / BT.2020 wide gamut primaries.
    Bt2100,
}

/// Transfer function of an HDR input or requested HDR output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HdrTransfer {
    /// Already linear light, normalized so 1.0 = 1000 nits.
    Linear,
    /// Hybrid Log-Gamma per ITU-R BT.2100.
    #[default]
    Hlg,
    /// Perceptual Quantizer per ITU-R BT.2100 / SMPTE ST 2084.
    Pq,
}

/// Pixel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 10-bit YUV 4:2:0; each sample in the top bits of a 16-bit word,
    /// chroma interleaved UVUV.
    P010,
    /// 8-bit planar YUV 4:2:0 (Y plane, then U plane, then V plane).
    Yuv420,
    /// 8-bit single channel (gain maps).
    Monochrome,
    /// Packed 8-bit RGBA.
    Rgba8888,
    /// Packed half-float RGBA (linear light).
    RgbaF16,
    /// Packed 10:10:10:2 RGBA word.
    Rgba1010102,
    /// Three planar 10-bit channels stored in 16-bit words (R, G, B planes).
    Rgb10Planar,
}

impl PixelFormat {
    /// Bytes per pixel for packed layouts, `None` for planar ones.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Rgba8888 | Self::Rgba1010102 => Some(4),
            Self::RgbaF16 => Some(8),
            Self::Monochrome => Some(1),
            Self::P010 | Self::Yuv420 | Self::Rgb10Planar => None,
        }
    }

    /// True for layouts that carry a subsampled chroma plane.
    pub fn has_chroma(self) -> bool {
        matches!(self, Self::P010 | Self::Yuv420)
    }
}

/// An uncompressed image or gain map.
///
/// The buffer owns its backing storage. Chroma, when present, is described
/// by an integer byte offset into the same allocation (`None` means the
/// chroma plane immediately follows the luma plane). Strides are in samples,
/// not bytes.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    /// Pixel layout.
    pub format: PixelFormat,
    /// Color gamut.
    pub gamut: ColorGamut,
    /// Width of the luma plane in pixels.
    pub width: usize,
    /// Height of the luma plane in pixels.
    pub height: usize,
    /// Luma (or packed pixel) stride in samples. At least `width`.
    pub luma_stride: usize,
    /// Chroma stride in samples. For 4:2:0 at least `width / 2`; for P010
    /// at least `width` (U and V samples count separately when interleaved).
    pub chroma_stride: usize,
    /// Byte offset of the chroma plane, or `None` when it follows luma.
    pub chroma_offset: Option<usize>,
    /// Backing storage.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer with tight strides.
    pub fn new(width: usize, height: usize, format: PixelFormat, gamut: ColorGamut) -> Result<Self> {
        let chroma_stride = match format {
            PixelFormat::Yuv420 => width / 2,
            PixelFormat::P010 => width,
            _ => 0,
        };
        Self::with_strides(width, height, format, gamut, width, chroma_stride)
    }

    /// Allocate a zeroed buffer with explicit strides.
    pub fn with_strides(
        width: usize,
        height: usize,
        format: PixelFormat,
        gamut: ColorGamut,
        luma_stride: usize,
        chroma_stride: usize,
    ) -> Result<Self> {
        Self::validate_dimensions(width, height, format)?;
        if luma_stride < width {
            return Err(Error::InvalidStride("luma"));
        }
        match format {
            PixelFormat::Yuv420 if chroma_stride < width / 2 => {
                return Err(Error::InvalidStride("chroma"))
            }
            PixelFormat::P010 if chroma_stride < width => {
                return Err(Error::InvalidStride("chroma"))
            }
            _ => {}
        }

        let mut buf = Self {
            format,
            gamut,
            width,
            height,
            luma_stride,
            chroma_stride,
            chroma_offset: None,
            data: Vec::new(),
        };
        buf.data = vec![0u8; buf.total_bytes()];
        Ok(buf)
    }

    /// Wrap existing sample data, using tight strides.
    pub fn from_data(
        width: usize,
        height: usize,
        format: PixelFormat,
        gamut: ColorGamut,
        data: Vec<u8>,
    ) -> Result<Self> {
        let mut buf = Self::with_strides(
            width,
            height,
            format,
            gamut,
            width,
            match format {
                PixelFormat::Yuv420 => width / 2,
                PixelFormat::P010 => width,
                _ => 0,
            },
        )?;
        let needed = buf.total_bytes();
        if data.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: data.len(),
            });
        }
        buf.data = data;
        Ok(buf)
    }

    fn validate_dimensions(width: usize, height: usize, format: PixelFormat) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedWidthHeight(width, height));
        }
        if width > limits::MAX_IMAGE_DIMENSION || height > limits::MAX_IMAGE_DIMENSION {
            return Err(Error::UnsupportedWidthHeight(width, height));
        }
        if width as u64 * height as u64 > limits::MAX_TOTAL_PIXELS {
            return Err(Error::UnsupportedWidthHeight(width, height));
        }
        if format.has_chroma() && (width % 2 != 0 || height % 2 != 0) {
            return Err(Error::UnsupportedWidthHeight(width, height));
        }
        Ok(())
    }

    /// Size in bytes of the luma (or packed pixel) plane, including stride padding.
    pub fn luma_plane_bytes(&self) -> usize {
        match self.format {
            PixelFormat::Yuv420 | PixelFormat::Monochrome => self.height * self.luma_stride,
            PixelFormat::P010 | PixelFormat::Rgb10Planar => self.height * self.luma_stride * 2,
            PixelFormat::Rgba8888 | PixelFormat::Rgba1010102 => self.height * self.luma_stride * 4,
            PixelFormat::RgbaF16 => self.height * self.luma_stride * 8,
        }
    }

    /// Size in bytes of the chroma planes (zero for formats without chroma).
    pub fn chroma_plane_bytes(&self) -> usize {
        match self.format {
            // Planar U then planar V, each height/2 rows.
            PixelFormat::Yuv420 => (self.height / 2) * self.chroma_stride * 2,
            // Interleaved UV rows of 16-bit samples, height/2 rows.
            PixelFormat::P010 => (self.height / 2) * self.chroma_stride * 2,
            _ => 0,
        }
    }

    /// Total allocation size in bytes.
    pub fn total_bytes(&self) -> usize {
        match self.format {
            // Three full-resolution planes.
            PixelFormat::Rgb10Planar => self.luma_plane_bytes() * 3,
            _ => self.luma_plane_bytes() + self.chroma_plane_bytes(),
        }
    }

    /// Byte offset where the chroma plane begins.
    pub fn chroma_start(&self) -> usize {
        self.chroma_offset.unwrap_or_else(|| self.luma_plane_bytes())
    }

    /// The luma (or packed pixel) plane.
    pub fn luma(&self) -> &[u8] {
        &self.data[..self.luma_plane_bytes()]
    }

    /// The chroma plane(s). Empty for formats without chroma.
    pub fn chroma(&self) -> &[u8] {
        let len = self.chroma_plane_bytes();
        if len == 0 {
            return &[];
        }
        let start = self.chroma_start();
        &self.data[start..start + len]
    }

    /// U and V planes of a 4:2:0 buffer.
    pub fn chroma_planes(&self) -> (&[u8], &[u8]) {
        debug_assert_eq!(self.format, PixelFormat::Yuv420);
        let chroma = self.chroma();
        let half = (self.height / 2) * self.chroma_stride;
        (&chroma[..half], &chroma[half..])
    }

    /// Mutable luma and chroma planes, borrowed simultaneously.
    pub fn split_planes_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        let start = self.chroma_start();
        let chroma_len = self.chroma_plane_bytes();
        let luma_len = self.luma_plane_bytes();
        let (head, tail) = self.data.split_at_mut(start);
        (&mut head[..luma_len], &mut tail[..chroma_len])
    }
}

/// A compressed image held or produced by the assembler.
#[derive(Debug, Clone, Default)]
pub struct CompressedImage {
    /// Compressed bytes. Length is the used length; capacity is whatever the
    /// allocation happens to hold.
    pub data: Vec<u8>,
    /// Color gamut of the encoded image.
    pub gamut: ColorGamut,
}

impl CompressedImage {
    /// Wrap compressed bytes with a declared gamut.
    pub fn new(data: Vec<u8>, gamut: ColorGamut) -> Self {
        Self { data, gamut }
    }
}

/// Scalar parameters describing how a gain map reconstructs HDR.
///
/// All values are stored linearly; the boost and capacity fields are
/// log2-encoded only when serialized to XMP or an ISO rational record.
#[derive(Debug, Clone, PartialEq)]
pub struct GainMapMetadata {
    /// Gain map format version.
    pub version: String,
    /// Largest HDR/SDR ratio the map encodes.
    pub max_content_boost: f32,
    /// Smallest HDR/SDR ratio the map encodes.
    pub min_content_boost: f32,
    /// Gamma applied to the encoded map samples.
    pub gamma: f32,
    /// Linear offset added to SDR values before the ratio.
    pub offset_sdr: f32,
    /// Linear offset added to HDR values before the ratio.
    pub offset_hdr: f32,
    /// Display headroom at which the map starts to apply.
    pub hdr_capacity_min: f32,
    /// Display headroom at which the map applies fully.
    pub hdr_capacity_max: f32,
}

impl Default for GainMapMetadata {
    fn default() -> Self {
        Self {
            version: crate::GAINMAP_VERSION.into(),
            max_content_boost: 1.0,
            min_content_boost: 1.0,
            gamma: 1.0,
            offset_sdr: 0.0,
            offset_hdr: 0.0,
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 1.0,
        }
    }
}

impl GainMapMetadata {
    /// Check the invariants every consumer relies on.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("maxContentBoost", self.max_content_boost),
            ("minContentBoost", self.min_content_boost),
            ("gamma", self.gamma),
            ("offsetSdr", self.offset_sdr),
            ("offsetHdr", self.offset_hdr),
            ("hdrCapacityMin", self.hdr_capacity_min),
            ("hdrCapacityMax", self.hdr_capacity_max),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::BadMetadata(format!("{name} must be finite")));
            }
        }
        if self.min_content_boost < 0.0 || self.max_content_boost < self.min_content_boost {
            return Err(Error::BadMetadata(format!(
                "content boost range invalid: min {} max {}",
                self.min_content_boost, self.max_content_boost
            )));
        }
        if self.hdr_capacity_min < 1.0 || self.hdr_capacity_max < self.hdr_capacity_min {
            return Err(Error::BadMetadata(format!(
                "hdr capacity range invalid: min {} max {}",
                self.hdr_capacity_min, self.hdr_capacity_max
            )));
        }
        if self.gamma <= 0.0 {
            return Err(Error::BadMetadata(format!("gamma must be positive: {}", self.gamma)));
        }
        Ok(())
    }
}

/// Mirror axis for the geometric editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAxis {
    /// Flip columns (left/right).
    Horizontal,
    /// Flip rows (top/bottom).
    Vertical,
}

/// A geometric edit applied to a base image and its gain map as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Keep the inclusive pixel rectangle `[left, right] x [top, bottom]`.
    Crop {
        /// Leftmost column kept.
        left: usize,
        /// Rightmost column kept (inclusive).
        right: usize,
        /// Topmost row kept.
        top: usize,
        /// Bottom row kept (inclusive).
        bottom: usize,
    },
    /// Mirror along an axis.
    Mirror(MirrorAxis),
    /// Rotate clockwise; only 90, 180 and 270 are accepted.
    Rotate(u32),
    /// Nearest-neighbor resize to the given dimensions.
    Resize {
        /// Target width.
        width: usize,
        /// Target height.
        height: usize,
    },
}
