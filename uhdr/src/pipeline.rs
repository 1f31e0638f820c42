//! The pipeline assembler: a state machine over supplied and derived
//! artifacts.
//!
//! Inputs land in first-writer-wins slots; `convert` picks the
//! minimum-work path from whatever is populated to the requested output,
//! memoizing intermediates so a second request reuses work.

use tracing::{debug, warn};

use uhdr_core::color::yuv420_to_rgba8888;
use uhdr_core::editor::{add_effects, scale_effects_for_map};
use uhdr_core::gainmap::{apply_gainmap, generate_gainmap, OutputFormat};
use uhdr_core::tonemap::tone_map;
use uhdr_core::{
    ColorGamut, CompressedImage, Effect, Error, GainMapMetadata, HdrTransfer, Parallelism,
    PixelBuffer, PixelFormat, Result,
};

use crate::codec::{HeifCodec, HeifCompression, JpegCodec};
use crate::container::{encode_jpegr, extract_primary_and_gainmap, parse_gainmap_metadata};
use crate::jpeg::{is_heif, is_jpeg};
use crate::metadata::IsoGainMapRecord;

/// Fixed quality for the compressed gain map image.
pub const GAINMAP_JPEG_QUALITY: u8 = 85;

/// Display boost used when baking HDR pixels for 10-bit HEIF output.
const HEIF_10BIT_DISPLAY_BOOST: f32 = 1000.0;

/// Output container or pixel request for [`UltraHdr::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCodec {
    /// Plain SDR JPEG.
    Jpeg,
    /// JPEG with an embedded gain map (JPEG/R).
    JpegR,
    /// Plain SDR HEIC.
    Heic,
    /// HEIC with a gain map secondary item.
    HeicR,
    /// HEIC with a 10-bit HDR primary image.
    Heic10Bit,
    /// Plain SDR AVIF.
    Avif,
    /// AVIF with a gain map secondary item.
    AvifR,
    /// AVIF with a 10-bit HDR primary image.
    Avif10Bit,
    /// Uncompressed pixels via [`UltraHdr::convert_raw`].
    RawPixels,
}

/// Conversion request.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Requested output codec.
    pub output_codec: OutputCodec,
    /// Pixel layout, only meaningful for [`OutputCodec::RawPixels`].
    pub pixel_format: Option<PixelFormat>,
    /// HDR transfer function for gain map generation and HDR outputs.
    pub transfer: HdrTransfer,
    /// Base image quality, `0..=100`.
    pub quality: u8,
    /// Peak boost of the target display, at least 1.0.
    pub max_display_boost: f32,
    /// Ordered edits applied to the base image and its gain map.
    pub effects: Vec<Effect>,
}

impl ConvertConfig {
    /// A request with default quality, transfer and no effects.
    pub fn new(output_codec: OutputCodec) -> Self {
        Self {
            output_codec,
            pixel_format: None,
            transfer: HdrTransfer::Hlg,
            quality: 90,
            max_display_boost: 1.0,
            effects: Vec::new(),
        }
    }
}

/// One logical pipeline: input slots, derived artifacts and outputs.
///
/// Every slot accepts its first writer and silently ignores later ones;
/// callers that need to observe replacement semantics should read the
/// slot back. Output buffers allocated during conversion live as long as
/// the assembler.
pub struct UltraHdr {
    jpeg: Box<dyn JpegCodec>,
    heif: Option<Box<dyn HeifCodec>>,
    parallelism: Parallelism,

    sdr_jpeg: Option<CompressedImage>,
    sdr_heif: Option<CompressedImage>,
    sdr_raw: Option<PixelBuffer>,
    /// True when `sdr_raw` came out of a JPEG decode and needs BT.601
    /// treatment during gain map generation.
    sdr_raw_is_bt601: bool,
    hdr_raw: Option<PixelBuffer>,
    gainmap_raw: Option<PixelBuffer>,
    gainmap_jpeg: Option<CompressedImage>,
    gainmap_metadata: Option<GainMapMetadata>,
    exif: Option<Vec<u8>>,

    compressed_outputs: Vec<CompressedImage>,
    raw_outputs: Vec<PixelBuffer>,
}

impl UltraHdr {
    /// Create an assembler around a JPEG codec collaborator.
    pub fn new(jpeg: Box<dyn JpegCodec>) -> Self {
        Self {
            jpeg,
            heif: None,
            parallelism: Parallelism::detect(),
            sdr_jpeg: None,
            sdr_heif: None,
            sdr_raw: None,
            sdr_raw_is_bt601: false,
            hdr_raw: None,
            gainmap_raw: None,
            gainmap_jpeg: None,
            gainmap_metadata: None,
            exif: None,
            compressed_outputs: Vec::new(),
            raw_outputs: Vec::new(),
        }
    }

    /// Register a HEIF codec collaborator for HEIC/AVIF paths.
    pub fn with_heif(mut self, heif: Box<dyn HeifCodec>) -> Self {
        self.heif = Some(heif);
        self
    }

    /// Pin the worker count used by the parallel stages.
    pub fn set_parallelism(&mut self, parallelism: Parallelism) {
        self.parallelism = parallelism;
    }

    /// Feed a compressed image: JPEG, JPEG/R, HEIC or AVIF.
    ///
    /// A JPEG/R container populates the base JPEG slot and, via the codec
    /// collaborators, the raw gain map and its metadata. A HEIF container
    /// populates the raw HDR slot when its primary image is 10-bit, or
    /// the raw and compressed SDR slots when 8-bit, plus EXIF and any
    /// gain map item.
    pub fn add_compressed(&mut self, data: &[u8], gamut: ColorGamut) -> Result<()> {
        if data.is_empty() {
            return Err(Error::BadPointer("compressed image"));
        }

        if is_jpeg(data) {
            return self.add_jpeg(data, gamut);
        }
        if is_heif(data) {
            return self.add_heif(data, gamut);
        }
        Err(Error::UnsupportedFeature("unrecognized container format"))
    }

    fn add_jpeg(&mut self, data: &[u8], gamut: ColorGamut) -> Result<()> {
        match extract_primary_and_gainmap(data) {
            Ok((primary, gainmap)) => {
                debug!("input is a JPEG/R container");
                if self.sdr_jpeg.is_none() {
                    self.sdr_jpeg =
                        Some(CompressedImage::new(data[primary].to_vec(), gamut));
                }
                let gainmap_bytes = &data[gainmap];
                if self.gainmap_metadata.is_none() {
                    self.gainmap_metadata = Some(parse_gainmap_metadata(gainmap_bytes)?);
                }
                if self.gainmap_raw.is_none() {
                    let decoded = self.jpeg.decompress(gainmap_bytes)?;
                    if decoded.image.format != PixelFormat::Monochrome {
                        return Err(Error::DecodeError(
                            "gain map item did not decode as monochrome".into(),
                        ));
                    }
                    self.gainmap_raw = Some(decoded.image);
                }
                if self.gainmap_jpeg.is_none() {
                    self.gainmap_jpeg = Some(CompressedImage::new(
                        gainmap_bytes.to_vec(),
                        ColorGamut::Unspecified,
                    ));
                }
                Ok(())
            }
            Err(Error::GainMapImageNotFound) => {
                debug!("input is a plain JPEG");
                if self.sdr_jpeg.is_none() {
                    self.sdr_jpeg = Some(CompressedImage::new(data.to_vec(), gamut));
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn add_heif(&mut self, data: &[u8], gamut: ColorGamut) -> Result<()> {
        let Some(heif) = &self.heif else {
            return Err(Error::UnsupportedFeature("no HEIF codec registered"));
        };
        let decoded = heif.decode(data)?;
        if self.exif.is_none() {
            self.exif = decoded.exif;
        }

        let mut image = decoded.image;
        if image.gamut == ColorGamut::Unspecified {
            image.gamut = gamut;
        }
        match decoded.bit_depth {
            10 => {
                debug!("input is a 10-bit HEIF");
                if self.hdr_raw.is_none() {
                    self.hdr_raw = Some(image);
                }
            }
            8 => {
                debug!("input is an 8-bit HEIF");
                if self.sdr_raw.is_none() {
                    self.sdr_raw = Some(image);
                    self.sdr_raw_is_bt601 = false;
                }
                if self.sdr_heif.is_none() {
                    self.sdr_heif = Some(CompressedImage::new(data.to_vec(), gamut));
                }
            }
            other => {
                return Err(Error::DecodeError(format!(
                    "unsupported HEIF bit depth: {other}"
                )))
            }
        }

        if let Some((map, record)) = decoded.gainmap {
            if self.gainmap_raw.is_none() {
                self.gainmap_raw = Some(map);
            }
            if self.gainmap_metadata.is_none() {
                self.gainmap_metadata = Some(record.to_metadata()?);
            }
        }
        Ok(())
    }

    /// Feed an uncompressed image: P010 fills the HDR slot, YUV 4:2:0 the
    /// SDR slot. First writer wins; later images are silently ignored.
    pub fn add_uncompressed(&mut self, image: &PixelBuffer) -> Result<()> {
        if image.data.is_empty() {
            return Err(Error::BadPointer("uncompressed image"));
        }
        match image.format {
            PixelFormat::P010 => {
                if self.hdr_raw.is_none() {
                    self.hdr_raw = Some(image.clone());
                }
                Ok(())
            }
            PixelFormat::Yuv420 => {
                if self.sdr_raw.is_none() {
                    self.sdr_raw = Some(image.clone());
                    self.sdr_raw_is_bt601 = false;
                }
                Ok(())
            }
            _ => Err(Error::UnsupportedFeature(
                "only P010 and YUV420 uncompressed inputs are accepted",
            )),
        }
    }

    /// Store EXIF bytes. First writer wins.
    pub fn add_exif(&mut self, exif: &[u8]) -> Result<()> {
        if exif.is_empty() {
            return Err(Error::BadPointer("exif"));
        }
        if self.exif.is_none() {
            self.exif = Some(exif.to_vec());
        }
        Ok(())
    }

    /// The stored raw gain map, if one has been supplied or derived.
    pub fn gain_map(&self) -> Option<&PixelBuffer> {
        self.gainmap_raw.as_ref()
    }

    /// The stored gain map metadata.
    pub fn gain_map_metadata(&self) -> Option<&GainMapMetadata> {
        self.gainmap_metadata.as_ref()
    }

    /// The stored EXIF bytes.
    pub fn exif(&self) -> Option<&[u8]> {
        self.exif.as_deref()
    }

    /// Drop every slot and owned output, returning to the empty state.
    pub fn reset(&mut self) {
        self.sdr_jpeg = None;
        self.sdr_heif = None;
        self.sdr_raw = None;
        self.sdr_raw_is_bt601 = false;
        self.hdr_raw = None;
        self.gainmap_raw = None;
        self.gainmap_jpeg = None;
        self.gainmap_metadata = None;
        self.exif = None;
        self.compressed_outputs.clear();
        self.raw_outputs.clear();
    }

    fn validate_config(&self, config: &ConvertConfig) -> Result<()> {
        if config.quality > 100 {
            return Err(Error::InvalidQuality(config.quality));
        }
        if !config.max_display_boost.is_finite() || config.max_display_boost < 1.0 {
            return Err(Error::InvalidDisplayBoost(config.max_display_boost));
        }
        Ok(())
    }

    /// Produce a compressed output.
    ///
    /// [`OutputCodec::RawPixels`] requests go through
    /// [`UltraHdr::convert_raw`] instead.
    pub fn convert(&mut self, config: &ConvertConfig) -> Result<&CompressedImage> {
        self.validate_config(config)?;
        match config.output_codec {
            OutputCodec::Jpeg => self.convert_jpeg(config),
            OutputCodec::JpegR => self.convert_jpegr(config),
            OutputCodec::Heic | OutputCodec::Avif => self.convert_heif_plain(config),
            OutputCodec::HeicR | OutputCodec::AvifR => self.convert_heif_r(config),
            OutputCodec::Heic10Bit | OutputCodec::Avif10Bit => self.convert_heif_10bit(config),
            OutputCodec::RawPixels => Err(Error::InvalidOutputFormat),
        }
    }

    fn convert_jpeg(&mut self, config: &ConvertConfig) -> Result<&CompressedImage> {
        if config.effects.is_empty() && self.sdr_jpeg.is_some() {
            debug!("reusing stored SDR JPEG unchanged");
            return self.sdr_jpeg.as_ref().ok_or(Error::Unknown);
        }

        self.maybe_decode_jpeg_sdr()?;
        self.maybe_tone_map()?;
        let Some(sdr) = &self.sdr_raw else {
            return Err(Error::InsufficientResource("no SDR image available"));
        };
        let edited = add_effects(sdr, &config.effects)?;
        let gamut = edited.gamut;
        let bytes = self.compress_base(&edited, config.quality)?;
        self.compressed_outputs.push(CompressedImage::new(bytes, gamut));
        self.compressed_outputs.last().ok_or(Error::Unknown)
    }

    fn convert_jpegr(&mut self, config: &ConvertConfig) -> Result<&CompressedImage> {
        // Fast path: every compressed piece already exists.
        if config.effects.is_empty()
            && self.sdr_jpeg.is_some()
            && self.gainmap_jpeg.is_some()
            && self.gainmap_metadata.is_some()
        {
            debug!("assembling JPEG/R from stored compressed pieces");
            let container = {
                let base = self.sdr_jpeg.as_ref().ok_or(Error::Unknown)?;
                let map = self.gainmap_jpeg.as_ref().ok_or(Error::Unknown)?;
                let metadata = self.gainmap_metadata.as_ref().ok_or(Error::Unknown)?;
                encode_jpegr(&base.data, &map.data, metadata, self.exif.as_deref())?
            };
            let gamut = self.sdr_jpeg.as_ref().map_or(ColorGamut::Unspecified, |j| j.gamut);
            self.compressed_outputs.push(CompressedImage::new(container, gamut));
            return self.compressed_outputs.last().ok_or(Error::Unknown);
        }

        // Materialize prerequisites: raw SDR (decode or tone map), then a
        // gain map generated from the raw pair when none is stored.
        self.maybe_decode_jpeg_sdr()?;
        self.maybe_tone_map()?;
        self.ensure_gainmap(config.transfer)?;
        if self.gainmap_raw.is_none() || self.gainmap_metadata.is_none() {
            return Err(Error::InsufficientResource(
                "no gain map and no HDR input to derive one from",
            ));
        }
        if self.sdr_raw.is_none() {
            return Err(Error::InsufficientResource("no SDR image available"));
        }

        let (base_edited, map_edited) = self.edited_pair(&config.effects)?;
        let (base_bytes, base_gamut) = match (&self.sdr_jpeg, config.effects.is_empty()) {
            (Some(jpeg), true) => (jpeg.data.clone(), jpeg.gamut),
            _ => (
                self.compress_base(&base_edited, config.quality)?,
                base_edited.gamut,
            ),
        };
        let map_bytes = match (&self.gainmap_jpeg, config.effects.is_empty()) {
            (Some(jpeg), true) => jpeg.data.clone(),
            _ => self.compress_gainmap(&map_edited)?,
        };
        let metadata = self.gainmap_metadata.clone().ok_or(Error::Unknown)?;

        let container = encode_jpegr(&base_bytes, &map_bytes, &metadata, self.exif.as_deref())?;
        self.compressed_outputs
            .push(CompressedImage::new(container, base_gamut));
        self.compressed_outputs.last().ok_or(Error::Unknown)
    }

    fn convert_heif_plain(&mut self, config: &ConvertConfig) -> Result<&CompressedImage> {
        self.maybe_tone_map()?;
        self.maybe_decode_jpeg_sdr()?;
        let Some(heif) = &self.heif else {
            return Err(Error::UnsupportedFeature("no HEIF codec registered"));
        };
        let Some(sdr) = &self.sdr_raw else {
            return Err(Error::InsufficientResource("no SDR image available"));
        };

        let edited = add_effects(sdr, &config.effects)?;
        let gamut = edited.gamut;
        let bytes = heif.encode(
            &edited,
            None,
            config.quality,
            heif_compression(config.output_codec),
            self.exif.as_deref(),
        )?;
        self.compressed_outputs.push(CompressedImage::new(bytes, gamut));
        self.compressed_outputs.last().ok_or(Error::Unknown)
    }

    fn convert_heif_r(&mut self, config: &ConvertConfig) -> Result<&CompressedImage> {
        self.maybe_decode_jpeg_sdr()?;
        self.maybe_tone_map()?;
        self.ensure_gainmap(config.transfer)?;
        if self.sdr_raw.is_none()
            || self.gainmap_raw.is_none()
            || self.gainmap_metadata.is_none()
        {
            return Err(Error::InsufficientResource(
                "gain map output needs an SDR image and a gain map",
            ));
        }

        let (base, map) = self.edited_pair(&config.effects)?;
        let record = IsoGainMapRecord::from_metadata(
            self.gainmap_metadata.as_ref().ok_or(Error::Unknown)?,
        );
        let Some(heif) = &self.heif else {
            return Err(Error::UnsupportedFeature("no HEIF codec registered"));
        };
        let gamut = base.gamut;
        let bytes = heif.encode(
            &base,
            Some((&map, &record)),
            config.quality,
            heif_compression(config.output_codec),
            self.exif.as_deref(),
        )?;
        self.compressed_outputs.push(CompressedImage::new(bytes, gamut));
        self.compressed_outputs.last().ok_or(Error::Unknown)
    }

    fn convert_heif_10bit(&mut self, config: &ConvertConfig) -> Result<&CompressedImage> {
        self.maybe_decode_jpeg_sdr()?;
        if self.sdr_raw.is_none()
            || self.gainmap_raw.is_none()
            || self.gainmap_metadata.is_none()
        {
            return Err(Error::InsufficientResource(
                "10-bit output needs an SDR image with a gain map",
            ));
        }

        let (base, map) = self.edited_pair(&config.effects)?;
        let metadata = self.gainmap_metadata.clone().ok_or(Error::Unknown)?;
        let hdr = apply_gainmap(
            &base,
            &map,
            &metadata,
            OutputFormat::HdrLinearRgb10Bit,
            HEIF_10BIT_DISPLAY_BOOST,
            self.parallelism,
        )?;

        let Some(heif) = &self.heif else {
            return Err(Error::UnsupportedFeature("no HEIF codec registered"));
        };
        let gamut = hdr.gamut;
        let bytes = heif.encode(
            &hdr,
            None,
            config.quality,
            heif_compression(config.output_codec),
            self.exif.as_deref(),
        )?;
        self.compressed_outputs.push(CompressedImage::new(bytes, gamut));
        self.compressed_outputs.last().ok_or(Error::Unknown)
    }

    /// Produce an uncompressed output for a
    /// [`OutputCodec::RawPixels`] request.
    pub fn convert_raw(&mut self, config: &ConvertConfig) -> Result<&PixelBuffer> {
        self.validate_config(config)?;
        if config.output_codec != OutputCodec::RawPixels {
            return Err(Error::InvalidOutputFormat);
        }
        let Some(format) = config.pixel_format else {
            return Err(Error::InvalidOutputFormat);
        };

        match format {
            PixelFormat::P010 => {
                if self.hdr_raw.is_some() && config.effects.is_empty() {
                    return self.hdr_raw.as_ref().ok_or(Error::Unknown);
                }
                Err(Error::InsufficientResource("no HDR image stored"))
            }

            PixelFormat::Yuv420 => {
                self.maybe_tone_map()?;
                self.maybe_decode_jpeg_sdr()?;
                if self.sdr_raw.is_none() {
                    return Err(Error::InsufficientResource("no SDR image available"));
                }
                if config.effects.is_empty() {
                    return self.sdr_raw.as_ref().ok_or(Error::Unknown);
                }
                let edited = {
                    let sdr = self.sdr_raw.as_ref().ok_or(Error::Unknown)?;
                    add_effects(sdr, &config.effects)?
                };
                self.raw_outputs.push(edited);
                self.raw_outputs.last().ok_or(Error::Unknown)
            }

            PixelFormat::Rgba8888 => {
                if !config.effects.is_empty() {
                    return Err(Error::UnsupportedFeature(
                        "effects are not supported on RGBA8888 decode",
                    ));
                }
                let rgba = if let Some(jpeg) = &self.sdr_jpeg {
                    let decoded = self.jpeg.decompress(&jpeg.data)?;
                    match decoded.image.format {
                        PixelFormat::Rgba8888 => decoded.image,
                        PixelFormat::Yuv420 => yuv420_to_rgba8888(&decoded.image)?,
                        other => {
                            return Err(Error::DecodeError(format!(
                                "unexpected decode format {other:?}"
                            )))
                        }
                    }
                } else if self.sdr_heif.is_some() {
                    let decoded = {
                        let Some(heif) = &self.heif else {
                            return Err(Error::UnsupportedFeature("no HEIF codec registered"));
                        };
                        let stored = self.sdr_heif.as_ref().ok_or(Error::Unknown)?;
                        heif.decode(&stored.data)?
                    };
                    match decoded.image.format {
                        PixelFormat::Rgba8888 => decoded.image,
                        PixelFormat::Yuv420 => yuv420_to_rgba8888(&decoded.image)?,
                        other => {
                            return Err(Error::DecodeError(format!(
                                "unexpected decode format {other:?}"
                            )))
                        }
                    }
                } else {
                    return Err(Error::InsufficientResource("no compressed SDR image stored"));
                };
                self.raw_outputs.push(rgba);
                self.raw_outputs.last().ok_or(Error::Unknown)
            }

            PixelFormat::RgbaF16 => {
                if config.transfer != HdrTransfer::Linear {
                    return Err(Error::UnsupportedFeature(
                        "F16 output requires the linear transfer",
                    ));
                }
                let out = self.reconstruct_hdr(config, OutputFormat::HdrLinear)?;
                self.raw_outputs.push(out);
                self.raw_outputs.last().ok_or(Error::Unknown)
            }

            PixelFormat::Rgba1010102 => {
                let output_format = match config.transfer {
                    HdrTransfer::Hlg => OutputFormat::HdrHlg,
                    HdrTransfer::Pq => OutputFormat::HdrPq,
                    HdrTransfer::Linear => {
                        return Err(Error::UnsupportedFeature(
                            "1010102 output requires HLG or PQ transfer",
                        ))
                    }
                };
                let out = self.reconstruct_hdr(config, output_format)?;
                self.raw_outputs.push(out);
                self.raw_outputs.last().ok_or(Error::Unknown)
            }

            _ => Err(Error::UnsupportedFeature(
                "unsupported raw pixel output format",
            )),
        }
    }

    /// Shared tail of the HDR raw-pixel paths: decode prerequisites,
    /// apply effects to the base/map pair, run the gain map applier.
    fn reconstruct_hdr(
        &mut self,
        config: &ConvertConfig,
        output_format: OutputFormat,
    ) -> Result<PixelBuffer> {
        self.maybe_decode_jpeg_sdr()?;
        if self.sdr_raw.is_none()
            || self.gainmap_raw.is_none()
            || self.gainmap_metadata.is_none()
        {
            return Err(Error::InsufficientResource(
                "HDR reconstruction needs an SDR image, a gain map and metadata",
            ));
        }
        let (base, map) = self.edited_pair(&config.effects)?;
        let metadata = self.gainmap_metadata.clone().ok_or(Error::Unknown)?;
        apply_gainmap(
            &base,
            &map,
            &metadata,
            output_format,
            config.max_display_boost,
            self.parallelism,
        )
    }

    /// Decode the stored SDR JPEG into the raw slot (and capture EXIF)
    /// when either is still missing.
    fn maybe_decode_jpeg_sdr(&mut self) -> Result<()> {
        if self.sdr_jpeg.is_none() || (self.sdr_raw.is_some() && self.exif.is_some()) {
            return Ok(());
        }
        let (decoded, gamut) = {
            let Some(jpeg) = &self.sdr_jpeg else {
                return Ok(());
            };
            (self.jpeg.decompress(&jpeg.data)?, jpeg.gamut)
        };
        if self.sdr_raw.is_none() {
            let mut image = decoded.image;
            if image.format != PixelFormat::Yuv420 {
                return Err(Error::DecodeError(
                    "pipeline use requires a YUV 4:2:0 JPEG decode".into(),
                ));
            }
            if image.gamut == ColorGamut::Unspecified {
                image.gamut = gamut;
            }
            self.sdr_raw = Some(image);
            self.sdr_raw_is_bt601 = true;
        }
        if self.exif.is_none() {
            self.exif = decoded.exif;
        }
        Ok(())
    }

    /// Tone map the stored HDR image into the SDR slot when no SDR input
    /// was supplied.
    fn maybe_tone_map(&mut self) -> Result<()> {
        if self.sdr_raw.is_some() {
            return Ok(());
        }
        let Some(hdr) = &self.hdr_raw else {
            return Ok(());
        };
        debug!("tone mapping HDR input to synthesize the SDR base");
        let sdr = tone_map(hdr)?;
        self.sdr_raw = Some(sdr);
        self.sdr_raw_is_bt601 = false;
        Ok(())
    }

    /// Generate the gain map from the raw pair when none is stored yet.
    fn ensure_gainmap(&mut self, transfer: HdrTransfer) -> Result<()> {
        if self.gainmap_raw.is_some() && self.gainmap_metadata.is_some() {
            return Ok(());
        }
        let (Some(sdr), Some(hdr)) = (&self.sdr_raw, &self.hdr_raw) else {
            return Ok(());
        };
        let (map, metadata) =
            generate_gainmap(sdr, hdr, transfer, self.sdr_raw_is_bt601, self.parallelism)?;
        if self.gainmap_raw.is_none() {
            self.gainmap_raw = Some(map);
        }
        if self.gainmap_metadata.is_none() {
            self.gainmap_metadata = Some(metadata);
        }
        Ok(())
    }

    /// Apply the effect list to the stored base/map pair, rescaling crop
    /// and resize parameters to map resolution.
    fn edited_pair(&self, effects: &[Effect]) -> Result<(PixelBuffer, PixelBuffer)> {
        let (Some(sdr), Some(map)) = (&self.sdr_raw, &self.gainmap_raw) else {
            return Err(Error::InsufficientResource("base/map pair incomplete"));
        };
        if effects.is_empty() {
            return Ok((sdr.clone(), map.clone()));
        }
        if map.width == 0 || sdr.width % map.width != 0 {
            warn!(
                base_width = sdr.width,
                map_width = map.width,
                "cannot scale effects to a non-integral map ratio"
            );
            return Err(Error::UnsupportedMapScaleFactor);
        }
        let ratio = sdr.width / map.width;
        let base = add_effects(sdr, effects)?;
        let map = add_effects(map, &scale_effects_for_map(effects, ratio))?;
        Ok((base, map))
    }

    fn compress_base(&self, image: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
        self.jpeg.compress(
            image.luma(),
            Some(image.chroma()),
            image.width,
            image.height,
            image.luma_stride,
            image.chroma_stride,
            quality,
            None,
        )
    }

    fn compress_gainmap(&self, map: &PixelBuffer) -> Result<Vec<u8>> {
        self.jpeg.compress(
            map.luma(),
            None,
            map.width,
            map.height,
            map.luma_stride,
            0,
            GAINMAP_JPEG_QUALITY,
            None,
        )
    }
}

fn heif_compression(codec: OutputCodec) -> HeifCompression {
    match codec {
        OutputCodec::Avif | OutputCodec::AvifR | OutputCodec::Avif10Bit => HeifCompression::Av1,
        _ => HeifCompression::Hevc,
    }
}
