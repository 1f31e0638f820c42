//! Shared test utilities: synthetic images and structural fake codecs.
//!
//! The fake codecs store planes losslessly inside real marker structure
//! (SOI, APP segments, EOI for "JPEG"; an ftyp-branded blob for "HEIF"),
//! so the container and pipeline layers are exercised against genuine
//! byte streams without an entropy coder.

#![allow(dead_code)]

use uhdr::codec::{DecodedJpeg, HeifCodec, HeifCompression, HeifDecoded, JpegCodec};
use uhdr::jpeg::markers::scan_app_segments;
use uhdr::metadata::xmp::xmp_from_payload;
use uhdr::metadata::IsoGainMapRecord;
use uhdr::{ColorGamut, Error, GainMapMetadata, PixelBuffer, PixelFormat, Result};

// ============================================================================
// Synthetic images
// ============================================================================

/// A YUV 4:2:0 image with a luma gradient and neutral chroma.
pub fn gradient_yuv420(width: usize, height: usize) -> PixelBuffer {
    let mut img = PixelBuffer::new(width, height, PixelFormat::Yuv420, ColorGamut::Bt709).unwrap();
    let stride = img.luma_stride;
    let (luma, chroma) = img.split_planes_mut();
    for y in 0..height {
        for x in 0..width {
            luma[y * stride + x] = ((x * 255) / width.max(1)) as u8;
        }
    }
    chroma.fill(128);
    img
}

/// A solid YUV 4:2:0 image.
pub fn solid_yuv420(width: usize, height: usize, luma: u8) -> PixelBuffer {
    let mut img = PixelBuffer::new(width, height, PixelFormat::Yuv420, ColorGamut::Bt709).unwrap();
    let (y, c) = img.split_planes_mut();
    y.fill(luma);
    c.fill(128);
    img
}

/// A P010 image with a horizontal 10-bit luma gradient and neutral chroma.
pub fn gradient_p010(width: usize, height: usize) -> PixelBuffer {
    let mut img = PixelBuffer::new(width, height, PixelFormat::P010, ColorGamut::Bt2100).unwrap();
    let stride = img.luma_stride;
    let luma_bytes = img.luma_plane_bytes();
    for y in 0..height {
        for x in 0..width {
            let value10 = ((x * 1023) / width.max(1)) as u16;
            let offset = (y * stride + x) * 2;
            img.data[offset..offset + 2].copy_from_slice(&(value10 << 6).to_le_bytes());
        }
    }
    for pair in img.data[luma_bytes..].chunks_mut(2) {
        pair.copy_from_slice(&(512u16 << 6).to_le_bytes());
    }
    img
}

// ============================================================================
// Fake JPEG codec
// ============================================================================

const FAKE_MAGIC: &[u8] = b"FAKE";
const CHUNK_LIMIT: usize = 60_000;
const KIND_YUV420: u8 = 0;
const KIND_MONOCHROME: u8 = 1;

/// Lossless stand-in for a JPEG codec.
///
/// `compress` packs the planes into APP15 segments between a real SOI/EOI
/// pair; `decompress` reassembles them and also surfaces EXIF and XMP
/// APP1 segments like a real decoder would.
pub struct FakeJpegCodec;

impl JpegCodec for FakeJpegCodec {
    fn compress(
        &self,
        luma: &[u8],
        chroma: Option<&[u8]>,
        width: usize,
        height: usize,
        luma_stride: usize,
        chroma_stride: usize,
        quality: u8,
        _icc: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        if quality > 100 {
            return Err(Error::EncodeError(format!("bad quality {quality}")));
        }

        let kind = if chroma.is_some() { KIND_YUV420 } else { KIND_MONOCHROME };
        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(FAKE_MAGIC);
        header.push(kind);
        header.extend_from_slice(&(width as u32).to_le_bytes());
        header.extend_from_slice(&(height as u32).to_le_bytes());

        // Pack rows tightly, dropping stride padding.
        let mut samples = Vec::with_capacity(width * height * 2);
        for y in 0..height {
            let row = y * luma_stride;
            samples.extend_from_slice(&luma[row..row + width]);
        }
        if let Some(chroma) = chroma {
            let half_rows = height / 2;
            let half_width = width / 2;
            let v_start = half_rows * chroma_stride;
            for plane_start in [0, v_start] {
                for y in 0..half_rows {
                    let row = plane_start + y * chroma_stride;
                    samples.extend_from_slice(&chroma[row..row + half_width]);
                }
            }
        }

        let mut out = vec![0xFF, 0xD8];
        let mut push_segment = |payload: &[u8]| {
            out.push(0xFF);
            out.push(0xEF);
            out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
            out.extend_from_slice(payload);
        };
        push_segment(&header);
        for chunk in samples.chunks(CHUNK_LIMIT) {
            push_segment(chunk);
        }
        out.extend_from_slice(&[0xFF, 0xD9]);
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<DecodedJpeg> {
        let segments = scan_app_segments(data)?;

        let mut fake_segments = segments.iter().filter(|segment| segment.marker == 0xEF);
        let header = fake_segments
            .next()
            .filter(|segment| segment.data.starts_with(FAKE_MAGIC))
            .ok_or_else(|| Error::DecodeError("no fake payload header".into()))?;
        let kind = header.data[4];
        let width = u32::from_le_bytes(header.data[5..9].try_into().unwrap()) as usize;
        let height = u32::from_le_bytes(header.data[9..13].try_into().unwrap()) as usize;

        let mut samples = Vec::new();
        for segment in fake_segments {
            samples.extend_from_slice(&segment.data);
        }

        let format = match kind {
            KIND_YUV420 => PixelFormat::Yuv420,
            KIND_MONOCHROME => PixelFormat::Monochrome,
            other => return Err(Error::DecodeError(format!("bad fake kind {other}"))),
        };
        let image =
            PixelBuffer::from_data(width, height, format, ColorGamut::Unspecified, samples)?;

        let exif = segments
            .iter()
            .find(|segment| segment.is_exif())
            .map(|segment| segment.data[6..].to_vec());
        let xmp = segments
            .iter()
            .find(|segment| segment.is_xmp())
            .and_then(|segment| xmp_from_payload(&segment.data))
            .map(str::to_owned);

        Ok(DecodedJpeg {
            image,
            icc: None,
            exif,
            xmp,
        })
    }
}

// ============================================================================
// Fake HEIF codec
// ============================================================================

/// Lossless stand-in for a HEIC/AVIF codec using a branded ftyp header
/// and a flat length-prefixed layout.
pub struct FakeHeifCodec;

fn format_tag(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::Yuv420 => 0,
        PixelFormat::P010 => 1,
        PixelFormat::Rgb10Planar => 2,
        PixelFormat::Monochrome => 3,
        _ => 255,
    }
}

fn format_from_tag(tag: u8) -> Result<PixelFormat> {
    Ok(match tag {
        0 => PixelFormat::Yuv420,
        1 => PixelFormat::P010,
        2 => PixelFormat::Rgb10Planar,
        3 => PixelFormat::Monochrome,
        other => return Err(Error::DecodeError(format!("bad heif format tag {other}"))),
    })
}

fn write_image(out: &mut Vec<u8>, image: &PixelBuffer) {
    out.push(format_tag(image.format));
    out.extend_from_slice(&(image.width as u32).to_le_bytes());
    out.extend_from_slice(&(image.height as u32).to_le_bytes());
    out.extend_from_slice(&(image.data.len() as u32).to_le_bytes());
    out.extend_from_slice(&image.data);
}

fn read_image(data: &[u8], pos: &mut usize) -> Result<PixelBuffer> {
    let short = || Error::DecodeError("fake heif truncated".into());
    let tag = *data.get(*pos).ok_or_else(short)?;
    let read_u32 = |data: &[u8], pos: &mut usize| -> Result<usize> {
        let bytes: [u8; 4] = data
            .get(*pos..*pos + 4)
            .ok_or_else(short)?
            .try_into()
            .map_err(|_| short())?;
        *pos += 4;
        Ok(u32::from_le_bytes(bytes) as usize)
    };
    *pos += 1;
    let width = read_u32(data, pos)?;
    let height = read_u32(data, pos)?;
    let len = read_u32(data, pos)?;
    let bytes = data.get(*pos..*pos + len).ok_or_else(short)?.to_vec();
    *pos += len;
    PixelBuffer::from_data(width, height, format_from_tag(tag)?, ColorGamut::Unspecified, bytes)
}

/// Build a fake HEIF container directly, for feeding `add_compressed`.
pub fn fake_heif_container(
    image: &PixelBuffer,
    gainmap: Option<(&PixelBuffer, &GainMapMetadata)>,
    exif: Option<&[u8]>,
    avif: bool,
) -> Vec<u8> {
    let mut out = vec![0, 0, 0, 24];
    out.extend_from_slice(if avif { b"ftypavif" } else { b"ftypheic" });
    write_image(&mut out, image);

    match gainmap {
        Some((map, metadata)) => {
            out.push(1);
            write_image(&mut out, map);
            let record = IsoGainMapRecord::from_metadata(metadata);
            for fraction in [
                record.gainmap_min[0],
                record.gainmap_max[0],
                record.gamma[0],
                record.base_offset[0],
                record.alternate_offset[0],
                record.base_hdr_headroom,
                record.alternate_hdr_headroom,
            ] {
                out.extend_from_slice(&fraction.numerator.to_le_bytes());
                out.extend_from_slice(&fraction.denominator.to_le_bytes());
            }
        }
        None => out.push(0),
    }

    match exif {
        Some(exif) => {
            out.push(1);
            out.extend_from_slice(&(exif.len() as u32).to_le_bytes());
            out.extend_from_slice(exif);
        }
        None => out.push(0),
    }
    out
}

impl HeifCodec for FakeHeifCodec {
    fn encode(
        &self,
        primary: &PixelBuffer,
        gainmap: Option<(&PixelBuffer, &IsoGainMapRecord)>,
        quality: u8,
        compression: HeifCompression,
        exif: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        if quality > 100 {
            return Err(Error::EncodeError(format!("bad quality {quality}")));
        }
        let metadata = match gainmap {
            Some((_, record)) => Some(record.to_metadata()?),
            None => None,
        };
        let pair = match (gainmap, &metadata) {
            (Some((map, _)), Some(meta)) => Some((map, meta)),
            _ => None,
        };
        Ok(fake_heif_container(
            primary,
            pair,
            exif,
            compression == HeifCompression::Av1,
        ))
    }

    fn decode(&self, data: &[u8]) -> Result<HeifDecoded> {
        let short = || Error::DecodeError("fake heif truncated".into());
        if data.len() < 12 {
            return Err(short());
        }
        let mut pos = 12;
        let image = read_image(data, &mut pos)?;
        let bit_depth = match image.format {
            PixelFormat::Yuv420 | PixelFormat::Monochrome => 8,
            PixelFormat::P010 | PixelFormat::Rgb10Planar => 10,
            _ => 8,
        };

        let has_gainmap = *data.get(pos).ok_or_else(short)? == 1;
        pos += 1;
        let gainmap = if has_gainmap {
            let map = read_image(data, &mut pos)?;
            let mut fractions = [uhdr::metadata::Fraction::default(); 7];
            for fraction in &mut fractions {
                let numerator_bytes: [u8; 4] = data
                    .get(pos..pos + 4)
                    .ok_or_else(short)?
                    .try_into()
                    .map_err(|_| short())?;
                let denominator_bytes: [u8; 4] = data
                    .get(pos + 4..pos + 8)
                    .ok_or_else(short)?
                    .try_into()
                    .map_err(|_| short())?;
                fraction.numerator = i32::from_le_bytes(numerator_bytes);
                fraction.denominator = u32::from_le_bytes(denominator_bytes);
                pos += 8;
            }
            let record = IsoGainMapRecord {
                gainmap_min: [fractions[0]; 3],
                gainmap_max: [fractions[1]; 3],
                gamma: [fractions[2]; 3],
                base_offset: [fractions[3]; 3],
                alternate_offset: [fractions[4]; 3],
                base_hdr_headroom: fractions[5],
                alternate_hdr_headroom: fractions[6],
            };
            Some((map, record))
        } else {
            None
        };

        let has_exif = *data.get(pos).ok_or_else(short)? == 1;
        pos += 1;
        let exif = if has_exif {
            let len_bytes: [u8; 4] = data
                .get(pos..pos + 4)
                .ok_or_else(short)?
                .try_into()
                .map_err(|_| short())?;
            let len = u32::from_le_bytes(len_bytes) as usize;
            pos += 4;
            Some(data.get(pos..pos + len).ok_or_else(short)?.to_vec())
        } else {
            None
        };

        Ok(HeifDecoded {
            bit_depth,
            image,
            gainmap,
            exif,
        })
    }
}
