//! JPEG marker-level parsing and editing.

use std::ops::Range;

use uhdr_core::{Error, Result};

/// XMP APP1 namespace identifier.
pub const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// EXIF APP1 identifier.
pub const EXIF_IDENTIFIER: &[u8] = b"Exif\0\0";

/// MPF APP2 identifier.
pub const MPF_IDENTIFIER: &[u8] = b"MPF\0";

/// ICC APP2 identifier.
pub const ICC_IDENTIFIER: &[u8] = b"ICC_PROFILE\0";

/// A marker segment pulled out of a JPEG stream.
#[derive(Debug, Clone)]
pub struct JpegSegment {
    /// Marker byte (0xE0..=0xEF for APPn, 0xFE for COM).
    pub marker: u8,
    /// Payload, excluding the marker and length bytes.
    pub data: Vec<u8>,
    /// Byte offset of the 0xFF marker byte in the scanned stream.
    pub offset: usize,
}

impl JpegSegment {
    /// XMP APP1 segment.
    pub fn is_xmp(&self) -> bool {
        self.marker == 0xE1 && self.data.starts_with(XMP_NAMESPACE)
    }

    /// EXIF APP1 segment.
    pub fn is_exif(&self) -> bool {
        self.marker == 0xE1 && self.data.starts_with(EXIF_IDENTIFIER)
    }

    /// MPF APP2 segment.
    pub fn is_mpf(&self) -> bool {
        self.marker == 0xE2 && self.data.starts_with(MPF_IDENTIFIER)
    }

    /// ICC profile APP2 segment.
    pub fn is_icc(&self) -> bool {
        self.marker == 0xE2 && self.data.starts_with(ICC_IDENTIFIER)
    }
}

/// Collect the APPn/COM segments between SOI and the first scan.
pub fn scan_app_segments(data: &[u8]) -> Result<Vec<JpegSegment>> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::DecodeError("not a JPEG: missing SOI".into()));
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return Err(Error::DecodeError(format!(
                "garbage between segments at offset {pos}"
            )));
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            // Fill byte.
            pos += 1;
            continue;
        }
        if marker == 0xD8 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            break;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 || pos + 2 + length > data.len() {
            return Err(Error::DecodeError(format!(
                "invalid segment length {length} at offset {pos}"
            )));
        }
        if (0xE0..=0xEF).contains(&marker) || marker == 0xFE {
            segments.push(JpegSegment {
                marker,
                data: data[pos + 4..pos + 2 + length].to_vec(),
                offset: pos,
            });
        }
        pos += 2 + length;
    }
    Ok(segments)
}

/// Byte range of the first complete JPEG image (SOI through EOI).
///
/// Walks marker segments and skips entropy-coded scan data, so a stray
/// `FF D9` inside the compressed stream is not mistaken for the end.
pub fn primary_bounds(data: &[u8]) -> Option<Range<usize>> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        match marker {
            0xD9 => return Some(0..pos + 2),
            0x00 | 0xFF => pos += 2,
            0xD8 => pos += 2,
            0xD0..=0xD7 => pos += 2,
            0xDA => {
                // Scan header, then entropy-coded data.
                if pos + 4 > data.len() {
                    return None;
                }
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + length;
                while pos + 1 < data.len() {
                    if data[pos] == 0xFF
                        && data[pos + 1] != 0x00
                        && !(0xD0..=0xD7).contains(&data[pos + 1])
                    {
                        break;
                    }
                    pos += 1;
                }
            }
            _ => {
                if pos + 4 > data.len() {
                    return None;
                }
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                if length < 2 {
                    return None;
                }
                pos += 2 + length;
            }
        }
    }
    None
}

/// Insert one marker segment immediately after the SOI of a JPEG stream.
///
/// The segment length field is written from the payload size; the payload
/// must include any identifier prefix (XMP namespace, `Exif\0\0`, ...).
pub fn insert_segment_after_soi(jpeg: &[u8], marker: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(Error::DecodeError("not a JPEG: missing SOI".into()));
    }
    let length = payload.len() + 2;
    if length > 0xFFFF {
        return Err(Error::MetadataError(format!(
            "segment payload of {} bytes exceeds the marker limit",
            payload.len()
        )));
    }

    let mut out = Vec::with_capacity(jpeg.len() + 4 + payload.len());
    out.extend_from_slice(&jpeg[..2]);
    out.push(0xFF);
    out.push(marker);
    out.extend_from_slice(&(length as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}
