//! Multi-Picture Format (CIPA DC-007) index for two-image containers.

use uhdr_core::{Error, Result};

use crate::jpeg::markers::MPF_IDENTIFIER;

/// MPF format version string.
pub const MPF_VERSION: &[u8] = b"0100";

const TAG_VERSION: u16 = 0xB000;
const TAG_NUMBER_OF_IMAGES: u16 = 0xB001;
const TAG_MP_ENTRY: u16 = 0xB002;

const TYPE_UNDEFINED: u16 = 7;
const TYPE_LONG: u16 = 4;

/// Attribute flags for a baseline primary image.
pub const ATTRIBUTE_PRIMARY: u32 = 0x03_0000;
/// Attribute flags for a dependent child image (the gain map).
pub const ATTRIBUTE_DEPENDENT: u32 = 0x00_0000;

/// One image entry from an MPF directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpfEntry {
    /// Image type attribute flags.
    pub attribute: u32,
    /// Image size in bytes.
    pub size: u32,
    /// Byte offset of the image (0 for the primary).
    pub offset: u32,
}

/// Build the APP2 payload indexing a primary image and its gain map.
///
/// `primary_length` is the byte length of the finished primary image
/// including every inserted marker; the gain map is assumed to follow it
/// immediately.
pub fn create_mpf_payload(primary_length: usize, gainmap_length: usize) -> Vec<u8> {
    let mut tiff = Vec::with_capacity(96);

    // Big-endian TIFF header.
    tiff.extend_from_slice(b"MM");
    tiff.extend_from_slice(&0x002Au16.to_be_bytes());
    tiff.extend_from_slice(&8u32.to_be_bytes());

    // IFD with three entries.
    tiff.extend_from_slice(&3u16.to_be_bytes());
    write_ifd_entry(&mut tiff, TAG_VERSION, TYPE_UNDEFINED, 4, 0);
    let version_pos = tiff.len() - 4;
    tiff[version_pos..].copy_from_slice(MPF_VERSION);
    write_ifd_entry(&mut tiff, TAG_NUMBER_OF_IMAGES, TYPE_LONG, 1, 2);

    // Two 16-byte MP entries follow the IFD terminator.
    let mp_entry_offset = tiff.len() as u32 + 12 + 4;
    write_ifd_entry(&mut tiff, TAG_MP_ENTRY, TYPE_UNDEFINED, 32, mp_entry_offset);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    write_mp_entry(&mut tiff, ATTRIBUTE_PRIMARY, primary_length as u32, 0);
    write_mp_entry(
        &mut tiff,
        ATTRIBUTE_DEPENDENT,
        gainmap_length as u32,
        primary_length as u32,
    );

    let mut payload = Vec::with_capacity(MPF_IDENTIFIER.len() + tiff.len());
    payload.extend_from_slice(MPF_IDENTIFIER);
    payload.extend_from_slice(&tiff);
    payload
}

fn write_ifd_entry(buf: &mut Vec<u8>, tag: u16, type_id: u16, count: u32, value: u32) {
    buf.extend_from_slice(&tag.to_be_bytes());
    buf.extend_from_slice(&type_id.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(&value.to_be_bytes());
}

fn write_mp_entry(buf: &mut Vec<u8>, attribute: u32, size: u32, offset: u32) {
    buf.extend_from_slice(&attribute.to_be_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(&offset.to_be_bytes());
    // Dependent image entry numbers, unused here.
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
}

/// Parse the image entries out of an MPF APP2 payload.
pub fn parse_mpf_payload(payload: &[u8]) -> Result<Vec<MpfEntry>> {
    let tiff = payload
        .strip_prefix(MPF_IDENTIFIER)
        .ok_or_else(|| Error::MetadataError("missing MPF identifier".into()))?;
    if tiff.len() < 16 {
        return Err(Error::MetadataError("MPF payload truncated".into()));
    }

    let big_endian = match &tiff[..2] {
        b"MM" => true,
        b"II" => false,
        _ => return Err(Error::MetadataError("bad MPF endianness marker".into())),
    };
    let read_u16 = |bytes: &[u8]| -> u16 {
        let pair = [bytes[0], bytes[1]];
        if big_endian {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    };
    let read_u32 = |bytes: &[u8]| -> u32 {
        let quad = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if big_endian {
            u32::from_be_bytes(quad)
        } else {
            u32::from_le_bytes(quad)
        }
    };

    let ifd_offset = read_u32(&tiff[4..8]) as usize;
    if ifd_offset + 2 > tiff.len() {
        return Err(Error::MetadataError("MPF IFD offset out of range".into()));
    }
    let entry_count = read_u16(&tiff[ifd_offset..]) as usize;

    let mut image_count = 0usize;
    let mut mp_entries: Option<(usize, usize)> = None;
    for i in 0..entry_count {
        let at = ifd_offset + 2 + i * 12;
        if at + 12 > tiff.len() {
            return Err(Error::MetadataError("MPF IFD truncated".into()));
        }
        let tag = read_u16(&tiff[at..]);
        let count = read_u32(&tiff[at + 4..]) as usize;
        let value = read_u32(&tiff[at + 8..]) as usize;
        match tag {
            TAG_NUMBER_OF_IMAGES => image_count = value,
            TAG_MP_ENTRY => mp_entries = Some((value, count)),
            _ => {}
        }
    }

    let (entries_offset, entries_bytes) =
        mp_entries.ok_or_else(|| Error::MetadataError("MPF has no MP entry tag".into()))?;
    if image_count == 0 || entries_bytes < image_count * 16 {
        return Err(Error::MetadataError("MPF image entries inconsistent".into()));
    }
    if entries_offset + image_count * 16 > tiff.len() {
        return Err(Error::MetadataError("MPF entries out of range".into()));
    }

    let mut entries = Vec::with_capacity(image_count);
    for i in 0..image_count {
        let at = entries_offset + i * 16;
        entries.push(MpfEntry {
            attribute: read_u32(&tiff[at..]),
            size: read_u32(&tiff[at + 4..]),
            offset: read_u32(&tiff[at + 8..]),
        });
    }
    Ok(entries)
}
