//! JPEG/R container assembly and splitting.
//!
//! Layout of an assembled container: SOI; optional EXIF APP1; primary XMP
//! APP1 (log2 metadata plus the secondary image length); MPF APP2 index
//! of two images; primary payload; then the gain map JPEG with its own
//! XMP APP1.

use std::ops::Range;

use uhdr_core::{Error, GainMapMetadata, Result};

use crate::jpeg::markers::{
    insert_segment_after_soi, primary_bounds, scan_app_segments, EXIF_IDENTIFIER,
};
use crate::jpeg::is_jpeg;
use crate::metadata::mpf::create_mpf_payload;
use crate::metadata::xmp::{
    generate_gainmap_xmp, generate_xmp, parse_xmp, xmp_app1_payload, xmp_from_payload,
};

/// Assemble a JPEG/R container from pre-encoded components.
///
/// `base_jpeg` is the backwards-compatible SDR image, `gainmap_jpeg` the
/// compressed monochrome gain map. `exif`, when given, is inserted as the
/// first APP1 payload; supplying it while the base already carries EXIF is
/// rejected with [`Error::MultipleExifs`].
pub fn encode_jpegr(
    base_jpeg: &[u8],
    gainmap_jpeg: &[u8],
    metadata: &GainMapMetadata,
    exif: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if base_jpeg.is_empty() {
        return Err(Error::BadPointer("base jpeg"));
    }
    if gainmap_jpeg.is_empty() {
        return Err(Error::BadPointer("gain map jpeg"));
    }
    metadata.validate()?;

    if exif.is_some() {
        let has_exif = scan_app_segments(base_jpeg)?
            .iter()
            .any(|segment| segment.is_exif());
        if has_exif {
            return Err(Error::MultipleExifs);
        }
    }

    // The secondary image carries its own gain map XMP. A gain map that
    // was split out of an existing container already has one.
    let has_xmp = scan_app_segments(gainmap_jpeg)?
        .iter()
        .any(|segment| segment.is_xmp());
    let secondary = if has_xmp {
        gainmap_jpeg.to_vec()
    } else {
        let gainmap_xmp = xmp_app1_payload(&generate_gainmap_xmp(metadata));
        insert_segment_after_soi(gainmap_jpeg, 0xE1, &gainmap_xmp)?
    };

    let primary_xmp = xmp_app1_payload(&generate_xmp(metadata, secondary.len()));

    // The MPF payload length is independent of the sizes it records, so a
    // probe pass yields the final primary length for the real index.
    let exif_payload = exif.map(exif_app1_payload);
    let exif_marker_len = exif_payload.as_ref().map_or(0, |payload| 4 + payload.len());
    let mpf_probe_len = 4 + create_mpf_payload(0, 0).len();
    let primary_length =
        base_jpeg.len() + 4 + primary_xmp.len() + mpf_probe_len + exif_marker_len;
    let mpf_payload = create_mpf_payload(primary_length, secondary.len());

    // insert_segment_after_soi prepends, so insert in reverse of the final
    // order: EXIF, XMP, MPF.
    let mut primary = insert_segment_after_soi(base_jpeg, 0xE2, &mpf_payload)?;
    primary = insert_segment_after_soi(&primary, 0xE1, &primary_xmp)?;
    if let Some(payload) = &exif_payload {
        primary = insert_segment_after_soi(&primary, 0xE1, payload)?;
    }
    debug_assert_eq!(primary.len(), primary_length);

    let mut container = primary;
    container.extend_from_slice(&secondary);
    Ok(container)
}

/// Build an EXIF APP1 payload, prefixing the identifier unless the bytes
/// already carry it.
fn exif_app1_payload(exif: &[u8]) -> Vec<u8> {
    if exif.starts_with(EXIF_IDENTIFIER) {
        return exif.to_vec();
    }
    let mut payload = Vec::with_capacity(EXIF_IDENTIFIER.len() + exif.len());
    payload.extend_from_slice(EXIF_IDENTIFIER);
    payload.extend_from_slice(exif);
    payload
}

/// Split a JPEG/R container into its primary and gain map byte ranges.
pub fn extract_primary_and_gainmap(data: &[u8]) -> Result<(Range<usize>, Range<usize>)> {
    if !is_jpeg(data) {
        return Err(Error::NoImagesFound);
    }
    let primary = primary_bounds(data)
        .ok_or_else(|| Error::DecodeError("primary image is truncated".into()))?;

    // The gain map is the next SOI after the primary's EOI.
    let rest = &data[primary.end..];
    let soi = rest
        .windows(2)
        .position(|pair| pair == b"\xFF\xD8")
        .ok_or(Error::GainMapImageNotFound)?;
    let gainmap = primary.end + soi..data.len();
    if gainmap.is_empty() {
        return Err(Error::GainMapImageNotFound);
    }
    Ok((primary, gainmap))
}

/// Parse gain map metadata from the XMP of an extracted gain map JPEG.
pub fn parse_gainmap_metadata(gainmap_jpeg: &[u8]) -> Result<GainMapMetadata> {
    let segments = scan_app_segments(gainmap_jpeg)?;
    let xmp = segments
        .iter()
        .find(|segment| segment.is_xmp())
        .and_then(|segment| xmp_from_payload(&segment.data))
        .ok_or_else(|| Error::MetadataError("gain map carries no XMP".into()))?;
    let (metadata, _) = parse_xmp(xmp)?;
    Ok(metadata)
}
