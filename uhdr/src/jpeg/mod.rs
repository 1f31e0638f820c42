//! JPEG and ISOBMFF byte-level utilities.

pub mod markers;

pub use markers::{
    insert_segment_after_soi, primary_bounds, scan_app_segments, JpegSegment,
};

/// True when the bytes start with a JPEG SOI marker (JPEG or JPEG/R).
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8
}

fn isobmff_brand(data: &[u8]) -> Option<&[u8]> {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return None;
    }
    Some(&data[8..12])
}

/// True for HEIC family brands (HEIC, HEIC/R, HEIC 10-bit).
pub fn is_heic(data: &[u8]) -> bool {
    matches!(
        isobmff_brand(data),
        Some(b"heic" | b"heix" | b"heim" | b"heis" | b"mif1" | b"hevc" | b"hevx" | b"hevm" | b"hevs" | b"msf1")
    )
}

/// True for AVIF family brands (AVIF, AVIF/R, AVIF 10-bit).
pub fn is_avif(data: &[u8]) -> bool {
    matches!(isobmff_brand(data), Some(b"avif" | b"avis"))
}

/// True for any ISOBMFF container this pipeline understands.
pub fn is_heif(data: &[u8]) -> bool {
    is_heic(data) || is_avif(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffing_recognizes_prefixes() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_jpeg(&[0x00, 0xD8, 0xFF]));

        let mut heic = vec![0, 0, 0, 24];
        heic.extend_from_slice(b"ftypheic");
        heic.extend_from_slice(&[0; 8]);
        assert!(is_heic(&heic));
        assert!(is_heif(&heic));
        assert!(!is_avif(&heic));

        let mut avif = vec![0, 0, 0, 24];
        avif.extend_from_slice(b"ftypavif");
        avif.extend_from_slice(&[0; 8]);
        assert!(is_avif(&avif));
        assert!(is_heif(&avif));
        assert!(!is_heic(&avif));
    }
}
