//! XMP serialization for gain map metadata (Adobe `hdrgm` namespace).
//!
//! Boost and capacity values are log2-encoded on the wire and linear in
//! memory; gamma and offsets stay linear in both.

use uhdr_core::{Error, GainMapMetadata, Result};

use crate::jpeg::markers::XMP_NAMESPACE;

/// XMP namespace for HDR gain map metadata.
pub const HDRGM_NAMESPACE: &str = "http://ns.adobe.com/hdr-gain-map/1.0/";

/// XMP namespace for the container directory.
pub const CONTAINER_NAMESPACE: &str = "http://ns.google.com/photos/1.0/container/";

/// XMP namespace for container items.
pub const ITEM_NAMESPACE: &str = "http://ns.google.com/photos/1.0/container/item/";

/// XMP packet for the primary image.
///
/// Carries the gain map metadata plus the container directory with the
/// byte length of the secondary (gain map) image.
pub fn generate_xmp(metadata: &GainMapMetadata, gainmap_length: usize) -> String {
    let gain_map_min = metadata.min_content_boost.log2();
    let gain_map_max = metadata.max_content_boost.log2();
    let hdr_capacity_min = metadata.hdr_capacity_min.log2();
    let hdr_capacity_max = metadata.hdr_capacity_max.log2();
    let version = &metadata.version;
    let gamma = metadata.gamma;
    let offset_sdr = metadata.offset_sdr;
    let offset_hdr = metadata.offset_hdr;

    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="{HDRGM_NAMESPACE}"
        xmlns:Container="{CONTAINER_NAMESPACE}"
        xmlns:Item="{ITEM_NAMESPACE}"
        hdrgm:Version="{version}"
        hdrgm:GainMapMin="{gain_map_min:.6}"
        hdrgm:GainMapMax="{gain_map_max:.6}"
        hdrgm:Gamma="{gamma:.6}"
        hdrgm:OffsetSDR="{offset_sdr:.6}"
        hdrgm:OffsetHDR="{offset_hdr:.6}"
        hdrgm:HDRCapacityMin="{hdr_capacity_min:.6}"
        hdrgm:HDRCapacityMax="{hdr_capacity_max:.6}"
        hdrgm:BaseRenditionIsHDR="False">
      <Container:Directory>
        <rdf:Seq>
          <rdf:li rdf:parseType="Resource">
            <Container:Item
                Item:Semantic="Primary"
                Item:Mime="image/jpeg"/>
          </rdf:li>
          <rdf:li rdf:parseType="Resource">
            <Container:Item
                Item:Semantic="GainMap"
                Item:Mime="image/jpeg"
                Item:Length="{gainmap_length}"/>
          </rdf:li>
        </rdf:Seq>
      </Container:Directory>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

/// XMP packet for the gain map image itself (no container directory).
pub fn generate_gainmap_xmp(metadata: &GainMapMetadata) -> String {
    let gain_map_min = metadata.min_content_boost.log2();
    let gain_map_max = metadata.max_content_boost.log2();
    let hdr_capacity_min = metadata.hdr_capacity_min.log2();
    let hdr_capacity_max = metadata.hdr_capacity_max.log2();
    let version = &metadata.version;
    let gamma = metadata.gamma;
    let offset_sdr = metadata.offset_sdr;
    let offset_hdr = metadata.offset_hdr;

    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="{HDRGM_NAMESPACE}"
        hdrgm:Version="{version}"
        hdrgm:GainMapMin="{gain_map_min:.6}"
        hdrgm:GainMapMax="{gain_map_max:.6}"
        hdrgm:Gamma="{gamma:.6}"
        hdrgm:OffsetSDR="{offset_sdr:.6}"
        hdrgm:OffsetHDR="{offset_hdr:.6}"
        hdrgm:HDRCapacityMin="{hdr_capacity_min:.6}"
        hdrgm:HDRCapacityMax="{hdr_capacity_max:.6}"/>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

/// Parse gain map metadata out of an XMP packet.
///
/// Returns the metadata (converted back to linear) and, when present, the
/// container directory's gain map byte length. Values outside the valid
/// ranges are rejected with [`Error::BadMetadata`].
pub fn parse_xmp(xmp: &str) -> Result<(GainMapMetadata, Option<usize>)> {
    if !xmp.contains("hdrgm:Version") {
        return Err(Error::MetadataError("no hdrgm metadata in XMP".into()));
    }

    let mut metadata = GainMapMetadata::default();
    if let Some(version) = extract_attribute(xmp, "hdrgm:Version") {
        metadata.version = version;
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:GainMapMin") {
        metadata.min_content_boost = value.exp2();
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:GainMapMax") {
        metadata.max_content_boost = value.exp2();
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:Gamma") {
        metadata.gamma = value;
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:OffsetSDR") {
        metadata.offset_sdr = value;
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:OffsetHDR") {
        metadata.offset_hdr = value;
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:HDRCapacityMin") {
        metadata.hdr_capacity_min = value.exp2();
    }
    if let Some(value) = extract_f32(xmp, "hdrgm:HDRCapacityMax") {
        metadata.hdr_capacity_max = value.exp2();
    }

    metadata.validate()?;

    let gainmap_length = extract_attribute(xmp, "Item:Length")
        .and_then(|value| value.parse::<usize>().ok());
    Ok((metadata, gainmap_length))
}

/// Extract an XMP attribute value by simple string matching.
fn extract_attribute(xmp: &str, name: &str) -> Option<String> {
    let pattern = format!("{name}=\"");
    let start = xmp.find(&pattern)? + pattern.len();
    let end = xmp[start..].find('"')?;
    Some(xmp[start..start + end].to_string())
}

/// Extract a numeric attribute; comma lists collapse to their first entry
/// (the monochrome pipeline carries one channel).
fn extract_f32(xmp: &str, name: &str) -> Option<f32> {
    let value = extract_attribute(xmp, name)?;
    value.split(',').next()?.trim().parse::<f32>().ok()
}

/// Build the APP1 payload for an XMP packet (namespace + packet bytes).
pub fn xmp_app1_payload(xmp: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(XMP_NAMESPACE.len() + xmp.len());
    payload.extend_from_slice(XMP_NAMESPACE);
    payload.extend_from_slice(xmp.as_bytes());
    payload
}

/// Recover the XMP packet text from an APP1 payload.
pub fn xmp_from_payload(payload: &[u8]) -> Option<&str> {
    let body = payload.strip_prefix(XMP_NAMESPACE)?;
    std::str::from_utf8(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uhdr_core::GAINMAP_VERSION;

    fn sample_metadata() -> GainMapMetadata {
        GainMapMetadata {
            version: GAINMAP_VERSION.into(),
            min_content_boost: 1.0,
            max_content_boost: 4.926108,
            gamma: 1.0,
            offset_sdr: 0.0,
            offset_hdr: 0.0,
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 4.926108,
        }
    }

    #[test]
    fn generated_xmp_has_the_expected_keys() {
        let xmp = generate_xmp(&sample_metadata(), 12345);
        assert!(xmp.contains("hdrgm:Version=\"1.0\""));
        assert!(xmp.contains("hdrgm:GainMapMin=\"0.000000\""));
        assert!(xmp.contains("Item:Length=\"12345\""));
        assert!(xmp.contains("Item:Semantic=\"GainMap\""));
        // 4.926108 in log2 space is ~2.3004.
        assert!(xmp.contains("hdrgm:HDRCapacityMax=\"2.300"));
    }

    #[test]
    fn xmp_roundtrip_preserves_linear_values() {
        let original = sample_metadata();
        let xmp = generate_xmp(&original, 999);
        let (parsed, length) = parse_xmp(&xmp).unwrap();

        assert_eq!(length, Some(999));
        assert_eq!(parsed.version, original.version);
        assert!((parsed.min_content_boost - original.min_content_boost).abs() < 1e-3);
        assert!((parsed.max_content_boost - original.max_content_boost).abs() < 1e-3);
        assert!((parsed.hdr_capacity_max - original.hdr_capacity_max).abs() < 1e-3);
        assert_eq!(parsed.gamma, 1.0);
        assert_eq!(parsed.offset_sdr, 0.0);
    }

    #[test]
    fn gainmap_xmp_omits_the_container_directory() {
        let xmp = generate_gainmap_xmp(&sample_metadata());
        assert!(xmp.contains("hdrgm:Version"));
        assert!(!xmp.contains("Container:Directory"));
        let (parsed, length) = parse_xmp(&xmp).unwrap();
        assert_eq!(length, None);
        assert!((parsed.max_content_boost - 4.926108).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_values_are_bad_metadata() {
        // Raising GainMapMin above GainMapMax inverts the boost range.
        let xmp = generate_gainmap_xmp(&sample_metadata())
            .replace("hdrgm:GainMapMin=\"0.000000\"", "hdrgm:GainMapMin=\"3.000000\"");
        assert!(matches!(parse_xmp(&xmp), Err(Error::BadMetadata(_))));

        // Negative gamma.
        let xmp = generate_gainmap_xmp(&sample_metadata())
            .replace("hdrgm:Gamma=\"1.000000\"", "hdrgm:Gamma=\"-1.0\"");
        assert!(matches!(parse_xmp(&xmp), Err(Error::BadMetadata(_))));
    }

    #[test]
    fn non_hdrgm_xmp_is_a_metadata_error() {
        assert!(matches!(
            parse_xmp("<x:xmpmeta></x:xmpmeta>"),
            Err(Error::MetadataError(_))
        ));
    }

    #[test]
    fn app1_payload_roundtrip() {
        let xmp = generate_gainmap_xmp(&sample_metadata());
        let payload = xmp_app1_payload(&xmp);
        assert_eq!(xmp_from_payload(&payload), Some(xmp.as_str()));
    }
}
