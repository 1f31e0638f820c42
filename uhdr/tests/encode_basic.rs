//! Basic encode paths through the assembler and the codec contract.

mod common;

use common::{gradient_p010, gradient_yuv420, solid_yuv420, FakeJpegCodec};
use uhdr::codec::JpegCodec;
use uhdr::jpeg::{is_jpeg, markers::scan_app_segments};
use uhdr::{ColorGamut, ConvertConfig, Effect, Error, OutputCodec, PixelBuffer, PixelFormat, UltraHdr};

fn pipeline() -> UltraHdr {
    let mut pipeline = UltraHdr::new(Box::new(FakeJpegCodec));
    pipeline.set_parallelism(uhdr::Parallelism::single());
    pipeline
}

#[test]
fn yuv_320x240_at_quality_90_encodes() {
    let mut pipeline = pipeline();
    pipeline.add_uncompressed(&gradient_yuv420(320, 240)).unwrap();

    let mut config = ConvertConfig::new(OutputCodec::Jpeg);
    config.quality = 90;
    let out = pipeline.convert(&config).unwrap();
    assert!(!out.data.is_empty());
    assert!(is_jpeg(&out.data));
}

#[test]
fn yuv_318x240_with_odd_chroma_stride_encodes() {
    // Width 318 gives a chroma stride of 159, exercising non-word-aligned
    // row handling.
    let mut pipeline = pipeline();
    pipeline.add_uncompressed(&gradient_yuv420(318, 240)).unwrap();

    let out = pipeline.convert(&ConvertConfig::new(OutputCodec::Jpeg)).unwrap();
    assert!(!out.data.is_empty());
}

#[test]
fn monochrome_320x240_encodes_single_channel() {
    let mut map =
        PixelBuffer::new(320, 240, PixelFormat::Monochrome, ColorGamut::Unspecified).unwrap();
    for (i, px) in map.data.iter_mut().enumerate() {
        *px = (i % 256) as u8;
    }

    let codec = FakeJpegCodec;
    let bytes = codec
        .compress(map.luma(), None, 320, 240, map.luma_stride, 0, 85, None)
        .unwrap();
    let decoded = codec.decompress(&bytes).unwrap();
    assert_eq!(decoded.image.format, PixelFormat::Monochrome);
    assert_eq!(decoded.image.width, 320);
    assert_eq!(decoded.image.height, 240);
    assert_eq!(decoded.image.data, map.data);
}

#[test]
fn jpegr_from_raw_pair_builds_a_two_image_container() {
    let mut pipeline = pipeline();
    pipeline.add_uncompressed(&gradient_p010(320, 240)).unwrap();
    pipeline.add_uncompressed(&solid_yuv420(320, 240, 160)).unwrap();

    let out = pipeline.convert(&ConvertConfig::new(OutputCodec::JpegR)).unwrap();
    assert!(is_jpeg(&out.data));

    let segments = scan_app_segments(&out.data).unwrap();
    assert!(segments.iter().any(|segment| segment.is_xmp()));
    assert!(segments.iter().any(|segment| segment.is_mpf()));

    let (primary, gainmap) = uhdr::container::extract_primary_and_gainmap(&out.data).unwrap();
    assert!(!primary.is_empty());
    assert!(!gainmap.is_empty());
}

#[test]
fn exif_is_embedded_in_the_container() {
    let mut pipeline = pipeline();
    pipeline.add_uncompressed(&gradient_p010(64, 64)).unwrap();
    pipeline.add_exif(b"fake-exif-block").unwrap();

    let out = pipeline.convert(&ConvertConfig::new(OutputCodec::JpegR)).unwrap();
    let segments = scan_app_segments(&out.data).unwrap();
    let exif = segments.iter().find(|segment| segment.is_exif()).unwrap();
    assert!(exif.data.ends_with(b"fake-exif-block"));
}

#[test]
fn rotate_900_is_rejected_as_invalid_cropping() {
    let mut pipeline = pipeline();
    pipeline.add_uncompressed(&gradient_yuv420(320, 240)).unwrap();

    let mut config = ConvertConfig::new(OutputCodec::Jpeg);
    config.effects = vec![Effect::Rotate(900)];
    assert!(matches!(
        pipeline.convert(&config),
        Err(Error::InvalidCropping)
    ));
}

#[test]
fn config_validation_rejects_bad_quality_and_boost() {
    let mut pipeline = pipeline();
    pipeline.add_uncompressed(&gradient_yuv420(64, 64)).unwrap();

    let mut config = ConvertConfig::new(OutputCodec::Jpeg);
    config.quality = 101;
    assert!(matches!(
        pipeline.convert(&config),
        Err(Error::InvalidQuality(101))
    ));

    let mut config = ConvertConfig::new(OutputCodec::Jpeg);
    config.max_display_boost = 0.25;
    assert!(matches!(
        pipeline.convert(&config),
        Err(Error::InvalidDisplayBoost(_))
    ));
}

#[test]
fn converting_with_no_inputs_is_insufficient() {
    let mut pipeline = pipeline();
    assert!(matches!(
        pipeline.convert(&ConvertConfig::new(OutputCodec::Jpeg)),
        Err(Error::InsufficientResource(_))
    ));
    assert!(matches!(
        pipeline.convert(&ConvertConfig::new(OutputCodec::JpegR)),
        Err(Error::InsufficientResource(_))
    ));
}
