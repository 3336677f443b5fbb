mod common;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use thermal_raster::{Config, DecodeReason, Pixels, RasterImporter};

#[test]
fn large_source_fits_box() {
    common::init();
    let importer = RasterImporter::default();

    for &(sw, sh, tw, th) in &[
        (1600, 800, 384, 192),
        (600, 1200, 200, 384),
        (1000, 300, 384, 384),
        (900, 901, 384, 500),
    ] {
        let raster = importer.import(&common::png(sw, sh), tw, th).unwrap();
        assert!(
            raster.width() <= tw && raster.height() <= th,
            "{}x{} into {}x{} gave {:?}",
            sw,
            sh,
            tw,
            th,
            raster.dimensions()
        );
    }
}

#[test]
fn small_source_is_not_upscaled() {
    common::init();
    let raster = RasterImporter::default()
        .import(&common::png(100, 50), 384, 384)
        .unwrap();
    assert_eq!(raster.dimensions(), (100, 50));
}

#[test]
fn matching_aspect_is_preserved() {
    common::init();
    let importer = RasterImporter::default();

    for &(sw, sh, tw, th) in &[
        (1600, 800, 384, 192),
        (1000, 750, 384, 288),
        (777, 333, 259, 111),
        (640, 1280, 192, 384),
    ] {
        let raster = importer.import(&common::png(sw, sh), tw, th).unwrap();
        let expected_height = raster.width() as f32 * th as f32 / tw as f32;
        assert!(
            (raster.height() as f32 - expected_height).abs() <= 1.0,
            "{}x{} into {}x{} gave {:?}",
            sw,
            sh,
            tw,
            th,
            raster.dimensions()
        );
    }
}

#[test]
fn exact_box_for_matching_aspect() {
    let raster = RasterImporter::default()
        .import(&common::png(1600, 800), 384, 192)
        .unwrap();
    assert_eq!(raster.dimensions(), (384, 192));
}

#[test]
fn sideways_source_scales_against_rotated_box() {
    // A landscape source in a portrait box is fitted as if the box were
    // turned, so it may overflow the requested width.
    let raster = RasterImporter::default()
        .import(&common::png(1000, 500), 384, 800)
        .unwrap();
    assert_eq!(raster.dimensions(), (768, 384));
}

#[test]
fn jpeg_sources_decode() {
    let bytes = common::encode(&common::gradient(800, 600), ImageFormat::Jpeg);
    let raster = RasterImporter::default().import(&bytes, 384, 288).unwrap();
    assert_eq!(raster.dimensions(), (384, 288));
}

#[test]
fn grayscale_is_normalized_to_argb() {
    let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0x40])));
    let bytes = common::encode(&gray, ImageFormat::Png);
    let raster = RasterImporter::default().import(&bytes, 384, 384).unwrap();

    match raster.pixels() {
        Pixels::Argb8888(pixels) => {
            assert_eq!(pixels.len(), 16);
            assert!(pixels.iter().all(|&p| p == 0xFF40_4040));
        }
        other => panic!("expected argb pixels, got {:?}", other),
    }
}

#[test]
fn buffer_matches_dimensions() {
    let raster = RasterImporter::default()
        .import(&common::png(1234, 567), 384, 300)
        .unwrap();
    assert_eq!(
        raster.pixels().len(),
        (raster.width() * raster.height()) as usize
    );
}

#[test]
fn garbage_is_unparseable() {
    common::init();
    let err = RasterImporter::default()
        .import(b"definitely not an image", 384, 384)
        .unwrap_err();
    assert_eq!(err.reason, DecodeReason::UnparseableSource);
    assert_eq!(err.source_size, None);
}

#[test]
fn truncated_source_is_unparseable() {
    let bytes = common::encode(&common::noise(128, 128), ImageFormat::Png);
    let err = RasterImporter::default()
        .import(&bytes[..bytes.len() / 2], 384, 384)
        .unwrap_err();
    assert_eq!(err.reason, DecodeReason::UnparseableSource);
    assert_eq!(err.source_size, Some((128, 128)));
}

#[test]
fn empty_source() {
    let err = RasterImporter::default().import(&[], 384, 384).unwrap_err();
    assert_eq!(err.reason, DecodeReason::EmptySource);
}

#[test]
fn zero_sized_header_is_empty() {
    common::init();
    let importer = RasterImporter::default();
    let intact = importer
        .import(&common::png_with_header_size(4, 4), 384, 384)
        .unwrap();
    assert_eq!(intact.dimensions(), (4, 4));

    let err = importer
        .import(&common::png_with_header_size(0, 4), 384, 384)
        .unwrap_err();
    assert_eq!(err.reason, DecodeReason::EmptySource);
    assert_eq!(err.source_size, Some((0, 4)));

    let mut gif = b"GIF89a".to_vec();
    gif.extend_from_slice(&[0, 0, 4, 0, 0, 0, 0, 0x3B]);
    let err = importer.import(&gif, 384, 384).unwrap_err();
    assert_eq!(err.reason, DecodeReason::EmptySource);
    assert_eq!(err.source_size, Some((0, 4)));
}

#[test]
fn zero_target_is_rejected() {
    let bytes = common::png(10, 10);
    let importer = RasterImporter::default();

    let err = importer.import(&bytes, 0, 100).unwrap_err();
    assert_eq!(err.reason, DecodeReason::InvalidTargetDimensions);
    let err = importer.import(&bytes, 100, 0).unwrap_err();
    assert_eq!(err.reason, DecodeReason::InvalidTargetDimensions);
    assert_eq!((err.target_width, err.target_height), (100, 0));
}

#[test]
fn allocation_cap_is_enforced() {
    let importer = RasterImporter::new(Config::new().max_alloc(Some(1024)));
    let err = importer.import(&common::png(256, 256), 384, 384).unwrap_err();
    assert_eq!(err.reason, DecodeReason::SourceTooLarge);
    assert_eq!(err.source_size, Some((256, 256)));
}

#[test]
fn error_message_names_reason_and_sizes() {
    let bytes = common::encode(&common::noise(64, 32), ImageFormat::Png);
    let err = RasterImporter::default()
        .import(&bytes[..bytes.len() / 2], 20, 10)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unparseable-source: target 20x10, source 64x32"
    );
}
