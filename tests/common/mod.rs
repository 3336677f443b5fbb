#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thermal_raster::Raster;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A smooth gradient, small once compressed.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// Pseudo random pixels that do not compress, so truncation hits pixel data.
pub fn noise(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x1234_5678;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let [a, b, c, _] = state.to_le_bytes();
        Rgb([a, b, c])
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// PNG whose IHDR announces `width` x `height`, with a valid chunk CRC.
pub fn png_with_header_size(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = png(4, 4);
    assert_eq!(&bytes[12..16], b"IHDR");
    bytes[16..20].copy_from_slice(&width.to_be_bytes());
    bytes[20..24].copy_from_slice(&height.to_be_bytes());
    let crc = crc32(&bytes[12..29]);
    bytes[29..33].copy_from_slice(&crc.to_be_bytes());
    bytes
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

/// Grayscale bytes for a decoder: dark dots 0, paper 255.
pub fn luma(raster: &Raster) -> Vec<u8> {
    let mut out = Vec::with_capacity((raster.width() * raster.height()) as usize);
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            out.push(if raster.is_dark(x, y, 128) { 0 } else { 255 });
        }
    }
    out
}
