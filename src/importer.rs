//! Compressed image to printer raster.
//!
//! The importer never holds the full resolution pixel buffer for longer
//! than it takes to subsample it. The header is read first to pick an
//! integer sample size, the image is decoded under an allocation cap, and
//! only the subsampled buffer survives to be normalized and rescaled.

use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Limits, RgbaImage};
use log::{debug, trace};
use std::io::Cursor;

use crate::{
    error::{DecodeError, DecodeReason},
    raster::Raster,
    Config,
};

/// Content size read from the header, before any pixel is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecodeBounds {
    content_width: u32,
    content_height: u32,
}

/// Turns encoded images into rasters that fit a target box.
#[derive(Debug, Clone, Default)]
pub struct RasterImporter {
    config: Config,
}

impl RasterImporter {
    pub fn new(config: Config) -> Self {
        RasterImporter { config }
    }

    /// Decode `bytes` and fit the result into `target_width` x `target_height`.
    ///
    /// Sources smaller than the box keep their size; larger ones are scaled
    /// down keeping their aspect ratio. The result is always ARGB8888.
    pub fn import(
        &self,
        bytes: &[u8],
        target_width: u32,
        target_height: u32,
    ) -> Result<Raster, DecodeError> {
        let fail = |reason| DecodeError::new(reason, target_width, target_height);

        if target_width == 0 || target_height == 0 {
            return Err(fail(DecodeReason::InvalidTargetDimensions));
        }
        if bytes.is_empty() {
            return Err(fail(DecodeReason::EmptySource));
        }

        let bounds = probe_bounds(bytes).map_err(|err| match declared_size(bytes) {
            // Decoders refuse zero sized headers outright.
            Some(size) if size.0 == 0 || size.1 == 0 => fail(DecodeReason::EmptySource)
                .with_source_size(size)
                .with_cause(err),
            _ => fail(classify(&err)).with_cause(err),
        })?;
        let content = (bounds.content_width, bounds.content_height);
        debug!("source bounds {}x{}", content.0, content.1);
        if bounds.content_width == 0 || bounds.content_height == 0 {
            return Err(fail(DecodeReason::EmptySource).with_source_size(content));
        }

        let sample = sample_size(bounds, target_width, target_height);
        debug!("decoding with sample size {}", sample);

        let decoded = self.decode_sampled(bytes, sample).map_err(|err| {
            fail(classify(&err))
                .with_source_size(content)
                .with_cause(err)
        })?;

        let rgba = normalize(decoded);
        let rgba = self.rescale(rgba, target_width, target_height);

        let raster = Raster::from_rgba(rgba)
            .map_err(|_| fail(DecodeReason::EmptySource).with_source_size(content))?;
        debug!(
            "imported {}x{} into {}x{}",
            content.0,
            content.1,
            raster.width(),
            raster.height()
        );
        Ok(raster)
    }

    fn decode_sampled(&self, bytes: &[u8], sample: u32) -> Result<DynamicImage, ImageError> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let mut limits = Limits::default();
        limits.max_alloc = self.config.max_alloc;
        reader.limits(limits);

        let full = reader.decode()?;
        if sample == 1 {
            return Ok(full);
        }

        let width = (full.width() / sample).max(1);
        let height = (full.height() / sample).max(1);
        trace!(
            "subsampling {}x{} to {}x{}",
            full.width(),
            full.height(),
            width,
            height
        );
        // `full` is dropped on return, only the subsampled copy survives.
        Ok(full.resize_exact(width, height, FilterType::Nearest))
    }

    fn rescale(&self, rgba: RgbaImage, target_width: u32, target_height: u32) -> RgbaImage {
        let (width, height) = rgba.dimensions();
        let scale = fit_scale(width, height, target_width, target_height);
        if scale >= 1.0 {
            return rgba;
        }

        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        trace!(
            "rescaling {}x{} by {} to {}x{}",
            width,
            height,
            scale,
            new_width,
            new_height
        );
        image::imageops::resize(&rgba, new_width, new_height, self.config.resize_filter)
    }
}

fn probe_bounds(bytes: &[u8]) -> Result<DecodeBounds, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let (content_width, content_height) = reader.into_dimensions()?;
    Ok(DecodeBounds {
        content_width,
        content_height,
    })
}

/// Size written in the header, read without a decoder.
///
/// Only the containers whose header puts the size at a fixed place (or one
/// marker scan away) are handled; everything else is `None`.
fn declared_size(bytes: &[u8]) -> Option<(u32, u32)> {
    let be32 = |at: usize| Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?));
    let le16 = |at: usize| Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?) as u32);
    let le32 = |at: usize| Some(i32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?));

    match image::guess_format(bytes).ok()? {
        ImageFormat::Png if bytes.get(12..16)? == b"IHDR" => Some((be32(16)?, be32(20)?)),
        ImageFormat::Gif => Some((le16(6)?, le16(8)?)),
        ImageFormat::Bmp => match le32(14)? {
            12 => Some((le16(18)?, le16(20)?)),
            _ => Some((le32(18)?.unsigned_abs(), le32(22)?.unsigned_abs())),
        },
        ImageFormat::Jpeg => jpeg_frame_size(bytes),
        _ => None,
    }
}

/// Walk the JPEG markers up to the first start-of-frame.
fn jpeg_frame_size(bytes: &[u8]) -> Option<(u32, u32)> {
    let be16 = |at: usize| Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?) as u32);
    let mut at = 2;
    loop {
        if *bytes.get(at)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(at + 1)?;
        match marker {
            0xFF => at += 1,
            0xD8 | 0x01 | 0xD0..=0xD7 => at += 2,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some((be16(at + 7)?, be16(at + 5)?));
            }
            _ => at += 2 + be16(at + 2)? as usize,
        }
    }
}

fn classify(err: &ImageError) -> DecodeReason {
    match err {
        ImageError::Limits(_) => DecodeReason::SourceTooLarge,
        _ => DecodeReason::UnparseableSource,
    }
}

/// Integer decode divisor for a source of `bounds` aimed at the target box.
///
/// The upper clamp uses the swapped axes so a source lying sideways
/// relative to the box is not divided down further than the rotated fit
/// would need.
fn sample_size(bounds: DecodeBounds, target_width: u32, target_height: u32) -> u32 {
    let (w, h) = (bounds.content_width, bounds.content_height);
    let sample = (w / target_width).max(h / target_height);
    let sample = sample.min((w / target_height).max(h / target_width));
    sample.max(1)
}

/// Continuous scale factor fitting `width` x `height` into the target box,
/// with the same sideways accommodation as [`sample_size`].
fn fit_scale(width: u32, height: u32, target_width: u32, target_height: u32) -> f32 {
    let (w, h) = (width as f32, height as f32);
    let (tw, th) = (target_width as f32, target_height as f32);
    let scale = (tw / w).min(th / h);
    scale.max((th / w).min(tw / h))
}

fn normalize(decoded: DynamicImage) -> RgbaImage {
    if let DynamicImage::ImageRgba8(rgba) = decoded {
        return rgba;
    }
    trace!("converting {:?} to rgba8", decoded.color());
    decoded.into_rgba8()
}
