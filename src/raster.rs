//! The raster value both pipelines produce.
use crate::{error::Error, Matrix};

/// ARGB value of a black pixel.
pub const ARGB_BLACK: u32 = 0xFF00_0000;
/// ARGB value of a white pixel.
pub const ARGB_WHITE: u32 = 0xFFFF_FFFF;

/// Pixel storage of a [`Raster`], row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pixels {
    /// One `0xAARRGGBB` word per pixel.
    Argb8888(Vec<u32>),
    /// One flag per pixel, `true` is black.
    BiLevel(Vec<bool>),
}

impl Pixels {
    pub fn len(&self) -> usize {
        match self {
            Self::Argb8888(p) => p.len(),
            Self::BiLevel(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dense pixel buffer ready to be handed to a printer.
///
/// `pixels.len() == width * height` always holds; every constructor
/// checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Pixels,
}

impl Raster {
    /// Wrap a row-major pixel buffer.
    ///
    /// Fails when the raster would be empty or the buffer length does not
    /// match `width * height`.
    pub fn new(width: u32, height: u32, pixels: Pixels) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(format!(
                "raster {}x{} is empty",
                width, height
            )));
        }
        if pixels.len() as u64 != width as u64 * height as u64 {
            return Err(Error::InvalidConfig(format!(
                "{} pixels do not fill {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Raster {
            width,
            height,
            pixels,
        })
    }

    /// Build a raster from an RGBA8 image, packing each pixel to ARGB.
    pub(crate) fn from_rgba(image: image::RgbaImage) -> Result<Self, Error> {
        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
            })
            .collect();
        Self::new(width, height, Pixels::Argb8888(pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    pub fn into_pixels(self) -> Pixels {
        self.pixels
    }

    pub fn is_bi_level(&self) -> bool {
        matches!(self.pixels, Pixels::BiLevel(_))
    }

    /// ARGB value at `(x, y)`, bi-level pixels expanded to pure black/white.
    ///
    /// # Panics
    /// If the coordinate is outside the raster.
    pub fn argb(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.width && y < self.height, "({}, {}) out of bounds", x, y);
        let index = (y * self.width + x) as usize;
        match &self.pixels {
            Pixels::Argb8888(p) => p[index],
            Pixels::BiLevel(p) => {
                if p[index] {
                    ARGB_BLACK
                } else {
                    ARGB_WHITE
                }
            }
        }
    }

    /// Whether the head should burn the dot at `(x, y)`.
    ///
    /// Transparent pixels are paper. Opaque ones are dark when their luma
    /// falls below `threshold`.
    pub fn is_dark(&self, x: u32, y: u32, threshold: u8) -> bool {
        if let Pixels::BiLevel(p) = &self.pixels {
            return p[(y * self.width + x) as usize];
        }
        let argb = self.argb(x, y);
        let a = (argb >> 24) as u8;
        if a < 128 {
            return false;
        }
        let r = (argb >> 16) as u8 as f32;
        let g = (argb >> 8) as u8 as f32;
        let b = argb as u8 as f32;
        let luma = (0.299 * r + 0.587 * g + 0.114 * b) as u8;
        luma < threshold
    }

    /// Pack into 1-bit rows, 8 pixels per byte, most significant bit first.
    ///
    /// Each row is `ceil(width / 8)` bytes; the padding bits of the last
    /// byte are left white.
    pub fn to_matrix(&self, threshold: u8) -> Matrix {
        let row_bytes = self.width.div_ceil(8);
        let mut bw: Matrix = Vec::with_capacity(self.height as usize);

        for y in 0..self.height {
            let mut buf = vec![0u8; row_bytes as usize];
            for x in 0..self.width {
                if self.is_dark(x, y, threshold) {
                    buf[(x / 8) as usize] |= 0x80 >> (x % 8);
                }
            }
            bw.push(buf);
        }

        bw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_expands_bi_level() {
        let raster = Raster::new(2, 1, Pixels::BiLevel(vec![true, false])).unwrap();
        assert_eq!(raster.argb(0, 0), ARGB_BLACK);
        assert_eq!(raster.argb(1, 0), ARGB_WHITE);
    }

    #[test]
    fn new_rejects_mismatched_buffer() {
        assert!(matches!(
            Raster::new(3, 3, Pixels::BiLevel(vec![false; 8])),
            Err(Error::InvalidConfig(_))
        ));
        assert!(Raster::new(0, 3, Pixels::BiLevel(Vec::new())).is_err());
    }

    #[test]
    fn matrix_packs_msb_first_with_padding() {
        let mut cells = vec![false; 10];
        cells[0] = true;
        cells[9] = true;
        let raster = Raster::new(10, 1, Pixels::BiLevel(cells)).unwrap();

        assert_eq!(raster.to_matrix(128), vec![vec![0b1000_0000, 0b0100_0000]]);
    }

    #[test]
    fn transparent_pixels_stay_white() {
        let raster = Raster::new(
            3,
            1,
            Pixels::Argb8888(vec![0x0000_0000, 0xFF10_1010, 0xFFF0_F0F0]),
        )
        .unwrap();
        assert!(!raster.is_dark(0, 0, 128));
        assert!(raster.is_dark(1, 0, 128));
        assert!(!raster.is_dark(2, 0, 128));
    }

    #[test]
    fn from_rgba_packs_argb() {
        let image = image::RgbaImage::from_raw(1, 1, vec![0x11, 0x22, 0x33, 0x44]).unwrap();
        let raster = Raster::from_rgba(image).unwrap();
        assert_eq!(raster.argb(0, 0), 0x4411_2233);
    }
}
