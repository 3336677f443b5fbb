//! Barcode and QR payloads to bi-level rasters.
//!
//! Linear symbologies go through `rxing`'s writers, QR through `qrcode`.
//! In both cases one matrix cell is one pixel and the requested geometry
//! is the exact output size; nothing is rescaled afterwards.
//!
//! QR payloads outside ASCII are written as bytes of the configured
//! character set behind an ECI designator, so readers know how to decode
//! them.

use log::{debug, trace, warn};
use qrcode::bits::Bits;
use qrcode::types::{QrError, QrResult};
use qrcode::{Color, EcLevel, QrCode, Version};
use rxing::{
    BarcodeFormat, EncodeHintType, EncodeHintValue, EncodingHintDictionary, MultiFormatWriter,
    Writer,
};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::{
    error::{EncodeError, EncodeReason},
    raster::{Pixels, Raster},
    Config,
};

/// Barcode standards the encoder can draw.
///
/// The numeric codes are the ones the printer service uses and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    UpcA,
    UpcE,
    Ean13,
    Ean8,
    Code39,
    Itf,
    Codabar,
    Code93,
    Code128,
    Qr,
}

impl Symbology {
    /// Map a service code to a symbology. 9 and every unknown code are QR.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::UpcA,
            1 => Self::UpcE,
            2 => Self::Ean13,
            3 => Self::Ean8,
            4 => Self::Code39,
            5 => Self::Itf,
            6 => Self::Codabar,
            7 => Self::Code93,
            8 => Self::Code128,
            _ => Self::Qr,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::UpcA => 0,
            Self::UpcE => 1,
            Self::Ean13 => 2,
            Self::Ean8 => 3,
            Self::Code39 => 4,
            Self::Itf => 5,
            Self::Codabar => 6,
            Self::Code93 => 7,
            Self::Code128 => 8,
            Self::Qr => 9,
        }
    }

    pub fn is_linear(&self) -> bool {
        !matches!(self, Self::Qr)
    }

    fn barcode_format(&self) -> BarcodeFormat {
        match self {
            Self::UpcA => BarcodeFormat::UPC_A,
            Self::UpcE => BarcodeFormat::UPC_E,
            Self::Ean13 => BarcodeFormat::EAN_13,
            Self::Ean8 => BarcodeFormat::EAN_8,
            Self::Code39 => BarcodeFormat::CODE_39,
            Self::Itf => BarcodeFormat::ITF,
            Self::Codabar => BarcodeFormat::CODABAR,
            Self::Code93 => BarcodeFormat::CODE_93,
            Self::Code128 => BarcodeFormat::CODE_128,
            Self::Qr => BarcodeFormat::QR_CODE,
        }
    }
}

/// What to draw and how large.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSpec {
    pub payload: String,
    pub symbology: Symbology,
    pub target_width: u32,
    pub target_height: u32,
}

impl SymbolSpec {
    pub fn new(
        payload: impl Into<String>,
        symbology: Symbology,
        target_width: u32,
        target_height: u32,
    ) -> Self {
        SymbolSpec {
            payload: payload.into(),
            symbology,
            target_width,
            target_height,
        }
    }

    /// Pixel size of the raster this spec produces. QR is always square.
    pub fn geometry(&self) -> (u32, u32) {
        match self.symbology {
            Symbology::Qr => (self.target_width, self.target_width),
            _ => (self.target_width, self.target_height),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolEncoder {
    config: Config,
}

impl SymbolEncoder {
    pub fn new(config: Config) -> Self {
        SymbolEncoder { config }
    }

    /// Draw `spec` as a bi-level raster of exactly [`SymbolSpec::geometry`].
    ///
    /// An empty payload draws nothing and returns `Ok(None)`.
    pub fn encode(&self, spec: &SymbolSpec) -> Result<Option<Raster>, EncodeError> {
        if spec.payload.is_empty() {
            return Ok(None);
        }

        let (width, height) = spec.geometry();
        let fail = |reason, detail: String| EncodeError {
            reason,
            symbology: spec.symbology,
            width,
            height,
            detail,
        };

        if width == 0 || height == 0 {
            return Err(fail(
                EncodeReason::MatrixTooSmall,
                "zero sized target".to_string(),
            ));
        }
        let cells = width as u64 * height as u64;
        if self.config.max_alloc.map_or(false, |cap| cells > cap) || cells > usize::MAX as u64 {
            return Err(fail(
                EncodeReason::MatrixTooLarge,
                format!("{} cells exceed the allocation cap", cells),
            ));
        }

        let cells = match spec.symbology {
            Symbology::Qr => self.qr_cells(&spec.payload, width),
            linear => self.linear_cells(&spec.payload, linear.barcode_format(), width, height),
        }
        .map_err(|(reason, detail)| fail(reason, detail))?;

        debug!(
            "encoded {:?} payload of {} bytes into {}x{}",
            spec.symbology,
            spec.payload.len(),
            width,
            height
        );
        Raster::new(width, height, Pixels::BiLevel(cells))
            .map(Some)
            .map_err(|err| fail(EncodeReason::MatrixTooSmall, err.to_string()))
    }

    fn linear_cells(
        &self,
        payload: &str,
        format: BarcodeFormat,
        width: u32,
        height: u32,
    ) -> Result<Vec<bool>, (EncodeReason, String)> {
        let hints: EncodingHintDictionary = HashMap::from([(
            EncodeHintType::CHARACTER_SET,
            EncodeHintValue::CharacterSet(self.config.character_set.name().to_owned()),
        )]);
        let writer = MultiFormatWriter::default();
        let (w, h) = match (i32::try_from(width), i32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err((
                    EncodeReason::MatrixTooLarge,
                    format!("{}x{} is past the writer's range", width, height),
                ))
            }
        };

        let matrix = panic::catch_unwind(AssertUnwindSafe(|| {
            writer.encode_with_hints(payload, &format, w, h, &hints)
        }))
        .map_err(|panic| {
            let msg = panic_message(panic);
            warn!("{:?} writer panicked: {}", format, msg);
            (EncodeReason::IncompatiblePayload, msg)
        })?
        .map_err(|err| (EncodeReason::IncompatiblePayload, err.to_string()))?;

        // The writers widen their output instead of failing when the code
        // does not fit.
        if matrix.width() != width || matrix.height() != height {
            return Err((
                EncodeReason::MatrixTooSmall,
                format!("symbol needs {}x{}", matrix.width(), matrix.height()),
            ));
        }

        Ok((0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| matrix.get(x, y))
            .collect())
    }

    fn qr_cells(&self, payload: &str, side: u32) -> Result<Vec<bool>, (EncodeReason, String)> {
        let code = if payload.is_ascii() {
            panic::catch_unwind(AssertUnwindSafe(|| {
                QrCode::with_error_correction_level(payload, EcLevel::H)
            }))
            .map_err(|panic| (EncodeReason::IncompatiblePayload, panic_message(panic)))?
            .map_err(|err| (EncodeReason::IncompatiblePayload, err.to_string()))?
        } else {
            self.qr_with_eci(payload)?
        };

        let modules = code.width() as u32;
        let full = modules + self.config.quiet_zone * 2;
        if full > side {
            return Err((
                EncodeReason::MatrixTooSmall,
                format!("{} modules need at least {} px", modules, full),
            ));
        }

        let multiple = side / full;
        let padding = (side - modules * multiple) / 2;
        let colors = code.to_colors();
        let side = side as usize;
        let mut cells = vec![false; side * side];

        for (i, color) in colors.iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let left = (padding + (i as u32 % modules) * multiple) as usize;
            let top = (padding + (i as u32 / modules) * multiple) as usize;
            for y in top..top + multiple as usize {
                let row = y * side;
                cells[row + left..row + left + multiple as usize].fill(true);
            }
        }

        Ok(cells)
    }

    /// Byte mode QR in the configured character set, announced by ECI.
    ///
    /// Versions are tried from the smallest up until the data fits at
    /// level H.
    fn qr_with_eci(&self, payload: &str) -> Result<QrCode, (EncodeReason, String)> {
        let charset = self.config.character_set;
        let eci = eci_designator(charset).ok_or_else(|| {
            (
                EncodeReason::IncompatiblePayload,
                format!("no ECI designator for {}", charset.name()),
            )
        })?;
        let (bytes, _, unmappable) = charset.encode(payload);
        if unmappable {
            return Err((
                EncodeReason::IncompatiblePayload,
                format!("payload has characters outside {}", charset.name()),
            ));
        }

        for version in 1..=40 {
            let mut bits = Bits::new(Version::Normal(version));
            match push_eci_bytes(&mut bits, eci, &bytes) {
                Ok(()) => {}
                Err(QrError::DataTooLong) => continue,
                Err(err) => return Err((EncodeReason::IncompatiblePayload, err.to_string())),
            }
            trace!("{} bytes with ECI {} fit version {}", bytes.len(), eci, version);
            return panic::catch_unwind(AssertUnwindSafe(|| QrCode::with_bits(bits, EcLevel::H)))
                .map_err(|panic| (EncodeReason::IncompatiblePayload, panic_message(panic)))?
                .map_err(|err| (EncodeReason::IncompatiblePayload, err.to_string()));
        }

        Err((
            EncodeReason::IncompatiblePayload,
            format!("{} bytes do not fit any QR version", bytes.len()),
        ))
    }
}

fn push_eci_bytes(bits: &mut Bits, eci: u32, bytes: &[u8]) -> QrResult<()> {
    bits.push_eci_designator(eci)?;
    bits.push_byte_data(bytes)?;
    bits.push_terminator(EcLevel::H)
}

/// ECI assignment number of a character set.
fn eci_designator(charset: &'static encoding_rs::Encoding) -> Option<u32> {
    match charset.name() {
        "Shift_JIS" => Some(20),
        "windows-1250" => Some(21),
        "windows-1251" => Some(22),
        "windows-1252" => Some(23),
        "windows-1256" => Some(24),
        "UTF-8" => Some(26),
        "Big5" => Some(28),
        "GBK" | "gb18030" => Some(29),
        "EUC-KR" => Some(30),
        _ => None,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "encoder panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 0..=9 {
            assert_eq!(Symbology::from_code(code).code() as i32, code);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_qr() {
        assert_eq!(Symbology::from_code(99), Symbology::Qr);
        assert_eq!(Symbology::from_code(-1), Symbology::Qr);
    }

    #[test]
    fn qr_geometry_is_square() {
        let spec = SymbolSpec::new("x", Symbology::Qr, 200, 80);
        assert_eq!(spec.geometry(), (200, 200));
        let spec = SymbolSpec::new("x", Symbology::Code128, 200, 80);
        assert_eq!(spec.geometry(), (200, 80));
    }

    #[test]
    fn eci_follows_character_set() {
        assert_eq!(eci_designator(encoding_rs::GBK), Some(29));
        assert_eq!(eci_designator(encoding_rs::UTF_8), Some(26));
        assert_eq!(eci_designator(encoding_rs::UTF_16LE), None);
    }

    #[test]
    fn oversized_qr_is_refused_before_allocating() {
        let spec = SymbolSpec::new("x", Symbology::Qr, 70_000, 1);
        let err = SymbolEncoder::default().encode(&spec).unwrap_err();
        assert_eq!(err.reason, EncodeReason::MatrixTooLarge);
    }

    #[test]
    fn linear_target_past_writer_range_is_too_large() {
        let encoder = SymbolEncoder::new(Config::new().max_alloc(None));
        let spec = SymbolSpec::new("123", Symbology::Code128, 3_000_000_000, 1);
        let err = encoder.encode(&spec).unwrap_err();
        assert_eq!(err.reason, EncodeReason::MatrixTooLarge);
    }

    #[test]
    fn qr_is_centered_with_quiet_zone() {
        let encoder = SymbolEncoder::default();
        let raster = encoder
            .encode(&SymbolSpec::new("HELLO", Symbology::Qr, 100, 100))
            .unwrap()
            .unwrap();
        // Corners sit inside the quiet zone.
        assert!(!raster.is_dark(0, 0, 128));
        assert!(!raster.is_dark(99, 99, 128));
    }
}
