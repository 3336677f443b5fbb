use bitflags::bitflags;
use log::{debug, info, warn};
use std::fmt;

use crate::{
    error::Error,
    escpos,
    importer::RasterImporter,
    layout::{self, Column},
    raster::Raster,
    symbol::{SymbolEncoder, SymbolSpec, Symbology},
    Config, MAX_PRINTER_WIDTH,
};

/// Lines fed when the device cannot feed to the tear bar by itself.
const FALLBACK_FEED_LINES: u8 = 3;

/// The device side of the printer: whatever actually drives the head.
///
/// Implementations receive finished rasters and parameters only; all
/// decoding and symbol synthesis happens before a call reaches the sink.
pub trait PrinterSink {
    /// Whether the device is reachable right now.
    fn is_connected(&self) -> bool;

    fn print_raster(&mut self, raster: Raster) -> Result<(), Error>;

    fn print_text(&mut self, text: &str) -> Result<(), Error>;

    /// Render a linear barcode with the device's own renderer.
    fn print_barcode(&mut self, params: &BarcodeParams) -> Result<(), Error>;

    /// Render a QR code with the device's own renderer.
    fn print_qr_code(&mut self, params: &QrParams) -> Result<(), Error>;

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Pulse the cash drawer kick-out connector.
    fn open_cash_drawer(&mut self) -> Result<(), Error>;

    /// Feed until the last printed line clears the tear bar.
    ///
    /// Devices that do not know the head to tear bar distance keep the
    /// default, and the printer falls back to a fixed feed.
    fn feed_paper(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported("automatic paper feed"))
    }

    /// Hold every following call instead of printing it. `clean` drops
    /// whatever is held already.
    fn enter_buffer(&mut self, clean: bool) -> Result<(), Error>;

    /// Print what is held and keep holding.
    fn commit_buffer(&mut self) -> Result<(), Error>;

    /// Stop holding calls, printing the held ones first when `commit` is set.
    fn exit_buffer(&mut self, commit: bool) -> Result<(), Error>;

    fn status(&mut self) -> Result<PrinterStatus, Error> {
        Err(Error::Unsupported("status query"))
    }
}

/// Device state as reported by the printer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterStatus {
    Running,
    Initializing,
    /// Hardware interface fault, the job has to be sent again.
    HardwareError,
    OutOfPaper,
    Overheated,
    CoverOpen,
    CutterError,
    CutterRecovered,
    BlackMarkNotFound,
    NotFound,
    Unknown(i32),
}

impl PrinterStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Running,
            2 => Self::Initializing,
            3 => Self::HardwareError,
            4 => Self::OutOfPaper,
            5 => Self::Overheated,
            6 => Self::CoverOpen,
            7 => Self::CutterError,
            8 => Self::CutterRecovered,
            9 => Self::BlackMarkNotFound,
            505 => Self::NotFound,
            _ => Self::Unknown(code),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Running => 1,
            Self::Initializing => 2,
            Self::HardwareError => 3,
            Self::OutOfPaper => 4,
            Self::Overheated => 5,
            Self::CoverOpen => 6,
            Self::CutterError => 7,
            Self::CutterRecovered => 8,
            Self::BlackMarkNotFound => 9,
            Self::NotFound => 505,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether a job sent now would print.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Running | Self::CutterRecovered)
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("Printer is running"),
            Self::Initializing => f.write_str("Printer found but still initializing"),
            Self::HardwareError => f.write_str("Printer hardware interface is abnormal"),
            Self::OutOfPaper => f.write_str("Printer is out of paper"),
            Self::Overheated => f.write_str("Printer is overheating"),
            Self::CoverOpen => f.write_str("Printer cover is not closed"),
            Self::CutterError => f.write_str("Printer cutter is abnormal"),
            Self::CutterRecovered => f.write_str("Printer cutter is normal"),
            Self::BlackMarkNotFound => f.write_str("Black mark paper is not found"),
            Self::NotFound => f.write_str("Printer does not exist"),
            Self::Unknown(code) => write!(f, "Unknown printer state {}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Alignment {
    Left = 0,
    Center = 1,
    Right = 2,
}

impl Alignment {
    pub fn from_code(code: i32) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::Left),
            1 => Ok(Self::Center),
            2 => Ok(Self::Right),
            _ => Err(Error::InvalidConfig(format!("alignment {}", code))),
        }
    }
}

bitflags! {
    /// Framing applied around a text call.
    pub struct TextStyle: u8 {
        const BOLD = 0b0000_0001;
        const UNDERLINE = 0b0000_0010;
    }
}

/// Where the human readable digits go on a device barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextPosition {
    None = 0,
    Above = 1,
    Below = 2,
    Both = 3,
}

/// QR error correction level, L (7%) to H (30%).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

/// Parameters for a barcode rendered by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeParams {
    data: String,
    symbology: Symbology,
    height: u8,
    module_width: u8,
    text_position: TextPosition,
}

impl BarcodeParams {
    /// Validate raw service codes.
    ///
    /// `symbology` 0 to 8, `height` 1 to 255 dots, `module_width` 2 to 6
    /// dots, `text_position` 0 to 3. The data, with the Code 128 code set
    /// selector if one is added, must fit the 255 byte length field.
    pub fn new(
        data: impl Into<String>,
        symbology: i32,
        height: i32,
        module_width: i32,
        text_position: i32,
    ) -> Result<Self, Error> {
        if !(0..=8).contains(&symbology) {
            return Err(Error::InvalidConfig(format!(
                "barcode symbology {} is not 0 to 8",
                symbology
            )));
        }
        if !(1..=255).contains(&height) {
            return Err(Error::InvalidConfig(format!(
                "barcode height {} is not 1 to 255",
                height
            )));
        }
        if !(2..=6).contains(&module_width) {
            return Err(Error::InvalidConfig(format!(
                "barcode width {} is not 2 to 6",
                module_width
            )));
        }
        let text_position = match text_position {
            0 => TextPosition::None,
            1 => TextPosition::Above,
            2 => TextPosition::Below,
            3 => TextPosition::Both,
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "text position {} is not 0 to 3",
                    text_position
                )))
            }
        };

        let params = BarcodeParams {
            data: data.into(),
            symbology: Symbology::from_code(symbology),
            height: height as u8,
            module_width: module_width as u8,
            text_position,
        };
        let len = params.command_data().len();
        if len > u8::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "barcode data is {} bytes, at most 255 fit",
                len
            )));
        }
        Ok(params)
    }

    /// Data as it goes into GS k. Code 128 needs a code set selector in
    /// front unless the caller picked one.
    pub(crate) fn command_data(&self) -> Vec<u8> {
        let mut data = self.data.as_bytes().to_vec();
        if self.symbology == Symbology::Code128 && !data.starts_with(b"{") {
            data.splice(0..0, *b"{B");
        }
        data
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn module_width(&self) -> u8 {
        self.module_width
    }

    pub fn text_position(&self) -> TextPosition {
        self.text_position
    }
}

/// Parameters for a QR code rendered by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrParams {
    data: String,
    module_size: u8,
    error_level: ErrorLevel,
}

impl QrParams {
    /// `module_size` 1 to 16 dots, `error_level` 0 (L) to 3 (H). The data
    /// must fit the 16 bit store length together with its 3 byte header.
    pub fn new(data: impl Into<String>, module_size: i32, error_level: i32) -> Result<Self, Error> {
        let data = data.into();
        if data.len() + 3 > u16::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "QR data is {} bytes, at most {} fit",
                data.len(),
                u16::MAX - 3
            )));
        }
        if !(1..=16).contains(&module_size) {
            return Err(Error::InvalidConfig(format!(
                "QR module size {} is not 1 to 16",
                module_size
            )));
        }
        let error_level = match error_level {
            0 => ErrorLevel::L,
            1 => ErrorLevel::M,
            2 => ErrorLevel::Q,
            3 => ErrorLevel::H,
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "QR error level {} is not 0 to 3",
                    error_level
                )))
            }
        };

        Ok(QrParams {
            data,
            module_size: module_size as u8,
            error_level,
        })
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn module_size(&self) -> u8 {
        self.module_size
    }

    pub fn error_level(&self) -> ErrorLevel {
        self.error_level
    }
}

/// Lifecycle of the binding to the printer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Printer
///
/// Owns the pipelines and, once the service is bound, the sink. Bind and
/// unbind events drive [`ConnectionState`]; every operation checks it
/// before doing any work.
pub struct Printer<S: PrinterSink> {
    state: ConnectionState,
    sink: Option<S>,
    importer: RasterImporter,
    encoder: SymbolEncoder,
    config: Config,
}

impl<S: PrinterSink> Printer<S> {
    pub fn new(config: Config) -> Self {
        Printer {
            state: ConnectionState::Disconnected,
            sink: None,
            importer: RasterImporter::new(config.clone()),
            encoder: SymbolEncoder::new(config.clone()),
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start binding to the service. The sink arrives with [`Self::on_connected`].
    pub fn bind(&mut self) {
        if self.state == ConnectionState::Disconnected {
            debug!("binding printer service");
            self.state = ConnectionState::Connecting;
        }
    }

    /// The service came up while binding.
    ///
    /// A sink arriving after [`Self::unbind`] is dropped.
    pub fn on_connected(&mut self, sink: S) {
        match self.state {
            ConnectionState::Disconnected => {
                warn!("printer service connected while unbound, ignoring");
            }
            _ => {
                info!("printer service connected");
                self.sink = Some(sink);
                self.state = ConnectionState::Connected;
            }
        }
    }

    /// The service went away. Returns the sink it was using.
    pub fn on_disconnected(&mut self) -> Option<S> {
        info!("printer service disconnected");
        self.state = ConnectionState::Disconnected;
        self.sink.take()
    }

    /// Release the service.
    pub fn unbind(&mut self) -> Option<S> {
        debug!("unbinding printer service");
        self.state = ConnectionState::Disconnected;
        self.sink.take()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.sink.as_ref().map_or(false, |s| s.is_connected())
    }

    fn sink(&mut self) -> Result<&mut S, Error> {
        if self.state != ConnectionState::Connected {
            return Err(Error::Disconnected);
        }
        match self.sink.as_mut() {
            Some(sink) if sink.is_connected() => Ok(sink),
            _ => Err(Error::Disconnected),
        }
    }

    /// Reset the printer (ESC @).
    pub fn init_printer(&mut self) -> Result<(), Error> {
        self.sink()?.send_raw(&escpos::initialize())
    }

    /// Feed `lines` lines after the pending content.
    pub fn line_wrap(&mut self, lines: u8) -> Result<(), Error> {
        self.sink()?.send_raw(&escpos::feed_lines(lines))
    }

    pub fn set_alignment(&mut self, alignment: Alignment) -> Result<(), Error> {
        self.sink()?.send_raw(&escpos::alignment(alignment))
    }

    /// Character size multiplier, 1 to 8.
    pub fn set_font_size(&mut self, multiplier: u8) -> Result<(), Error> {
        let sink = self.sink()?;
        if !(1..=8).contains(&multiplier) {
            return Err(Error::InvalidConfig(format!(
                "font size {} is not 1 to 8",
                multiplier
            )));
        }
        sink.send_raw(&escpos::font_size(multiplier))
    }

    pub fn print_text(&mut self, text: &str) -> Result<(), Error> {
        self.sink()?.print_text(text)
    }

    /// Print `text` framed by the raw bold and underline commands.
    ///
    /// Both styles are switched off afterwards whether or not they were
    /// requested.
    pub fn print_text_with_style(&mut self, text: &str, style: TextStyle) -> Result<(), Error> {
        let sink = self.sink()?;
        if style.contains(TextStyle::BOLD) {
            sink.send_raw(&escpos::bold(true))?;
        }
        if style.contains(TextStyle::UNDERLINE) {
            sink.send_raw(&escpos::underline(true))?;
        }
        sink.print_text(text)?;
        sink.send_raw(&escpos::bold(false))?;
        sink.send_raw(&escpos::underline(false))
    }

    pub fn print_barcode(&mut self, params: &BarcodeParams) -> Result<(), Error> {
        self.sink()?.print_barcode(params)
    }

    pub fn print_qr_code(&mut self, params: &QrParams) -> Result<(), Error> {
        self.sink()?.print_qr_code(params)
    }

    /// Decode an image, fit it into `width` x `height` and print it.
    ///
    /// `width` may not exceed [`MAX_PRINTER_WIDTH`].
    pub fn print_bitmap(&mut self, bytes: &[u8], width: u32, height: u32) -> Result<(), Error> {
        self.sink()?;
        check_width(width)?;
        let raster = self.importer.import(bytes, width, height)?;
        self.sink()?.print_raster(raster)
    }

    /// Draw a symbol and print it. Nothing is sent for an empty payload.
    pub fn print_symbol(&mut self, spec: &SymbolSpec) -> Result<(), Error> {
        self.sink()?;
        check_width(spec.target_width)?;
        match self.encoder.encode(spec)? {
            Some(raster) => self.sink()?.print_raster(raster),
            None => {
                debug!("empty {:?} payload, nothing to print", spec.symbology);
                Ok(())
            }
        }
    }

    /// Print one table row, wrapping cells over as many lines as needed.
    ///
    /// Column widths are shares of the configured line width.
    pub fn print_text_table(&mut self, columns: &[Column]) -> Result<(), Error> {
        let line_width = self.config.line_width;
        let charset = self.config.character_set;
        let sink = self.sink()?;
        for line in layout::layout_columns(columns, line_width, charset)? {
            sink.print_text(&format!("{}\n", line))?;
        }
        Ok(())
    }

    pub fn open_cash_box(&mut self) -> Result<(), Error> {
        self.sink()?.open_cash_drawer()
    }

    /// Feed the paper out to the tear bar, or three lines when the device
    /// cannot tell how far that is.
    pub fn feed_paper(&mut self) -> Result<(), Error> {
        let sink = self.sink()?;
        match sink.feed_paper() {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!("feed_paper failed ({}), feeding {} lines", err, FALLBACK_FEED_LINES);
                sink.send_raw(&escpos::feed_lines(FALLBACK_FEED_LINES))
            }
        }
    }

    /// Hold print calls until [`Self::commit_printer_buffer`].
    pub fn enter_printer_buffer(&mut self, clean: bool) -> Result<(), Error> {
        self.sink()?.enter_buffer(clean)
    }

    pub fn commit_printer_buffer(&mut self) -> Result<(), Error> {
        self.sink()?.commit_buffer()
    }

    pub fn exit_printer_buffer(&mut self, commit: bool) -> Result<(), Error> {
        self.sink()?.exit_buffer(commit)
    }

    /// Ask the device for its state.
    pub fn printer_status(&mut self) -> Result<PrinterStatus, Error> {
        let status = self.sink()?.status()?;
        if status.is_ready() {
            debug!("printer status: {}", status);
        } else {
            warn!("printer status: {}", status);
        }
        Ok(status)
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sink()?.send_raw(bytes)
    }
}

fn check_width(width: u32) -> Result<(), Error> {
    if width > MAX_PRINTER_WIDTH {
        return Err(Error::InvalidConfig(format!(
            "width {} exceeds the {} dot head",
            width, MAX_PRINTER_WIDTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barcode_params_ranges() {
        assert!(BarcodeParams::new("123", 8, 162, 2, 0).is_ok());
        assert!(BarcodeParams::new("123", 9, 162, 2, 0).is_err());
        assert!(BarcodeParams::new("123", 8, 0, 2, 0).is_err());
        assert!(BarcodeParams::new("123", 8, 256, 2, 0).is_err());
        assert!(BarcodeParams::new("123", 8, 162, 7, 0).is_err());
        assert!(BarcodeParams::new("123", 8, 162, 2, 4).is_err());
    }

    #[test]
    fn barcode_data_must_fit_length_byte() {
        assert!(BarcodeParams::new("1".repeat(255), 4, 162, 2, 0).is_ok());
        assert!(matches!(
            BarcodeParams::new("1".repeat(256), 4, 162, 2, 0),
            Err(Error::InvalidConfig(_))
        ));
        // The code set selector counts.
        assert!(BarcodeParams::new("A".repeat(253), 8, 162, 2, 0).is_ok());
        assert!(BarcodeParams::new("A".repeat(254), 8, 162, 2, 0).is_err());
        assert!(BarcodeParams::new(format!("{{C{}", "1".repeat(253)), 8, 162, 2, 0).is_ok());
    }

    #[test]
    fn qr_data_must_fit_store_length() {
        assert!(QrParams::new("x".repeat(65_532), 4, 0).is_ok());
        assert!(QrParams::new("x".repeat(65_533), 4, 0).is_err());
    }

    #[test]
    fn status_codes() {
        assert_eq!(PrinterStatus::from_code(4), PrinterStatus::OutOfPaper);
        assert_eq!(PrinterStatus::from_code(505), PrinterStatus::NotFound);
        assert_eq!(PrinterStatus::from_code(42), PrinterStatus::Unknown(42));
        for code in (1..=9).chain([505, 42]) {
            assert_eq!(PrinterStatus::from_code(code).code(), code);
        }
        assert!(PrinterStatus::Running.is_ready());
        assert!(!PrinterStatus::CoverOpen.is_ready());
        assert_eq!(PrinterStatus::OutOfPaper.to_string(), "Printer is out of paper");
    }

    #[test]
    fn qr_params_ranges() {
        assert_eq!(QrParams::new("x", 16, 3).unwrap().error_level(), ErrorLevel::H);
        assert!(QrParams::new("x", 0, 0).is_err());
        assert!(QrParams::new("x", 17, 0).is_err());
        assert!(QrParams::new("x", 4, 4).is_err());
    }

    #[test]
    fn alignment_codes() {
        assert_eq!(Alignment::from_code(1).unwrap(), Alignment::Center);
        assert!(Alignment::from_code(3).is_err());
    }
}
