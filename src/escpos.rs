//! ESC/POS command bytes and a sink that writes them.
//!
//! Only the handful of commands needed to frame processed media are here:
//! init, feed, alignment, character size, bold/underline, raster bit
//! image, the printer's own barcode and QR renderers, and the drawer kick.

use log::{debug, warn};
use std::io::Write;

use crate::{
    error::Error,
    printer::{Alignment, BarcodeParams, PrinterSink, QrParams},
    raster::Raster,
    Config, MAX_PRINTER_WIDTH,
};

/// Most rows a single GS v 0 header can announce.
pub const RASTER_BAND_ROWS: usize = u16::MAX as usize;

/// ESC @ : reset the printer to its power-on state.
pub fn initialize() -> Vec<u8> {
    vec![0x1B, 0x40]
}

/// ESC d n : print the buffer and feed `lines` lines.
pub fn feed_lines(lines: u8) -> Vec<u8> {
    vec![0x1B, 0x64, lines]
}

/// ESC a n
pub fn alignment(alignment: Alignment) -> Vec<u8> {
    vec![0x1B, 0x61, alignment as u8]
}

/// GS ! n : character width and height multiplier, 1 to 8.
pub fn font_size(multiplier: u8) -> Vec<u8> {
    let m = multiplier.clamp(1, 8) - 1;
    vec![0x1D, 0x21, (m << 4) | m]
}

/// ESC E n
pub fn bold(on: bool) -> Vec<u8> {
    vec![0x1B, 0x45, on as u8]
}

/// ESC - n : one dot underline when on.
pub fn underline(on: bool) -> Vec<u8> {
    vec![0x1B, 0x2D, on as u8]
}

/// GS v 0 : raster bit image, one bit per dot.
///
/// Rasters taller than [`RASTER_BAND_ROWS`] go out as several images
/// stacked directly on top of each other.
pub fn raster_image(raster: &Raster, threshold: u8) -> Result<Vec<u8>, Error> {
    let x_bytes = u16::try_from(raster.width().div_ceil(8)).map_err(|_| {
        Error::InvalidConfig(format!(
            "raster {} dots wide does not fit GS v 0",
            raster.width()
        ))
    })?;
    let rows = raster.to_matrix(threshold);
    let bands = rows.len().div_ceil(RASTER_BAND_ROWS);

    let mut buf: Vec<u8> = Vec::with_capacity(8 * bands + x_bytes as usize * rows.len());
    for band in rows.chunks(RASTER_BAND_ROWS) {
        buf.extend_from_slice(&[0x1D, 0x76, 0x30, 0x00]);
        buf.extend_from_slice(&x_bytes.to_le_bytes());
        buf.extend_from_slice(&(band.len() as u16).to_le_bytes());
        for row in band {
            buf.extend_from_slice(row);
        }
    }
    Ok(buf)
}

/// GS H, GS h, GS w then GS k (function B) for the printer's own renderer.
pub fn barcode(params: &BarcodeParams) -> Vec<u8> {
    // At most 255 bytes, checked by `BarcodeParams::new`.
    let mut data = params.command_data();

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&[0x1D, 0x48, params.text_position() as u8]);
    buf.extend_from_slice(&[0x1D, 0x68, params.height()]);
    buf.extend_from_slice(&[0x1D, 0x77, params.module_width()]);
    buf.extend_from_slice(&[0x1D, 0x6B, 65 + params.symbology().code(), data.len() as u8]);
    buf.append(&mut data);
    buf
}

/// GS ( k sequence: model 2, module size, error level, store, print.
pub fn qr_code(params: &QrParams) -> Vec<u8> {
    let data = params.data().as_bytes();
    let store_len = (data.len() + 3) as u16;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);
    buf.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, params.module_size()]);
    buf.extend_from_slice(&[
        0x1D,
        0x28,
        0x6B,
        0x03,
        0x00,
        0x31,
        0x45,
        0x30 + params.error_level() as u8,
    ]);
    buf.extend_from_slice(&[0x1D, 0x28, 0x6B]);
    buf.extend_from_slice(&store_len.to_le_bytes());
    buf.extend_from_slice(&[0x31, 0x50, 0x30]);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);
    buf
}

/// ESC p 0 t1 t2 : drawer kick on pin 2, 50 ms on, 500 ms off.
pub fn open_drawer() -> Vec<u8> {
    vec![0x1B, 0x70, 0x00, 25, 250]
}

/// A [`PrinterSink`] that renders every call as ESC/POS into a writer.
///
/// Text is transcoded with the configured character set before it is
/// written, rasters are thresholded with the configured luma threshold.
/// In buffer mode the bytes are held in memory until committed.
pub struct EscPosSink<W: Write> {
    writer: W,
    config: Config,
    held: Option<Vec<u8>>,
}

impl<W: Write> EscPosSink<W> {
    pub fn new(writer: W, config: Config) -> Self {
        EscPosSink {
            writer,
            config,
            held: None,
        }
    }

    /// Hand back the writer. Bytes still held in buffer mode are dropped.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
        if let Some(held) = self.held.as_mut() {
            held.extend_from_slice(buf);
            return Ok(());
        }
        self.write_through(buf)
    }

    fn write_through(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.writer.write_all(buf)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> PrinterSink for EscPosSink<W> {
    fn is_connected(&self) -> bool {
        true
    }

    fn print_raster(&mut self, raster: Raster) -> Result<(), Error> {
        if raster.width() > MAX_PRINTER_WIDTH {
            warn!(
                "raster is {} dots wide, the head only has {}",
                raster.width(),
                MAX_PRINTER_WIDTH
            );
        }
        let buf = raster_image(&raster, self.config.threshold)?;
        debug!("writing {} bytes of raster data", buf.len());
        self.write(&buf)
    }

    fn print_text(&mut self, text: &str) -> Result<(), Error> {
        let charset = self.config.character_set;
        let (bytes, _, unmappable) = charset.encode(text);
        if unmappable {
            return Err(Error::InvalidConfig(format!(
                "text has characters outside {}",
                charset.name()
            )));
        }
        self.write(&bytes)
    }

    fn print_barcode(&mut self, params: &BarcodeParams) -> Result<(), Error> {
        self.write(&barcode(params))
    }

    fn print_qr_code(&mut self, params: &QrParams) -> Result<(), Error> {
        self.write(&qr_code(params))
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.write(bytes)
    }

    fn open_cash_drawer(&mut self) -> Result<(), Error> {
        self.write(&open_drawer())
    }

    fn enter_buffer(&mut self, clean: bool) -> Result<(), Error> {
        match self.held.as_mut() {
            Some(held) if clean => {
                debug!("dropping {} held bytes", held.len());
                held.clear();
            }
            Some(_) => {}
            None => self.held = Some(Vec::new()),
        }
        Ok(())
    }

    fn commit_buffer(&mut self) -> Result<(), Error> {
        match self.held.as_mut().map(std::mem::take) {
            Some(held) => {
                debug!("committing {} held bytes", held.len());
                self.write_through(&held)
            }
            None => {
                warn!("commit outside buffer mode, nothing held");
                Ok(())
            }
        }
    }

    fn exit_buffer(&mut self, commit: bool) -> Result<(), Error> {
        match self.held.take() {
            Some(held) if commit => self.write_through(&held),
            Some(held) => {
                debug!("leaving buffer mode, dropping {} held bytes", held.len());
                Ok(())
            }
            None => Ok(()),
        }
    }
}
