//! Thermal Printer Rasterizer
//!
//! This crate prepares images and barcodes for 384 dot monochrome thermal
//! receipt printers. [`RasterImporter`] decodes an image under a memory cap
//! and fits it into a target box; [`SymbolEncoder`] draws a barcode or QR
//! code as a bi-level raster of an exact size. Both hand back a [`Raster`]
//! that a [`PrinterSink`] prints.
//!
//! # Example
//!
//! ```rust,no_run
//! use thermal_raster::{Config, EscPosSink, Printer, SymbolSpec, Symbology};
//!
//! let config = Config::new();
//! let mut printer = Printer::new(config.clone());
//! printer.bind();
//! printer.on_connected(EscPosSink::new(std::io::stdout(), config));
//!
//! let spec = SymbolSpec::new("https://example.com", Symbology::Qr, 256, 256);
//! printer.print_symbol(&spec).unwrap();
//! ```

mod config;
mod error;
pub mod escpos;
mod importer;
mod layout;
mod printer;
mod raster;
mod symbol;

pub use crate::{
    config::{Config, DEFAULT_LINE_WIDTH, DEFAULT_MAX_ALLOC, DEFAULT_QUIET_ZONE},
    error::{DecodeError, DecodeReason, EncodeError, EncodeReason, Error},
    escpos::EscPosSink,
    importer::RasterImporter,
    layout::Column,
    printer::{
        Alignment, BarcodeParams, ConnectionState, ErrorLevel, Printer, PrinterSink,
        PrinterStatus, QrParams, TextPosition, TextStyle,
    },
    raster::{Pixels, Raster, ARGB_BLACK, ARGB_WHITE},
    symbol::{SymbolEncoder, SymbolSpec, Symbology},
};

/// Type alias for 1-bit bitmap data sent to the print head.
///
/// Each inner `Vec<u8>` is one row of dots, 8 dots per byte with the
/// leftmost dot in the most significant bit. The outer Vec holds the rows.
pub type Matrix = Vec<Vec<u8>>;

/// Width in dots of the print head on 58 mm thermal printers.
///
/// Callers should keep target widths at or below this; the importer itself
/// does not enforce it.
pub const MAX_PRINTER_WIDTH: u32 = 384;
