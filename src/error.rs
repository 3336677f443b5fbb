//! Error types for raster import, symbol encoding and printer operations.
//!
//! Every failure of the two pipelines is returned to the caller as a value.
//! Nothing here is retried and nothing is shown to a user; that is left to
//! the calling layer.

use crate::symbol::Symbology;
use std::fmt;
use thiserror::Error;

/// Main error type for printer operations.
///
/// Wraps the pipeline errors and adds the failures that only show up once
/// a [`PrinterSink`](crate::PrinterSink) is involved.
#[derive(Error, Debug)]
pub enum Error {
    /// The image could not be turned into a raster.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The payload could not be turned into a symbol raster.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Printer service is not bound, or the sink reports it lost the device.
    ///
    /// Raised before any work is attempted.
    #[error("Printer service is not connected")]
    Disconnected,

    /// Invalid parameter provided.
    ///
    /// This error occurs when a value is out of the range the printer
    /// accepts, e.g. a QR module size of 0 or a bitmap wider than the head.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    /// The sink failed while handing data to the device.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The sink has no way to carry out the request.
    #[error("{0} is not supported by this printer")]
    Unsupported(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Why an import failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeReason {
    /// Unknown container, unreadable header, or a decode that broke off.
    UnparseableSource,
    /// Target width or height is zero.
    InvalidTargetDimensions,
    /// No bytes, or a header announcing zero pixels.
    EmptySource,
    /// The decoder would have allocated more than the configured cap.
    SourceTooLarge,
}

impl DecodeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnparseableSource => "unparseable-source",
            Self::InvalidTargetDimensions => "invalid-target-dimensions",
            Self::EmptySource => "empty-source",
            Self::SourceTooLarge => "source-too-large",
        }
    }
}

impl fmt::Display for DecodeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of [`RasterImporter::import`](crate::RasterImporter::import).
///
/// Carries the requested box and, once the header has been read, the
/// content size of the source so the caller can decide whether another
/// attempt with different parameters makes sense.
#[derive(Error, Debug)]
#[error("{reason}: target {target_width}x{target_height}{}", source_suffix(.source_size))]
pub struct DecodeError {
    pub reason: DecodeReason,
    pub target_width: u32,
    pub target_height: u32,
    pub source_size: Option<(u32, u32)>,
    #[source]
    pub cause: Option<image::ImageError>,
}

fn source_suffix(size: &Option<(u32, u32)>) -> String {
    match size {
        Some((w, h)) => format!(", source {}x{}", w, h),
        None => String::new(),
    }
}

impl DecodeError {
    pub(crate) fn new(reason: DecodeReason, target_width: u32, target_height: u32) -> Self {
        DecodeError {
            reason,
            target_width,
            target_height,
            source_size: None,
            cause: None,
        }
    }

    pub(crate) fn with_source_size(self, size: (u32, u32)) -> Self {
        DecodeError {
            source_size: Some(size),
            ..self
        }
    }

    pub(crate) fn with_cause(self, cause: image::ImageError) -> Self {
        DecodeError {
            cause: Some(cause),
            ..self
        }
    }
}

/// Why an encode failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeReason {
    /// Payload outside the symbology's alphabet or length rules.
    IncompatiblePayload,
    /// The requested geometry cannot hold the payload.
    MatrixTooSmall,
    /// The requested geometry is past what the encoder will allocate.
    MatrixTooLarge,
}

impl EncodeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncompatiblePayload => "incompatible-payload",
            Self::MatrixTooSmall => "matrix-too-small",
            Self::MatrixTooLarge => "matrix-too-large",
        }
    }
}

impl fmt::Display for EncodeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of [`SymbolEncoder::encode`](crate::SymbolEncoder::encode).
#[derive(Error, Debug, Clone)]
#[error("{reason}: {symbology:?} at {width}x{height}: {detail}")]
pub struct EncodeError {
    pub reason: EncodeReason,
    pub symbology: Symbology,
    pub width: u32,
    pub height: u32,
    pub detail: String,
}
