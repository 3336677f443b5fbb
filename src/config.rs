use image::imageops::FilterType;

/// Default decoder allocation cap, 256 MiB.
pub const DEFAULT_MAX_ALLOC: u64 = 256 * 1024 * 1024;

/// Quiet zone around a QR symbol, in modules.
pub const DEFAULT_QUIET_ZONE: u32 = 4;

/// Characters per line in the default 12x24 font on 58 mm paper.
pub const DEFAULT_LINE_WIDTH: usize = 32;

/// Config
///
/// Tuning shared by the importer, the symbol encoder and the ESC/POS sink.
/// Every setter consumes and returns the value so settings chain.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) max_alloc: Option<u64>,
    pub(crate) resize_filter: FilterType,
    pub(crate) character_set: &'static encoding_rs::Encoding,
    pub(crate) quiet_zone: u32,
    pub(crate) threshold: u8,
    pub(crate) line_width: usize,
}

impl Config {
    /// Initialize configuration data with default values.
    ///
    /// # Example
    ///
    /// ```
    /// use thermal_raster::Config;
    ///
    /// let config = Config::new().max_alloc(Some(64 * 1024 * 1024)).threshold(100);
    /// ```
    ///
    pub fn new() -> Config {
        Config {
            max_alloc: Some(DEFAULT_MAX_ALLOC),
            resize_filter: FilterType::Triangle,
            character_set: encoding_rs::GBK,
            quiet_zone: DEFAULT_QUIET_ZONE,
            threshold: 128,
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    /// Cap the bytes the image decoder may allocate. `None` lifts the cap.
    pub fn max_alloc(self, max_alloc: Option<u64>) -> Self {
        Config { max_alloc, ..self }
    }

    /// Filter used when the decoded image is still larger than the box.
    pub fn resize_filter(self, resize_filter: FilterType) -> Self {
        Config {
            resize_filter,
            ..self
        }
    }

    /// Text encoding applied to symbol payloads.
    pub fn character_set(self, character_set: &'static encoding_rs::Encoding) -> Self {
        Config {
            character_set,
            ..self
        }
    }

    /// Blank modules kept around a QR symbol on every side.
    pub fn quiet_zone(self, quiet_zone: u32) -> Self {
        Config { quiet_zone, ..self }
    }

    /// Luma below which a pixel is printed black.
    pub fn threshold(self, threshold: u8) -> Self {
        Config { threshold, ..self }
    }

    /// Width of a text table row, in single byte characters.
    pub fn line_width(self, line_width: usize) -> Self {
        Config { line_width, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
