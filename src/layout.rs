//! Text table layout.
//!
//! Widths are counted in bytes of the printer's character set, which on
//! GBK printers is also the number of half width cells a string covers.

use encoding_rs::Encoding;

use crate::{error::Error, printer::Alignment};

/// One cell of a table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub text: String,
    /// Share of the line this column gets, relative to the other columns.
    pub weight: u32,
    pub alignment: Alignment,
}

impl Column {
    pub fn new(text: impl Into<String>, weight: u32, alignment: Alignment) -> Self {
        Column {
            text: text.into(),
            weight,
            alignment,
        }
    }
}

/// Cells covered by `s` once encoded with `charset`.
pub(crate) fn text_width(s: &str, charset: &'static Encoding) -> usize {
    let (bytes, _, _) = charset.encode(s);
    bytes.len()
}

/// Split `columns` over a line of `line_width` cells.
///
/// Each column gets `line_width * weight / total` cells, the last one takes
/// what rounding left over. Text that does not fit its column wraps onto
/// following lines; the returned lines are all exactly `line_width` wide.
pub(crate) fn layout_columns(
    columns: &[Column],
    line_width: usize,
    charset: &'static Encoding,
) -> Result<Vec<String>, Error> {
    if columns.is_empty() {
        return Err(Error::InvalidConfig("table row has no columns".to_string()));
    }
    let total: u64 = columns.iter().map(|c| c.weight as u64).sum();
    if total == 0 {
        return Err(Error::InvalidConfig("column weights are all zero".to_string()));
    }

    let mut widths: Vec<usize> = columns
        .iter()
        .map(|c| (line_width as u64 * c.weight as u64 / total) as usize)
        .collect();
    let used: usize = widths[..widths.len() - 1].iter().sum();
    if let Some(last) = widths.last_mut() {
        *last = line_width - used;
    }

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(columns.len());
    for (i, (column, &width)) in columns.iter().zip(&widths).enumerate() {
        if width == 0 {
            return Err(Error::InvalidConfig(format!(
                "column {} gets no room on a {} wide line",
                i, line_width
            )));
        }
        cells.push(wrap(&column.text, width, charset).ok_or_else(|| {
            Error::InvalidConfig(format!("column {} is too narrow for its text", i))
        })?);
    }

    let rows = cells.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut line = String::with_capacity(line_width);
        for ((column, width), wrapped) in columns.iter().zip(&widths).zip(&cells) {
            let text = wrapped.get(row).map(String::as_str).unwrap_or("");
            pad(&mut line, text, *width, column.alignment, charset);
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Break `text` into pieces no wider than `width`. `None` when a single
/// character is wider than the column.
fn wrap(text: &str, width: usize, charset: &'static Encoding) -> Option<Vec<String>> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut used = 0;
    let mut buf = [0u8; 4];

    for c in text.chars() {
        if c == '\n' {
            pieces.push(std::mem::take(&mut piece));
            used = 0;
            continue;
        }
        let w = text_width(c.encode_utf8(&mut buf), charset);
        if w > width {
            return None;
        }
        if used + w > width {
            pieces.push(std::mem::take(&mut piece));
            used = 0;
        }
        piece.push(c);
        used += w;
    }
    if !piece.is_empty() || pieces.is_empty() {
        pieces.push(piece);
    }
    Some(pieces)
}

fn pad(
    line: &mut String,
    text: &str,
    width: usize,
    alignment: Alignment,
    charset: &'static Encoding,
) {
    let gap = width.saturating_sub(text_width(text, charset));
    let before = match alignment {
        Alignment::Left => 0,
        Alignment::Center => gap / 2,
        Alignment::Right => gap,
    };
    line.extend(std::iter::repeat(' ').take(before));
    line.push_str(text);
    line.extend(std::iter::repeat(' ').take(gap - before));
}
