//! Fixed-width column layout
//!
//! Values are right-justified into their column. A value wider than its
//! column is written in full and the excess is taken out of the next
//! column's width, so one long value shifts at most its right neighbour.

use crate::error::{Error, Result};

/// Narrowest width a label can be shortened to
pub const MIN_RENDER_WIDTH: usize = 3;

const ELLIPSIS: char = '…';

/// A table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub width: usize,
    pub label: &'static str,
}

impl Column {
    pub const fn new(width: usize, label: &'static str) -> Self {
        Self { width, label }
    }
}

/// Pod table columns, left to right
pub const COLUMNS: [Column; 5] = [
    Column::new(20, "POD"),
    Column::new(26, "(CONTAINER)"),
    Column::new(12, "%CPU"),
    Column::new(12, "MEM"),
    Column::new(7, "%MEM"),
];

/// Lay out one row, terminated by a newline
pub fn render_row<S: AsRef<str>>(columns: &[Column], values: &[S]) -> String {
    let mut row = String::new();
    let mut debt: isize = 0;

    for (value, column) in values.iter().zip(columns) {
        let width = column.width as isize;
        let effective = (width - debt.max(0)).max(0) as usize;
        let field = format!("{:>effective$}", value.as_ref());
        debt = field.chars().count() as isize - width;
        row.push_str(&field);
    }

    row.push('\n');
    row
}

/// The header row built from column labels
pub fn render_header(columns: &[Column]) -> String {
    let labels: Vec<&str> = columns.iter().map(|c| c.label).collect();
    render_row(columns, &labels)
}

/// Shorten a label to `width` characters by replacing its middle with an ellipsis
///
/// Labels that already fit are returned unchanged.
pub fn render_limited_width(label: &str, width: usize) -> Result<String> {
    if width < MIN_RENDER_WIDTH {
        return Err(Error::InvalidRenderWidth { width });
    }

    let length = label.chars().count();
    if length <= width {
        return Ok(label.to_string());
    }

    let kept = width - 1;
    let head = kept - kept / 2;
    let tail = kept / 2;

    let mut shortened: String = label.chars().take(head).collect();
    shortened.push(ELLIPSIS);
    shortened.extend(label.chars().skip(length - tail));
    Ok(shortened)
}

/// The first `rows` lines of `text`, byte-for-byte
pub fn clip_lines(text: &str, rows: usize) -> &str {
    if rows == 0 {
        return "";
    }
    match text.match_indices('\n').nth(rows - 1) {
        Some((index, _)) => &text[..=index],
        None => text,
    }
}
