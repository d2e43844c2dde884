//! Raw row I/O against a remote tabular store.
//!
//! Rows are addressed by 1-based position, columns by A1 letters. Backends
//! know nothing about todos; the record store layers meaning on top.

mod google;
mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use google::{GoogleSheet, ServiceAccountKey, SHEETS_API_BASE};
pub use memory::MemorySheet;

/// Trait that all sheet backends implement. The store interacts only through this trait.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Human-readable name (e.g., "google-sheets", "memory").
    fn name(&self) -> &str;

    /// Every row of the sheet, header included. Trailing empty cells of a row
    /// may be omitted.
    async fn read_all(&self) -> Result<Vec<Vec<String>>>;

    /// A single row, empty if the row has no values.
    async fn read_row(&self, row: usize) -> Result<Vec<String>>;

    /// Overwrite the cells `A{row}` onwards with `values`.
    async fn write_row(&self, row: usize, values: &[String]) -> Result<()>;

    /// Append a row after the last non-empty row.
    async fn append_row(&self, values: &[String]) -> Result<()>;

    /// Physically remove a row; later rows shift up by one.
    async fn delete_row(&self, row: usize) -> Result<()>;

    /// Remove every value from the sheet.
    async fn clear(&self) -> Result<()>;

    /// Render the first `columns` cells of row 1 in bold.
    async fn format_header(&self, columns: usize) -> Result<()>;
}

#[async_trait]
impl<T: SheetBackend + ?Sized> SheetBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        (**self).read_all().await
    }

    async fn read_row(&self, row: usize) -> Result<Vec<String>> {
        (**self).read_row(row).await
    }

    async fn write_row(&self, row: usize, values: &[String]) -> Result<()> {
        (**self).write_row(row, values).await
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        (**self).append_row(values).await
    }

    async fn delete_row(&self, row: usize) -> Result<()> {
        (**self).delete_row(row).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    async fn format_header(&self, columns: usize) -> Result<()> {
        (**self).format_header(columns).await
    }
}

/// Column letter for a 1-based column index (1 → `A`, 27 → `AA`).
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// A1 range covering `width` cells of one row, e.g. `'Sheet1'!A2:I2`.
pub fn row_range(sheet_title: &str, row: usize, width: usize) -> String {
    let last = column_letter(width.max(1));
    format!("{}!A{row}:{last}{row}", quote_sheet_title(sheet_title))
}

/// Quote a sheet title for use in A1 notation.
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(9), "I");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn row_range_quotes_title() {
        assert_eq!(row_range("Sheet1", 1, 9), "'Sheet1'!A1:I1");
        assert_eq!(row_range("Bob's list", 4, 6), "'Bob''s list'!A4:F4");
    }
}
