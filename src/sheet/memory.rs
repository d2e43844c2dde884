use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Result, StoreError};

use super::SheetBackend;

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Vec<String>>,
    bold_header_columns: Option<usize>,
    fail_format: bool,
    writes: usize,
}

/// In-process sheet.
///
/// Clones share the same table, so a test can keep one handle to make
/// out-of-band edits while the store owns another. Reads trim trailing empty
/// cells and trailing empty rows the way the Sheets API does.
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    table: Arc<Mutex<Table>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a sheet with raw rows (header included).
    pub fn with_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let sheet = Self::new();
        sheet.lock().rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        sheet
    }

    /// Snapshot of the stored rows, untrimmed.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.lock().rows.clone()
    }

    /// Make `format_header` fail from now on.
    pub fn fail_header_format(&self) {
        self.lock().fail_format = true;
    }

    /// Number of header columns rendered bold, if formatting ever succeeded.
    pub fn bold_header_columns(&self) -> Option<usize> {
        self.lock().bold_header_columns
    }

    /// Count of mutating calls (write, append, delete, clear).
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Replace a row directly, bypassing the write counter.
    pub fn set_row(&self, row: usize, values: Vec<String>) {
        let mut table = self.lock();
        let idx = row.saturating_sub(1);
        if table.rows.len() <= idx {
            table.rows.resize(idx + 1, Vec::new());
        }
        table.rows[idx] = values;
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn trim_row(row: &[String]) -> Vec<String> {
    let len = row
        .iter()
        .rposition(|c| !c.is_empty())
        .map_or(0, |i| i + 1);
    row[..len].to_vec()
}

fn check_row(row: usize) -> Result<usize> {
    row.checked_sub(1)
        .ok_or_else(|| StoreError::Backend("row numbers start at 1".to_string()))
}

#[async_trait]
impl SheetBackend for MemorySheet {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let table = self.lock();
        let mut rows: Vec<Vec<String>> = table.rows.iter().map(|r| trim_row(r)).collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn read_row(&self, row: usize) -> Result<Vec<String>> {
        let idx = check_row(row)?;
        Ok(self
            .lock()
            .rows
            .get(idx)
            .map(|r| trim_row(r))
            .unwrap_or_default())
    }

    async fn write_row(&self, row: usize, values: &[String]) -> Result<()> {
        let idx = check_row(row)?;
        let mut table = self.lock();
        table.writes += 1;
        if table.rows.len() <= idx {
            table.rows.resize(idx + 1, Vec::new());
        }
        let target = &mut table.rows[idx];
        if target.len() < values.len() {
            target.resize(values.len(), String::new());
        }
        target[..values.len()].clone_from_slice(values);
        Ok(())
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        let mut table = self.lock();
        table.writes += 1;
        let last = table
            .rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map_or(0, |i| i + 1);
        table.rows.truncate(last);
        table.rows.push(values.to_vec());
        Ok(())
    }

    async fn delete_row(&self, row: usize) -> Result<()> {
        let idx = check_row(row)?;
        let mut table = self.lock();
        if idx >= table.rows.len() {
            return Err(StoreError::Backend(format!(
                "row {row} is beyond the last row ({})",
                table.rows.len()
            )));
        }
        table.writes += 1;
        table.rows.remove(idx);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut table = self.lock();
        table.writes += 1;
        table.rows.clear();
        Ok(())
    }

    async fn format_header(&self, columns: usize) -> Result<()> {
        let mut table = self.lock();
        if table.fail_format {
            return Err(StoreError::Backend("formatting is not supported".to_string()));
        }
        table.bold_header_columns = Some(columns);
        Ok(())
    }
}
