use tracing::{debug, info};

use crate::error::Result;
use crate::sheet::SheetBackend;
use crate::todo::{
    migrate_legacy_row, Labels, RowShape, TodoId, COLUMN_COUNT, LEGACY_COLUMN_COUNT,
};

/// Label of the id column; a sheet whose first cell differs is not ours.
pub const ID_LABEL: &str = "ID";

/// Current header row.
pub const HEADER: [&str; COLUMN_COUNT] = [
    ID_LABEL,
    "Title",
    "Content",
    "Due Date",
    "Priority",
    "Status",
    "Created At",
    "Updated At",
    "Completed At",
];

/// Current-layout header written by the Japanese edition of the app. Sheets
/// carrying it keep Japanese priority and status labels.
pub const JAPANESE_HEADER: [&str; COLUMN_COUNT] = [
    ID_LABEL,
    "タイトル",
    "内容",
    "期日",
    "重要度",
    "ステータス",
    "作成日時",
    "更新日時",
    "完了日時",
];

/// Header rows of the 6-column layout, as written by earlier releases.
pub const LEGACY_HEADERS: [[&str; LEGACY_COLUMN_COUNT]; 2] = [
    [ID_LABEL, "Title", "Content", "Due Date", "Created At", "Updated At"],
    [ID_LABEL, "タイトル", "内容", "期日", "作成日時", "更新日時"],
];

/// What `ensure_schema` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// Header already current.
    Unchanged,
    /// Sheet was empty or foreign; cleared and given a fresh header.
    Initialized,
    /// Header overwritten, data rows untouched.
    HeaderRewritten,
    /// Legacy data rows rewritten to the current layout, then the header.
    Migrated { rows: usize },
}

fn header_row() -> Vec<String> {
    HEADER.iter().map(|s| s.to_string()).collect()
}

/// The label language of a current header, or `None` if it is not one.
fn current_header_labels(cells: &[String]) -> Option<Labels> {
    let matches = |header: &[&str; COLUMN_COUNT]| {
        cells.len() >= COLUMN_COUNT && cells[..COLUMN_COUNT].iter().zip(header).all(|(a, b)| a == b)
    };
    if matches(&HEADER) {
        Some(Labels::English)
    } else if matches(&JAPANESE_HEADER) {
        Some(Labels::Japanese)
    } else {
        None
    }
}

fn is_legacy_header(cells: &[String]) -> bool {
    LEGACY_HEADERS
        .iter()
        .any(|legacy| cells.len() == legacy.len() && cells.iter().zip(legacy).all(|(a, b)| a == b))
}

/// Make sure the header row matches the current layout, migrating legacy
/// rows if needed.
///
/// Runs once per connection. Safe to run again: a sheet with a current
/// header is left alone, and row migration only rewrites rows that still have
/// the legacy shape.
pub async fn ensure_schema<B: SheetBackend + ?Sized>(backend: &B) -> Result<SchemaOutcome> {
    Ok(ensure_schema_labels(backend).await?.0)
}

/// [`ensure_schema`], also reporting which label language the sheet uses
/// from now on.
pub(crate) async fn ensure_schema_labels<B: SheetBackend + ?Sized>(
    backend: &B,
) -> Result<(SchemaOutcome, Labels)> {
    let header = backend.read_row(1).await?;

    if header.first().map(String::as_str) != Some(ID_LABEL) {
        info!("Sheet has no recognisable header; initializing");
        backend.clear().await?;
        write_header(backend).await?;
        return Ok((SchemaOutcome::Initialized, Labels::English));
    }

    if let Some(labels) = current_header_labels(&header) {
        debug!("Sheet header is current ({labels:?} labels)");
        return Ok((SchemaOutcome::Unchanged, labels));
    }

    if is_legacy_header(&header) {
        let rows = backend.read_all().await?;
        let has_data = rows
            .iter()
            .skip(1)
            .any(|r| r.first().and_then(|c| TodoId::parse_cell(c)).is_some());

        if has_data {
            let mut migrated = 0;
            for (idx, cells) in rows.iter().enumerate().skip(1) {
                let is_record = cells.first().and_then(|c| TodoId::parse_cell(c)).is_some();
                if !is_record || RowShape::detect(cells) != RowShape::Legacy {
                    continue;
                }
                backend.write_row(idx + 1, &migrate_legacy_row(cells)).await?;
                migrated += 1;
            }
            write_header(backend).await?;
            info!("Migrated {migrated} row(s) from the 6-column layout");
            return Ok((SchemaOutcome::Migrated { rows: migrated }, Labels::English));
        }
    }

    info!("Rewriting outdated sheet header");
    write_header(backend).await?;
    Ok((SchemaOutcome::HeaderRewritten, Labels::English))
}

async fn write_header<B: SheetBackend + ?Sized>(backend: &B) -> Result<()> {
    backend.write_row(1, &header_row()).await?;
    // Bold header is cosmetic; never fail initialization over it.
    if let Err(e) = backend.format_header(COLUMN_COUNT).await {
        debug!("Skipping header formatting on {}: {e}", backend.name());
    }
    Ok(())
}
