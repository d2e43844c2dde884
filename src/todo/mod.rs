//! Typed todo records and their mapping onto sheet rows.
//!
//! A row is an ordered list of cell strings. Two layouts exist:
//!
//! | layout  | columns                                                                   |
//! |---------|---------------------------------------------------------------------------|
//! | legacy  | id, title, content, due_date, created_at, updated_at                      |
//! | current | id, title, content, due_date, priority, status, created_at, updated_at, completed_at |
//!
//! [`Todo::from_row`] is the single normalisation step applied on every read
//! path: absent or malformed priority/status cells fall back to their
//! defaults and legacy-shaped rows are read positionally as legacy.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::clock::TIMESTAMP_FORMAT;
use crate::error::{Result, StoreError};

/// Number of columns in the current layout.
pub const COLUMN_COUNT: usize = 9;
/// Number of columns in the legacy layout.
pub const LEGACY_COLUMN_COUNT: usize = 6;
/// Format of the `due_date` cell.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

mod col {
    pub const ID: usize = 0;
    pub const TITLE: usize = 1;
    pub const CONTENT: usize = 2;
    pub const DUE_DATE: usize = 3;
    pub const PRIORITY: usize = 4;
    pub const STATUS: usize = 5;
    pub const CREATED_AT: usize = 6;
    pub const UPDATED_AT: usize = 7;
    pub const COMPLETED_AT: usize = 8;

    pub const LEGACY_CREATED_AT: usize = 4;
    pub const LEGACY_UPDATED_AT: usize = 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(u64);

impl TodoId {
    /// Build an id; zero is not a valid record id.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The id following a high-water mark (`0` when nothing was seen).
    pub fn after(highest: u64) -> Result<Self> {
        highest.checked_add(1).map(Self).ok_or_else(|| {
            StoreError::Backend(format!("id space exhausted: sheet already holds id {highest}"))
        })
    }

    /// Parse the id cell of a row. Anything other than a plain run of ASCII
    /// digits holding a positive integer marks the row as a non-record.
    pub fn parse_cell(cell: &str) -> Option<Self> {
        if cell.is_empty() || !cell.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        cell.parse::<u64>().ok().and_then(Self::new)
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Language of the header and label cells a sheet was set up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Labels {
    #[default]
    English,
    Japanese,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::High, Self::Medium, Self::Low];

    /// Cell value written to the sheet.
    pub fn label(self) -> &'static str {
        self.label_in(Labels::English)
    }

    pub fn label_in(self, labels: Labels) -> &'static str {
        match (labels, self) {
            (Labels::English, Self::High) => "High",
            (Labels::English, Self::Medium) => "Medium",
            (Labels::English, Self::Low) => "Low",
            (Labels::Japanese, Self::High) => "高",
            (Labels::Japanese, Self::Medium) => "中",
            (Labels::Japanese, Self::Low) => "低",
        }
    }

    /// Strict parse. Accepts the English labels (any case) and the Japanese
    /// labels used by sheets created before the English header.
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "高" => return Some(Self::High),
            "中" => return Some(Self::Medium),
            "低" => return Some(Self::Low),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s))
    }

    /// Lenient parse: anything unrecognised becomes `Medium`.
    pub fn coerce(s: &str) -> Self {
        Self::from_label(s).unwrap_or_default()
    }

    /// Sort rank: High sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Incomplete,
    Complete,
}

impl Status {
    pub fn label(self) -> &'static str {
        self.label_in(Labels::English)
    }

    pub fn label_in(self, labels: Labels) -> &'static str {
        match (labels, self) {
            (Labels::English, Self::Incomplete) => "Incomplete",
            (Labels::English, Self::Complete) => "Complete",
            (Labels::Japanese, Self::Incomplete) => "未完了",
            (Labels::Japanese, Self::Complete) => "完了",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "未完了" => Some(Self::Incomplete),
            "完了" => Some(Self::Complete),
            other if other.eq_ignore_ascii_case("incomplete") => Some(Self::Incomplete),
            other if other.eq_ignore_ascii_case("complete") => Some(Self::Complete),
            _ => None,
        }
    }

    /// Lenient parse: anything unrecognised becomes `Incomplete`.
    pub fn coerce(s: &str) -> Self {
        Self::from_label(s).unwrap_or_default()
    }

    pub fn from_completed(completed: bool) -> Self {
        if completed {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }

    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which column layout a data row is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Legacy,
    Current,
}

impl RowShape {
    /// Classify a row by its cells.
    ///
    /// The sheets API trims trailing empty cells, so a current-layout row can
    /// come back with six or fewer cells. A short row is only read as legacy
    /// when one of its legacy timestamp columns holds a timestamp; anything
    /// else in those cells is a stray priority or status value.
    pub fn detect(cells: &[String]) -> Self {
        if cells.len() > LEGACY_COLUMN_COUNT {
            return Self::Current;
        }
        let has_timestamp = [col::LEGACY_CREATED_AT, col::LEGACY_UPDATED_AT]
            .into_iter()
            .any(|i| cells.get(i).is_some_and(|c| is_timestamp(c)));
        if has_timestamp {
            Self::Legacy
        } else {
            Self::Current
        }
    }
}

fn is_timestamp(cell: &str) -> bool {
    NaiveDateTime::parse_from_str(cell.trim(), TIMESTAMP_FORMAT).is_ok()
}

/// A todo item as stored in one sheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub content: String,
    /// `YYYY-MM-DD`; kept as the raw cell string because out-of-band edits can
    /// leave anything here.
    pub due_date: String,
    pub priority: Priority,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
    /// Set only while `status` is `Complete`.
    pub completed_at: Option<String>,
}

impl Todo {
    /// Normalise a raw row into a record. Returns `None` for non-record rows.
    pub fn from_row(cells: &[String]) -> Option<Self> {
        let id = TodoId::parse_cell(cells.get(col::ID)?)?;
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();

        let todo = match RowShape::detect(cells) {
            RowShape::Legacy => Self {
                id,
                title: cell(col::TITLE),
                content: cell(col::CONTENT),
                due_date: cell(col::DUE_DATE),
                priority: Priority::default(),
                status: Status::default(),
                created_at: cell(col::LEGACY_CREATED_AT),
                updated_at: cell(col::LEGACY_UPDATED_AT),
                completed_at: None,
            },
            RowShape::Current => {
                let status = Status::coerce(&cell(col::STATUS));
                let completed_at = Some(cell(col::COMPLETED_AT))
                    .filter(|c| status.is_complete() && !c.is_empty());
                Self {
                    id,
                    title: cell(col::TITLE),
                    content: cell(col::CONTENT),
                    due_date: cell(col::DUE_DATE),
                    priority: Priority::coerce(&cell(col::PRIORITY)),
                    status,
                    created_at: cell(col::CREATED_AT),
                    updated_at: cell(col::UPDATED_AT),
                    completed_at,
                }
            }
        };
        Some(todo)
    }

    /// Serialise into the current 9-column layout.
    pub fn to_row(&self) -> Vec<String> {
        self.to_row_in(Labels::English)
    }

    /// Like [`Todo::to_row`], writing priority and status in `labels`.
    pub fn to_row_in(&self, labels: Labels) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.content.clone(),
            self.due_date.clone(),
            self.priority.label_in(labels).to_string(),
            self.status.label_in(labels).to_string(),
            self.created_at.clone(),
            self.updated_at.clone(),
            self.completed_at.clone().unwrap_or_default(),
        ]
    }

    pub fn due(&self) -> Option<NaiveDate> {
        parse_due_date(&self.due_date)
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// Rewrite a legacy-shaped row into the current layout, synthesising the
/// columns the legacy layout lacks. Cells beyond the legacy width are dropped.
pub fn migrate_legacy_row(cells: &[String]) -> Vec<String> {
    let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
    vec![
        cell(col::ID),
        cell(col::TITLE),
        cell(col::CONTENT),
        cell(col::DUE_DATE),
        Priority::default().label().to_string(),
        Status::default().label().to_string(),
        cell(col::LEGACY_CREATED_AT),
        cell(col::LEGACY_UPDATED_AT),
        String::new(),
    ]
}

pub fn parse_due_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DUE_DATE_FORMAT).ok()
}

/// Fields accepted when creating a todo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub content: String,
    pub due_date: String,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Full replacement of a todo's editable fields. `None` keeps the stored
/// priority/status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoUpdate {
    pub title: String,
    pub content: String,
    pub due_date: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Trimmed, validated title/content/due date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequiredFields {
    pub title: String,
    pub content: String,
    pub due_date: String,
}

impl RequiredFields {
    pub(crate) fn validate(title: &str, content: &str, due_date: &str) -> Result<Self> {
        let title = require("title", title)?;
        let content = require("content", content)?;
        let due_date = require("due_date", due_date)?;
        if parse_due_date(&due_date).is_none() {
            return Err(StoreError::Validation(format!(
                "due_date must be YYYY-MM-DD, got {due_date:?}"
            )));
        }
        Ok(Self {
            title,
            content,
            due_date,
        })
    }
}

fn require(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn id_cell_must_be_positive_digits() {
        assert_eq!(TodoId::parse_cell("12"), TodoId::new(12));
        assert_eq!(TodoId::parse_cell("0"), None);
        assert_eq!(TodoId::parse_cell(""), None);
        assert_eq!(TodoId::parse_cell("-3"), None);
        assert_eq!(TodoId::parse_cell(" 4"), None);
        assert_eq!(TodoId::parse_cell("ID"), None);
    }

    #[test]
    fn priority_coerces_unknown_to_medium() {
        assert_eq!(Priority::coerce("High"), Priority::High);
        assert_eq!(Priority::coerce("low"), Priority::Low);
        assert_eq!(Priority::coerce("高"), Priority::High);
        assert_eq!(Priority::coerce(""), Priority::Medium);
        assert_eq!(Priority::coerce("urgent"), Priority::Medium);
    }

    #[test]
    fn status_coerces_unknown_to_incomplete() {
        assert_eq!(Status::coerce("Complete"), Status::Complete);
        assert_eq!(Status::coerce("完了"), Status::Complete);
        assert_eq!(Status::coerce("done"), Status::Incomplete);
        assert_eq!(Status::coerce(""), Status::Incomplete);
    }

    #[test]
    fn current_row_roundtrips() {
        let cells = row(&[
            "3",
            "Taxes",
            "file them",
            "2025-04-15",
            "High",
            "Complete",
            "2025-01-01 10:00:00",
            "2025-04-01 12:00:00",
            "2025-04-01 12:00:00",
        ]);
        let todo = Todo::from_row(&cells).unwrap();
        assert_eq!(todo.priority, Priority::High);
        assert_eq!(todo.status, Status::Complete);
        assert_eq!(todo.completed_at.as_deref(), Some("2025-04-01 12:00:00"));
        assert_eq!(todo.to_row(), cells);
    }

    #[test]
    fn legacy_row_reads_timestamps_positionally() {
        let cells = row(&[
            "1",
            "A",
            "b",
            "2025-01-01",
            "2024-01-01 00:00:00",
            "2024-01-02 00:00:00",
        ]);
        assert_eq!(RowShape::detect(&cells), RowShape::Legacy);

        let todo = Todo::from_row(&cells).unwrap();
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.status, Status::Incomplete);
        assert_eq!(todo.created_at, "2024-01-01 00:00:00");
        assert_eq!(todo.updated_at, "2024-01-02 00:00:00");
        assert_eq!(todo.completed_at, None);
    }

    #[test]
    fn trimmed_current_row_is_not_mistaken_for_legacy() {
        let cells = row(&["5", "t", "c", "2025-02-02", "", "Incomplete"]);
        assert_eq!(RowShape::detect(&cells), RowShape::Current);

        let cells = row(&["5", "t", "c", "2025-02-02", "Low"]);
        let todo = Todo::from_row(&cells).unwrap();
        assert_eq!(todo.priority, Priority::Low);
        assert_eq!(todo.created_at, "");
    }

    #[test]
    fn unknown_priority_in_short_row_is_not_a_timestamp() {
        let cells = row(&["5", "t", "c", "2025-06-12", "urgent"]);
        assert_eq!(RowShape::detect(&cells), RowShape::Current);

        let todo = Todo::from_row(&cells).unwrap();
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.status, Status::Incomplete);
        assert_eq!(todo.created_at, "");

        let cells = row(&["5", "t", "c", "2025-06-12", "urgent", "done"]);
        assert_eq!(RowShape::detect(&cells), RowShape::Current);
    }

    #[test]
    fn legacy_row_with_only_updated_at_is_legacy() {
        let cells = row(&["1", "A", "b", "2025-01-01", "", "2024-01-02 00:00:00"]);
        assert_eq!(RowShape::detect(&cells), RowShape::Legacy);
    }

    #[test]
    fn japanese_labels_roundtrip() {
        for p in Priority::ALL {
            assert_eq!(Priority::from_label(p.label_in(Labels::Japanese)), Some(p));
        }
        for st in [Status::Incomplete, Status::Complete] {
            assert_eq!(Status::from_label(st.label_in(Labels::Japanese)), Some(st));
        }

        let cells = row(&["2", "t", "c", "2025-06-12", "高", "完了", "a", "b", "c"]);
        let todo = Todo::from_row(&cells).unwrap();
        assert_eq!(todo.to_row_in(Labels::Japanese), cells);
        assert_eq!(todo.to_row()[4], "High");
    }

    #[test]
    fn id_after_highest() {
        assert_eq!(TodoId::after(0).unwrap(), TodoId::new(1).unwrap());
        assert_eq!(TodoId::after(41).unwrap(), TodoId::new(42).unwrap());
        assert!(matches!(TodoId::after(u64::MAX), Err(StoreError::Backend(_))));
    }

    #[test]
    fn missing_trailing_cells_take_defaults() {
        let todo = Todo::from_row(&row(&["7", "only title"])).unwrap();
        assert_eq!(todo.content, "");
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.status, Status::Incomplete);
    }

    #[test]
    fn completed_at_dropped_while_incomplete() {
        let cells = row(&[
            "2",
            "t",
            "c",
            "2025-01-01",
            "Low",
            "Incomplete",
            "x",
            "y",
            "2025-01-01 00:00:00",
        ]);
        assert_eq!(Todo::from_row(&cells).unwrap().completed_at, None);
    }

    #[test]
    fn non_record_rows_are_skipped() {
        assert!(Todo::from_row(&[]).is_none());
        assert!(Todo::from_row(&row(&["", "orphan"])).is_none());
        assert!(Todo::from_row(&row(&["ID", "Title"])).is_none());
    }

    #[test]
    fn migrate_synthesises_new_columns() {
        let cells = row(&[
            "1",
            "A",
            "b",
            "2025-01-01",
            "2024-01-01 00:00:00",
            "2024-01-02 00:00:00",
        ]);
        assert_eq!(
            migrate_legacy_row(&cells),
            row(&[
                "1",
                "A",
                "b",
                "2025-01-01",
                "Medium",
                "Incomplete",
                "2024-01-01 00:00:00",
                "2024-01-02 00:00:00",
                "",
            ])
        );
    }

    #[test]
    fn required_fields_are_trimmed_and_checked() {
        let ok = RequiredFields::validate(" t ", "c", "2025-06-01").unwrap();
        assert_eq!(ok.title, "t");

        let err = RequiredFields::validate("t", "  ", "2025-06-01").unwrap_err();
        assert!(err.is_validation());

        let err = RequiredFields::validate("t", "c", "June 1st").unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }
}
