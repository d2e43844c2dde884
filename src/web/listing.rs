//! Filtering and ordering for the todo list endpoint.

use serde::Deserialize;

use crate::todo::{Status, Todo};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(Status),
}

impl StatusFilter {
    /// `None` for a value that is neither `all` nor a status label.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("") => Some(Self::All),
            Some(v) if v.eq_ignore_ascii_case("all") => Some(Self::All),
            Some(v) => Status::from_label(v).map(Self::Only),
        }
    }

    fn admits(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => todo.status == status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Sheet order.
    #[default]
    Default,
    Priority,
    DueDate,
    PriorityDue,
}

impl SortKey {
    /// Unknown keys fall back to sheet order.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("priority") => Self::Priority,
            Some("due_date") => Self::DueDate,
            Some("priority_due") => Self::PriorityDue,
            _ => Self::Default,
        }
    }
}

/// Empty due dates sort after every real one.
fn due_key(todo: &Todo) -> (bool, &str) {
    (todo.due_date.is_empty(), todo.due_date.as_str())
}

/// Filter then stable-sort.
pub fn apply(todos: Vec<Todo>, filter: StatusFilter, sort: SortKey) -> Vec<Todo> {
    let mut todos: Vec<Todo> = todos.into_iter().filter(|t| filter.admits(t)).collect();
    match sort {
        SortKey::Default => {}
        SortKey::Priority => todos.sort_by_key(|t| t.priority.rank()),
        SortKey::DueDate => todos.sort_by(|a, b| due_key(a).cmp(&due_key(b))),
        SortKey::PriorityDue => todos.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then_with(|| due_key(a).cmp(&due_key(b)))
        }),
    }
    todos
}
