use tracing::{debug, info};

use crate::clock::format_timestamp;
use crate::error::Result;
use crate::sheet::SheetBackend;
use crate::todo::{NewTodo, Priority, RequiredFields, Status, Todo, TodoId, TodoUpdate};

use super::{Store, StoreState};

/// A record together with the 1-based sheet row it was found in.
struct Located {
    row: usize,
    todo: Todo,
}

/// Data rows with their sheet row numbers. Row 1 is the header.
fn data_rows(rows: &[Vec<String>]) -> impl Iterator<Item = (usize, &Vec<String>)> {
    rows.iter().enumerate().skip(1).map(|(idx, cells)| (idx + 1, cells))
}

fn max_id(rows: &[Vec<String>]) -> u64 {
    data_rows(rows)
        .filter_map(|(_, cells)| cells.first().and_then(|c| TodoId::parse_cell(c)))
        .map(TodoId::get)
        .max()
        .unwrap_or(0)
}

fn locate(rows: &[Vec<String>], id: TodoId) -> Option<Located> {
    data_rows(rows).find_map(|(row, cells)| {
        let todo = Todo::from_row(cells)?;
        (todo.id == id).then_some(Located { row, todo })
    })
}

impl<B: SheetBackend + ?Sized> Store<B> {
    /// Read the whole sheet, remembering the highest id seen.
    async fn scan(&self, state: &mut StoreState) -> Result<Vec<Vec<String>>> {
        let rows = self.backend.read_all().await?;
        state.highest_id = state.highest_id.max(max_id(&rows));
        Ok(rows)
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }

    /// The id the next `create` would assign.
    pub async fn next_id(&self) -> Result<TodoId> {
        let mut state = self.state.lock().await;
        self.scan(&mut state).await?;
        TodoId::after(state.highest_id)
    }

    /// All records in sheet order. Rows without a valid id are skipped.
    pub async fn list(&self) -> Result<Vec<Todo>> {
        let mut state = self.state.lock().await;
        let rows = self.scan(&mut state).await?;
        Ok(data_rows(&rows)
            .filter_map(|(_, cells)| Todo::from_row(cells))
            .collect())
    }

    pub async fn get(&self, id: TodoId) -> Result<Option<Todo>> {
        let mut state = self.state.lock().await;
        let rows = self.scan(&mut state).await?;
        Ok(locate(&rows, id).map(|l| l.todo))
    }

    /// Append a new record and return its id.
    pub async fn create(&self, new: NewTodo) -> Result<TodoId> {
        let fields = RequiredFields::validate(&new.title, &new.content, &new.due_date)?;
        let priority = Priority::coerce(new.priority.as_deref().unwrap_or_default());

        let mut state = self.state.lock().await;
        self.scan(&mut state).await?;
        let id = TodoId::after(state.highest_id)?;
        let now = self.now();

        let todo = Todo {
            id,
            title: fields.title,
            content: fields.content,
            due_date: fields.due_date,
            priority,
            status: Status::Incomplete,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };
        self.backend.append_row(&todo.to_row_in(self.labels)).await?;
        state.highest_id = id.get();

        info!("Created todo {id}");
        Ok(id)
    }

    /// Replace a record's editable fields. Returns `false` if no record has `id`.
    pub async fn update(&self, id: TodoId, update: TodoUpdate) -> Result<bool> {
        let fields = RequiredFields::validate(&update.title, &update.content, &update.due_date)?;

        let mut state = self.state.lock().await;
        let rows = self.scan(&mut state).await?;
        let Some(Located { row, todo: existing }) = locate(&rows, id) else {
            debug!("Update of todo {id}: not found");
            return Ok(false);
        };

        let now = self.now();
        let priority = update
            .priority
            .as_deref()
            .map_or(existing.priority, Priority::coerce);
        let status = update
            .status
            .as_deref()
            .map_or(existing.status, Status::coerce);
        let completed_at = match status {
            Status::Complete => existing.completed_at.or_else(|| Some(now.clone())),
            Status::Incomplete => None,
        };

        let todo = Todo {
            id,
            title: fields.title,
            content: fields.content,
            due_date: fields.due_date,
            priority,
            status,
            created_at: existing.created_at,
            updated_at: now,
            completed_at,
        };
        self.backend.write_row(row, &todo.to_row_in(self.labels)).await?;

        info!("Updated todo {id} (row {row})");
        Ok(true)
    }

    /// Mark a record complete or incomplete, leaving its other fields alone.
    /// Returns `false` if no record has `id`.
    pub async fn set_completion(&self, id: TodoId, completed: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let rows = self.scan(&mut state).await?;
        let Some(Located { row, mut todo }) = locate(&rows, id) else {
            debug!("Completion change of todo {id}: not found");
            return Ok(false);
        };

        let now = self.now();
        todo.status = Status::from_completed(completed);
        todo.completed_at = completed.then(|| now.clone());
        todo.updated_at = now;
        self.backend.write_row(row, &todo.to_row_in(self.labels)).await?;

        info!("Marked todo {id} {}", todo.status);
        Ok(true)
    }

    /// Remove a record's row. Returns `false` if no record has `id`.
    pub async fn delete(&self, id: TodoId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let rows = self.scan(&mut state).await?;
        let Some(Located { row, .. }) = locate(&rows, id) else {
            debug!("Delete of todo {id}: not found");
            return Ok(false);
        };

        self.backend.delete_row(row).await?;
        info!("Deleted todo {id} (row {row})");
        Ok(true)
    }
}
