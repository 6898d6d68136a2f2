//! Task CRUD, filtering and ownership checks.

use super::{Database, now_ms};
use crate::error::{StoreError, StoreResult};
use crate::types::{Task, TaskQuery, TaskStatus, TaskUpdate, from_millis};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, user_id, title, description, status, tags, created_at, updated_at";

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// =============================================================================
// Junction table helpers for tag management
// =============================================================================

/// Replace the stored tag sequence of a task, keeping the given order.
fn sync_task_tags(conn: &Connection, task_id: &str, tags: &[String]) -> StoreResult<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    for (position, tag) in tags.iter().enumerate() {
        conn.execute(
            "INSERT INTO task_tags (task_id, position, tag) VALUES (?1, ?2, ?3)",
            params![task_id, position as i64, tag],
        )?;
    }
    Ok(())
}

fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let tags_json: String = row.get("tags")?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        tags,
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
    })
}

/// Internal helper to get a live task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> StoreResult<Option<Task>> {
    let task = conn
        .query_row(
            &format!(
                "SELECT {} FROM tasks WHERE id = ?1 AND deleted_at IS NULL",
                TASK_COLUMNS
            ),
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

/// Fetch a live task and verify `user_id` owns it.
fn get_owned_task_internal(conn: &Connection, task_id: &str, user_id: &str) -> StoreResult<Task> {
    let task = get_task_internal(conn, task_id)?
        .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
    ensure_owner(&task, user_id)?;
    Ok(task)
}

/// Fail with `Forbidden` unless `user_id` owns `task`.
pub fn ensure_owner(task: &Task, user_id: &str) -> StoreResult<()> {
    if task.user_id != user_id {
        return Err(StoreError::Forbidden {
            task_id: task.id.clone(),
            user_id: user_id.to_string(),
        });
    }
    Ok(())
}

fn validate_title(title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        return Err(StoreError::EmptyTitle);
    }
    Ok(())
}

/// Build the list query for a user. Every parameter is text, bound in order.
fn build_list_query(user_id: &str, query: &TaskQuery) -> (String, Vec<String>) {
    let mut sql = format!(
        "SELECT {} FROM tasks WHERE user_id = ?1 AND deleted_at IS NULL",
        TASK_COLUMNS
    );
    let mut values = vec![user_id.to_string()];

    if let Some(status) = query.status {
        values.push(status.as_str().to_string());
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }

    // Each tag must match independently (AND)
    for tag in &query.tags {
        values.push(tag.clone());
        sql.push_str(&format!(
            " AND id IN (SELECT task_id FROM task_tags WHERE tag = ?{})",
            values.len()
        ));
    }

    // rowid keeps insertion order for tasks created in the same millisecond
    sql.push_str(" ORDER BY created_at ASC, rowid ASC");
    (sql, values)
}

impl Database {
    /// List a user's live tasks, oldest first.
    pub fn list_tasks(&self, user_id: &str, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let (sql, values) = build_list_query(user_id, query);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(values.iter()), parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Get a live task by ID. Ownership is not checked here.
    pub fn get_task(&self, task_id: &str) -> StoreResult<Task> {
        self.with_conn(|conn| {
            get_task_internal(conn, task_id)?
                .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
        })
    }

    /// Create a task for `user_id` with status `待办`.
    ///
    /// The title is stored verbatim but must contain something other than
    /// whitespace. An empty description is stored as absent.
    pub fn create_task(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> StoreResult<Task> {
        validate_title(&title)?;

        let task_id = Uuid::now_v7().to_string();
        let now = now_ms();
        let status = TaskStatus::default();
        let description = description.filter(|d| !d.is_empty());
        let tags_json = serde_json::to_string(&tags)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO tasks (id, user_id, title, description, status, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![&task_id, user_id, &title, &description, status, tags_json, now],
            )?;
            sync_task_tags(&tx, &task_id, &tags)?;

            tx.commit()?;

            tracing::info!(task_id = %task_id, user_id = %user_id, "Created task");

            Ok(Task {
                id: task_id,
                user_id: user_id.to_string(),
                title,
                description,
                status,
                tags,
                created_at: from_millis(now),
                updated_at: from_millis(now),
            })
        })
    }

    /// Apply a partial update to a task owned by `user_id`.
    ///
    /// Only the fields present in `update` change; `updated_at` always moves.
    /// Existence and ownership are checked before the new values.
    /// Returns the task as persisted.
    pub fn update_task(&self, task_id: &str, user_id: &str, update: TaskUpdate) -> StoreResult<Task> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = get_owned_task_internal(&tx, task_id, user_id)?;
            if let Some(title) = &update.title {
                validate_title(title)?;
            }

            let new_title = update.title.unwrap_or(task.title);
            let new_description = match update.description {
                Some(description) => description.filter(|d| !d.is_empty()),
                None => task.description,
            };
            let new_status = update.status.unwrap_or(task.status);
            let new_tags = update.tags.unwrap_or(task.tags);
            let tags_json = serde_json::to_string(&new_tags)?;

            tx.execute(
                "UPDATE tasks SET title = ?1, description = ?2, status = ?3, tags = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![new_title, new_description, new_status, tags_json, now, task_id],
            )?;
            sync_task_tags(&tx, task_id, &new_tags)?;

            let updated = get_task_internal(&tx, task_id)?
                .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
            tx.commit()?;

            tracing::debug!(task_id = %task_id, status = %updated.status, "Updated task");
            Ok(updated)
        })
    }

    /// Soft-delete a task owned by `user_id`. It disappears from every read.
    pub fn delete_task(&self, task_id: &str, user_id: &str) -> StoreResult<()> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            get_owned_task_internal(&tx, task_id, user_id)?;

            tx.execute(
                "UPDATE tasks SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, task_id],
            )?;
            tx.commit()?;

            tracing::info!(task_id = %task_id, user_id = %user_id, "Deleted task");
            Ok(())
        })
    }
}
