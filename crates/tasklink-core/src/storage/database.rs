//! SQLite-based todo and grant storage.
//!
//! Provides persistent storage for:
//! - Todo records, keyed by id and scoped to an owner
//! - Calendar authorization grants, one row per user
//!
//! The sync engine treats this store as two collaborators: the todo store
//! it reads pre-images from and writes post-images back to, and the grant
//! store it persists refreshed credentials through.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::data_dir;
use super::grants::{Grant, GrantStore};
use crate::error::{CoreError, DatabaseError};
use crate::sync::{SkipReason, SyncOutcome};
use crate::todo::{Todo, TodoDraft, TodoPatch};

/// SQLite database for todos and authorization grants.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/tasklink/tasklink.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()
            .map_err(|e| CoreError::Custom(e.to_string()))?
            .join("tasklink.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS todos (
                    id              TEXT PRIMARY KEY,
                    user_id         TEXT NOT NULL,
                    title           TEXT NOT NULL,
                    description     TEXT,
                    reminder_at     TEXT,
                    completed       INTEGER NOT NULL DEFAULT 0,
                    remote_event_id TEXT,
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS grants (
                    user_id       TEXT PRIMARY KEY,
                    access_token  TEXT NOT NULL,
                    refresh_token TEXT,
                    expires_at    TEXT,
                    scopes        TEXT NOT NULL DEFAULT '',
                    updated_at    TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_todos_user_id ON todos(user_id);
                CREATE INDEX IF NOT EXISTS idx_todos_user_created ON todos(user_id, created_at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert a new todo for the given owner.
    ///
    /// # Errors
    /// Returns an error if the draft is invalid or the insert fails.
    pub fn insert_todo(&self, user_id: &str, draft: TodoDraft) -> Result<Todo, CoreError> {
        draft.validate()?;
        let todo = draft.into_todo(user_id, Utc::now());
        self.conn
            .execute(
                "INSERT INTO todos (id, user_id, title, description, reminder_at, completed,
                                    remote_event_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    todo.id,
                    todo.user_id,
                    todo.title,
                    todo.description,
                    todo.reminder_at.map(|t| t.to_rfc3339()),
                    todo.completed,
                    todo.remote_event_id,
                    todo.created_at.to_rfc3339(),
                    todo.updated_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(todo)
    }

    /// Fetch a todo by id, scoped to its owner.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn get_todo(&self, user_id: &str, id: &str) -> Result<Option<Todo>, DatabaseError> {
        self.conn
            .query_row(
                "SELECT id, user_id, title, description, reminder_at, completed,
                        remote_event_id, created_at, updated_at
                 FROM todos WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                row_to_todo,
            )
            .optional()
            .map_err(DatabaseError::from)
    }

    /// List all todos of an owner, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn list_todos(&self, user_id: &str) -> Result<Vec<Todo>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, description, reminder_at, completed,
                    remote_event_id, created_at, updated_at
             FROM todos WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_todo)?;
        let mut todos = Vec::new();
        for row in rows {
            todos.push(row?);
        }
        Ok(todos)
    }

    /// Apply a partial update, returning the new state.
    ///
    /// Returns `Ok(None)` if the todo does not exist. The remote event id is
    /// never written here; only [`apply_sync_outcome`](Self::apply_sync_outcome)
    /// touches it.
    ///
    /// # Errors
    /// Returns an error if the patch is invalid or the write fails.
    pub fn update_todo(
        &self,
        user_id: &str,
        id: &str,
        patch: &TodoPatch,
    ) -> Result<Option<Todo>, CoreError> {
        let Some(mut todo) = self.get_todo(user_id, id)? else {
            return Ok(None);
        };
        patch.apply_to(&mut todo, Utc::now())?;
        self.conn
            .execute(
                "UPDATE todos SET title = ?1, description = ?2, reminder_at = ?3,
                                  completed = ?4, updated_at = ?5
                 WHERE id = ?6 AND user_id = ?7",
                params![
                    todo.title,
                    todo.description,
                    todo.reminder_at.map(|t| t.to_rfc3339()),
                    todo.completed,
                    todo.updated_at.to_rfc3339(),
                    todo.id,
                    todo.user_id,
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(Some(todo))
    }

    /// Delete a todo, returning its pre-image for the reconcile call.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn delete_todo(&self, user_id: &str, id: &str) -> Result<Option<Todo>, DatabaseError> {
        let Some(todo) = self.get_todo(user_id, id)? else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM todos WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(Some(todo))
    }

    /// Best-effort follow-up write of a reconcile outcome onto the todo row.
    ///
    /// `Created` stores the returned remote reference; `Deleted` and
    /// `Skipped(AlreadyAbsent)` clear it; every other outcome leaves the row
    /// unchanged. Writing against a row the mutation already removed is a
    /// no-op.
    ///
    /// # Errors
    /// Returns an error if the write fails; remote and local state may then
    /// diverge until the next mutation re-triggers a reconcile.
    pub fn apply_sync_outcome(
        &self,
        todo_id: &str,
        outcome: &SyncOutcome,
    ) -> Result<(), DatabaseError> {
        match outcome {
            SyncOutcome::Created(remote_id) => {
                self.conn.execute(
                    "UPDATE todos SET remote_event_id = ?1 WHERE id = ?2",
                    params![remote_id, todo_id],
                )?;
            }
            SyncOutcome::Deleted | SyncOutcome::Skipped(SkipReason::AlreadyAbsent) => {
                self.conn.execute(
                    "UPDATE todos SET remote_event_id = NULL WHERE id = ?1",
                    params![todo_id],
                )?;
            }
            SyncOutcome::Updated | SyncOutcome::Skipped(_) | SyncOutcome::Failed(_) => {}
        }
        Ok(())
    }

    /// Fetch the grant for a user, if the calendar account is linked.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn get_grant(&self, user_id: &str) -> Result<Option<Grant>, DatabaseError> {
        self.conn
            .query_row(
                "SELECT user_id, access_token, refresh_token, expires_at, scopes, updated_at
                 FROM grants WHERE user_id = ?1",
                params![user_id],
                row_to_grant,
            )
            .optional()
            .map_err(DatabaseError::from)
    }

    /// Remove a user's grant. Live remote events are left untouched.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn delete_grant(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM grants WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }
}

impl GrantStore for Database {
    fn save_grant(&self, grant: &Grant) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO grants
                 (user_id, access_token, refresh_token, expires_at, scopes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                grant.user_id,
                grant.access_token,
                grant.refresh_token,
                grant.expires_at.map(|t| t.to_rfc3339()),
                grant.scopes.join(" "),
                grant.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn row_to_todo(row: &rusqlite::Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        reminder_at: parse_opt_ts(row, 4)?,
        completed: row.get(5)?,
        remote_event_id: row.get(6)?,
        created_at: parse_ts(row, 7)?,
        updated_at: parse_ts(row, 8)?,
    })
}

fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Grant> {
    let scopes: String = row.get(4)?;
    Ok(Grant {
        user_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        expires_at: parse_opt_ts(row, 3)?,
        scopes: scopes.split_whitespace().map(str::to_string).collect(),
        updated_at: parse_ts(row, 5)?,
    })
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        Some(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncErrorKind;
    use chrono::TimeZone;

    fn draft(title: &str, reminder: Option<DateTime<Utc>>) -> TodoDraft {
        TodoDraft {
            title: title.to_string(),
            description: None,
            reminder_at: reminder,
        }
    }

    fn reminder() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", Some(reminder()))).unwrap();
        let fetched = db.get_todo("u1", &todo.id).unwrap().unwrap();
        assert_eq!(fetched, todo);
        assert_eq!(fetched.reminder_at, Some(reminder()));
    }

    #[test]
    fn insert_rejects_empty_title() {
        let db = Database::open_memory().unwrap();
        assert!(db.insert_todo("u1", draft("  ", None)).is_err());
    }

    #[test]
    fn get_is_scoped_to_owner() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", None)).unwrap();
        assert!(db.get_todo("u2", &todo.id).unwrap().is_none());
    }

    #[test]
    fn list_orders_by_creation() {
        let db = Database::open_memory().unwrap();
        let a = db.insert_todo("u1", draft("first", None)).unwrap();
        let b = db.insert_todo("u1", draft("second", None)).unwrap();
        db.insert_todo("u2", draft("other user", None)).unwrap();
        let ids: Vec<String> = db
            .list_todos("u1")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn update_patch_clears_reminder() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", Some(reminder()))).unwrap();
        let patch = TodoPatch {
            reminder_at: Some(None),
            ..Default::default()
        };
        let updated = db.update_todo("u1", &todo.id, &patch).unwrap().unwrap();
        assert!(updated.reminder_at.is_none());
        let fetched = db.get_todo("u1", &todo.id).unwrap().unwrap();
        assert!(fetched.reminder_at.is_none());
    }

    #[test]
    fn update_missing_todo_returns_none() {
        let db = Database::open_memory().unwrap();
        let patch = TodoPatch {
            completed: Some(true),
            ..Default::default()
        };
        assert!(db.update_todo("u1", "nope", &patch).unwrap().is_none());
    }

    #[test]
    fn delete_returns_pre_image() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", Some(reminder()))).unwrap();
        let gone = db.delete_todo("u1", &todo.id).unwrap().unwrap();
        assert_eq!(gone.id, todo.id);
        assert!(db.get_todo("u1", &todo.id).unwrap().is_none());
    }

    #[test]
    fn outcome_created_stores_reference_and_deleted_clears_it() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", Some(reminder()))).unwrap();

        db.apply_sync_outcome(&todo.id, &SyncOutcome::Created("evt-1".to_string()))
            .unwrap();
        let t = db.get_todo("u1", &todo.id).unwrap().unwrap();
        assert_eq!(t.remote_event_id.as_deref(), Some("evt-1"));

        db.apply_sync_outcome(&todo.id, &SyncOutcome::Deleted).unwrap();
        let t = db.get_todo("u1", &todo.id).unwrap().unwrap();
        assert!(t.remote_event_id.is_none());
    }

    #[test]
    fn outcome_already_absent_clears_reference() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", Some(reminder()))).unwrap();
        db.apply_sync_outcome(&todo.id, &SyncOutcome::Created("evt-1".to_string()))
            .unwrap();
        db.apply_sync_outcome(&todo.id, &SyncOutcome::Skipped(SkipReason::AlreadyAbsent))
            .unwrap();
        let t = db.get_todo("u1", &todo.id).unwrap().unwrap();
        assert!(t.remote_event_id.is_none());
    }

    #[test]
    fn outcome_failed_leaves_reference_untouched() {
        let db = Database::open_memory().unwrap();
        let todo = db.insert_todo("u1", draft("Pay rent", Some(reminder()))).unwrap();
        db.apply_sync_outcome(&todo.id, &SyncOutcome::Created("evt-1".to_string()))
            .unwrap();
        db.apply_sync_outcome(&todo.id, &SyncOutcome::Failed(SyncErrorKind::Transient))
            .unwrap();
        let t = db.get_todo("u1", &todo.id).unwrap().unwrap();
        assert_eq!(t.remote_event_id.as_deref(), Some("evt-1"));
    }

    #[test]
    fn open_at_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasklink.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.insert_todo("u1", draft("persisted", None)).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.list_todos("u1").unwrap().len(), 1);
    }

    #[test]
    fn grant_save_is_whole_row_replace() {
        let db = Database::open_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let grant = Grant {
            user_id: "u1".to_string(),
            access_token: "tok-1".to_string(),
            refresh_token: Some("ref-1".to_string()),
            expires_at: Some(now),
            scopes: vec!["scope-a".to_string(), "scope-b".to_string()],
            updated_at: now,
        };
        db.save_grant(&grant).unwrap();
        assert_eq!(db.get_grant("u1").unwrap().unwrap(), grant);

        let replaced = Grant {
            access_token: "tok-2".to_string(),
            refresh_token: None,
            ..grant.clone()
        };
        db.save_grant(&replaced).unwrap();
        let fetched = db.get_grant("u1").unwrap().unwrap();
        assert_eq!(fetched.access_token, "tok-2");
        assert!(fetched.refresh_token.is_none());
    }

    #[test]
    fn delete_grant_unlinks_user() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let grant = Grant {
            user_id: "u1".to_string(),
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
            updated_at: now,
        };
        db.save_grant(&grant).unwrap();
        db.delete_grant("u1").unwrap();
        assert!(db.get_grant("u1").unwrap().is_none());
    }
}
