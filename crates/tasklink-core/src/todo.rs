//! Todo record types.
//!
//! A todo is a user-owned task record, optionally time-bound by a reminder.
//! When a reminder is present and the owner has linked a calendar account,
//! the sync engine mirrors the todo onto the remote calendar and stores the
//! resulting event id in `remote_event_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// A user-owned task record.
///
/// `remote_event_id` is present exactly when a live remote calendar event
/// mirrors this todo. Local mutations never write that field directly; it is
/// only updated from a [`SyncOutcome`](crate::sync::SyncOutcome) after a
/// reconcile call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    /// When set, the todo is mirrored as a remote calendar event.
    pub reminder_at: Option<DateTime<Utc>>,
    pub completed: bool,
    /// Opaque id of the mirrored remote event, if one exists.
    pub remote_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for a new todo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoDraft {
    pub title: String,
    pub description: Option<String>,
    pub reminder_at: Option<DateTime<Utc>>,
}

impl TodoDraft {
    /// Check the draft before insertion.
    ///
    /// # Errors
    /// Returns an error if the title is empty or whitespace-only.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".to_string(),
                message: "title must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Materialize the draft into a full record for the given owner.
    pub fn into_todo(self, user_id: &str, now: DateTime<Utc>) -> Todo {
        Todo {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: self.title,
            description: self.description,
            reminder_at: self.reminder_at,
            completed: false,
            remote_event_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a todo.
///
/// Clearable fields use `Option<Option<T>>`: the outer `None` leaves the
/// field untouched, `Some(None)` clears it. Clearing `reminder_at` is what
/// triggers deletion of the mirrored remote event on the next reconcile.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub reminder_at: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Is this patch empty, meaning no fields are set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.reminder_at.is_none()
            && self.completed.is_none()
    }

    /// Applies the patch to a todo in place, bumping `updated_at`.
    ///
    /// # Errors
    /// Returns an error if the patch would leave the title empty.
    pub fn apply_to(&self, todo: &mut Todo, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "title".to_string(),
                    message: "title must not be empty".to_string(),
                });
            }
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = description.clone();
        }
        if let Some(reminder_at) = self.reminder_at {
            todo.reminder_at = reminder_at;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        todo.updated_at = now;
        Ok(())
    }
}
