//! Core types for calendar synchronization.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::todo::Todo;

/// Mirrored events span the reminder instant plus this many minutes.
///
/// Reminders are point-in-time alerts, not meetings; the fixed window must
/// match events already created under this scheme.
pub const REMINDER_EVENT_MINUTES: i64 = 30;

/// Result of a single reconcile call.
///
/// The store writer maps this onto the todo row: `Created` stores the
/// returned remote reference, `Deleted` and `Skipped(AlreadyAbsent)` clear
/// it, everything else leaves it unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A remote event was created; carries its opaque reference.
    Created(String),
    /// The existing remote event was patched in place.
    Updated,
    /// The remote event was deleted.
    Deleted,
    /// No remote action was needed.
    Skipped(SkipReason),
    /// The remote action failed; the local mutation stands regardless.
    Failed(SyncErrorKind),
}

impl SyncOutcome {
    /// Whether the caller should surface a non-blocking warning.
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

/// Why a reconcile call made no remote request (or healed itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The owner has not linked a calendar account.
    NoAuthorization,
    /// No calendar-relevant field changed.
    NoOp,
    /// The remote event was already gone; the end state matches intent.
    AlreadyAbsent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoAuthorization => write!(f, "no-authorization"),
            SkipReason::NoOp => write!(f, "no-op"),
            SkipReason::AlreadyAbsent => write!(f, "already-absent"),
        }
    }
}

/// Classified remote failure, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncErrorKind {
    /// Token invalid or expired beyond refresh; prompt re-linking.
    Unauthorized,
    /// The remote reference no longer exists.
    NotFound,
    /// The provider throttled the request; retry with backoff.
    RateLimited,
    /// Network failure, timeout, or 5xx; retry is meaningful.
    Transient,
    /// Any other 4xx; a mapping defect, not worth retrying.
    InvalidRequest,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncErrorKind::Unauthorized => write!(f, "unauthorized"),
            SyncErrorKind::NotFound => write!(f, "not-found"),
            SyncErrorKind::RateLimited => write!(f, "rate-limited"),
            SyncErrorKind::Transient => write!(f, "transient"),
            SyncErrorKind::InvalidRequest => write!(f, "invalid-request"),
        }
    }
}

/// Error returned by the calendar adapter, already classified.
#[derive(Debug, thiserror::Error)]
#[error("calendar request failed ({kind}): {message}")]
pub struct CalendarApiError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl CalendarApiError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The remote event shape derived from a todo.
///
/// This is the single mapping both the create and the update path go
/// through, so the event window cannot drift between the two call sites.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSpec {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub time_zone: String,
}

impl EventSpec {
    /// Derive the event shape from a todo. Returns `None` for todos without
    /// a reminder; those are never mirrored.
    pub fn from_todo(todo: &Todo, time_zone: &str) -> Option<Self> {
        let start = todo.reminder_at?;
        Some(Self {
            summary: todo.title.clone(),
            description: todo.description.clone(),
            start,
            end: start + Duration::minutes(REMINDER_EVENT_MINUTES),
            time_zone: time_zone.to_string(),
        })
    }
}
