//! One-directional todo-to-calendar reconciliation.
//!
//! One `reconcile` call per todo mutation, after the local change is
//! durably applied. The engine decides whether a remote action is needed,
//! performs at most one, and reports the result as a [`SyncOutcome`] value.
//! Remote failures never roll back or block the local mutation.

use chrono::Utc;

use crate::error::OAuthError;
use crate::integrations::oauth::{self, OAuthConfig};
use crate::storage::grants::{Grant, GrantStore};
use crate::sync::calendar_client::CalendarApi;
use crate::sync::types::{EventSpec, SkipReason, SyncErrorKind, SyncOutcome};
use crate::todo::Todo;

/// The sync engine. One instance per request scope; holds no mutable state,
/// so concurrent engines for different todos need no coordination. Callers
/// must serialize mutations of a single todo.
pub struct SyncEngine<C, G> {
    calendar: C,
    grants: G,
    oauth: OAuthConfig,
    time_zone: String,
}

impl<C: CalendarApi, G: GrantStore> SyncEngine<C, G> {
    pub fn new(calendar: C, grants: G, oauth: OAuthConfig, time_zone: impl Into<String>) -> Self {
        Self {
            calendar,
            grants,
            oauth,
            time_zone: time_zone.into(),
        }
    }

    /// Reconcile one todo mutation against the remote calendar.
    ///
    /// `previous = None` means the todo was just created; `next = None`
    /// means it was deleted. The first matching rule wins:
    ///
    /// 1. no grant: skip, nothing is called
    /// 2. deletion with a live remote event: delete it
    /// 3. reminder cleared with a live remote event: delete it
    /// 4. reminder present, no remote event: create one
    /// 5. reminder present, remote event, calendar fields changed: patch it
    /// 6. otherwise: skip
    ///
    /// A `NotFound` answer to a delete or patch means the remote event is
    /// already gone; that is reported as `Skipped(AlreadyAbsent)`, never as
    /// a failure.
    pub async fn reconcile(
        &self,
        previous: Option<&Todo>,
        next: Option<&Todo>,
        grant: Option<Grant>,
    ) -> SyncOutcome {
        let Some(grant) = grant else {
            tracing::debug!("skipping sync: no calendar authorization");
            return SyncOutcome::Skipped(SkipReason::NoAuthorization);
        };

        let Some(plan) = plan(previous, next) else {
            return SyncOutcome::Skipped(SkipReason::NoOp);
        };

        let grant = match self.ensure_fresh(grant).await {
            Ok(grant) => grant,
            Err(outcome) => return outcome,
        };
        let token = grant.access_token.as_str();

        match plan {
            Plan::Delete { event_id } => match self.calendar.delete_event(token, event_id).await {
                Ok(()) => SyncOutcome::Deleted,
                Err(e) if e.kind == SyncErrorKind::NotFound => {
                    tracing::debug!(event_id, "remote event already gone");
                    SyncOutcome::Skipped(SkipReason::AlreadyAbsent)
                }
                Err(e) => {
                    tracing::warn!(event_id, error = %e, "remote delete failed");
                    SyncOutcome::Failed(e.kind)
                }
            },
            Plan::Create(todo) => {
                let Some(spec) = EventSpec::from_todo(todo, &self.time_zone) else {
                    return SyncOutcome::Skipped(SkipReason::NoOp);
                };
                match self.calendar.create_event(token, &spec).await {
                    Ok(event_id) => SyncOutcome::Created(event_id),
                    Err(e) => {
                        tracing::warn!(todo_id = %todo.id, error = %e, "remote create failed");
                        SyncOutcome::Failed(e.kind)
                    }
                }
            }
            Plan::Update { event_id, todo } => {
                let Some(spec) = EventSpec::from_todo(todo, &self.time_zone) else {
                    return SyncOutcome::Skipped(SkipReason::NoOp);
                };
                match self.calendar.update_event(token, event_id, &spec).await {
                    Ok(()) => SyncOutcome::Updated,
                    Err(e) if e.kind == SyncErrorKind::NotFound => {
                        tracing::debug!(event_id, "remote event already gone");
                        SyncOutcome::Skipped(SkipReason::AlreadyAbsent)
                    }
                    Err(e) => {
                        tracing::warn!(event_id, error = %e, "remote patch failed");
                        SyncOutcome::Failed(e.kind)
                    }
                }
            }
        }
    }

    /// Return a grant with a usable access token, refreshing and persisting
    /// it first if expired. Runs before any calendar call.
    async fn ensure_fresh(&self, grant: Grant) -> Result<Grant, SyncOutcome> {
        if !grant.is_expired(Utc::now()) {
            return Ok(grant);
        }

        let Some(refresh_token) = grant.refresh_token.clone() else {
            tracing::warn!(user_id = %grant.user_id, "access token expired, no refresh token stored");
            return Err(SyncOutcome::Failed(SyncErrorKind::Unauthorized));
        };

        tracing::debug!(user_id = %grant.user_id, "refreshing expired access token");
        match oauth::refresh_access_token(&self.oauth, &refresh_token).await {
            Ok(tokens) => {
                let refreshed = grant.refreshed(&tokens, Utc::now());
                if let Err(e) = self.grants.save_grant(&refreshed) {
                    tracing::warn!(user_id = %refreshed.user_id, error = %e, "failed to persist refreshed grant");
                    return Err(SyncOutcome::Failed(SyncErrorKind::Transient));
                }
                Ok(refreshed)
            }
            Err(OAuthError::Network(e)) => {
                tracing::warn!(error = %e, "token endpoint unreachable");
                Err(SyncOutcome::Failed(SyncErrorKind::Transient))
            }
            Err(e) => {
                // Rejected refresh token means the grant is revoked.
                tracing::warn!(user_id = %grant.user_id, error = %e, "token refresh rejected");
                Err(SyncOutcome::Failed(SyncErrorKind::Unauthorized))
            }
        }
    }
}

enum Plan<'a> {
    Create(&'a Todo),
    Update { event_id: &'a str, todo: &'a Todo },
    Delete { event_id: &'a str },
}

/// Evaluate the decision table. `None` means no remote action is needed.
fn plan<'a>(previous: Option<&'a Todo>, next: Option<&'a Todo>) -> Option<Plan<'a>> {
    match next {
        // Tombstone: the remote reference lives on the pre-image.
        None => previous
            .and_then(|p| p.remote_event_id.as_deref())
            .map(|event_id| Plan::Delete { event_id }),
        Some(next) => match (next.reminder_at, next.remote_event_id.as_deref()) {
            (None, Some(event_id)) => Some(Plan::Delete { event_id }),
            (Some(_), None) => Some(Plan::Create(next)),
            (Some(_), Some(event_id)) if calendar_fields_changed(previous, next) => {
                Some(Plan::Update {
                    event_id,
                    todo: next,
                })
            }
            _ => None,
        },
    }
}

/// Whether any field pushed to the calendar differs between the snapshots.
/// The completion flag is not mirrored, so toggling it alone syncs nothing.
fn calendar_fields_changed(previous: Option<&Todo>, next: &Todo) -> bool {
    match previous {
        Some(p) => {
            p.title != next.title
                || p.description != next.description
                || p.reminder_at != next.reminder_at
        }
        None => true,
    }
}
