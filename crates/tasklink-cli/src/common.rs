//! Shared helpers for CLI commands: app context, reminder parsing, and the
//! reconcile-after-mutation step every todo command runs.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::time::Duration;

use tasklink_core::{
    Config, Database, GoogleCalendarClient, OAuthConfig, SyncEngine, SyncErrorKind, SyncOutcome,
    Todo,
};

pub struct AppContext {
    pub config: Config,
    pub db: Database,
}

pub fn context() -> Result<AppContext, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    Ok(AppContext { config, db })
}

/// Parse a reminder time: RFC 3339, or "YYYY-MM-DD HH:MM" in local time.
pub fn parse_reminder(input: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M").map_err(|_| {
        format!("invalid reminder time '{input}': expected RFC 3339 or \"YYYY-MM-DD HH:MM\"")
    })?;
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        _ => Err(format!("ambiguous local time '{input}'").into()),
    }
}

/// Reconcile one todo mutation and persist the outcome's remote reference.
///
/// A sync failure never fails the command; the local mutation already stands
/// and a warning is printed instead.
pub async fn sync_mutation(
    ctx: &AppContext,
    previous: Option<&Todo>,
    next: Option<&Todo>,
    todo_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = &ctx.config.account.user;
    let grant = ctx.db.get_grant(user)?;

    let calendar = GoogleCalendarClient::new(Duration::from_secs(
        ctx.config.calendar.request_timeout_secs,
    ))?;
    let oauth = OAuthConfig::google(ctx.config.oauth.redirect_port);
    let engine = SyncEngine::new(calendar, &ctx.db, oauth, ctx.config.calendar.time_zone.clone());

    let outcome = engine.reconcile(previous, next, grant).await;
    ctx.db.apply_sync_outcome(todo_id, &outcome)?;
    report(&outcome);
    Ok(())
}

fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Created(_) => println!("calendar: event created"),
        SyncOutcome::Updated => println!("calendar: event updated"),
        SyncOutcome::Deleted => println!("calendar: event removed"),
        SyncOutcome::Skipped(_) => {}
        SyncOutcome::Failed(SyncErrorKind::Unauthorized) => {
            eprintln!(
                "warning: calendar sync failed (unauthorized); run `tasklink auth connect` to re-link your account"
            );
        }
        SyncOutcome::Failed(kind) => {
            eprintln!(
                "warning: calendar sync failed ({kind}); the change is saved locally and will sync on the next edit"
            );
        }
    }
}

/// Format a reminder for display in local time.
pub fn format_reminder(todo: &Todo) -> String {
    todo.reminder_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
