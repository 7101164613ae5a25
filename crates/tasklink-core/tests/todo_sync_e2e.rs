//! End-to-end flow: todo store + sync engine + mocked Google Calendar API.
//!
//! Exercises the full create -> edit -> delete lifecycle the way the CLI
//! drives it: apply the local mutation, reconcile, persist the outcome.

use chrono::{TimeZone, Utc};
use std::time::Duration;

use tasklink_core::{
    Database, GoogleCalendarClient, Grant, GrantStore, OAuthConfig, OAuthTokens, SkipReason,
    SyncEngine, SyncOutcome, TodoDraft, TodoPatch,
};

const USER: &str = "local";

fn engine<'a>(db: &'a Database, base_url: &str) -> SyncEngine<GoogleCalendarClient, &'a Database> {
    let calendar =
        GoogleCalendarClient::with_base_url(base_url, Duration::from_secs(5)).unwrap();
    let oauth = OAuthConfig {
        client_id: "cid".to_string(),
        client_secret: "sec".to_string(),
        auth_url: String::new(),
        token_url: "http://unused.invalid/token".to_string(),
        scopes: Vec::new(),
        redirect_port: 0,
    };
    SyncEngine::new(calendar, db, oauth, "UTC")
}

fn link_calendar(db: &Database) {
    let tokens = OAuthTokens {
        access_token: "live-token".to_string(),
        refresh_token: Some("refresh-token".to_string()),
        expires_at: None,
        token_type: "Bearer".to_string(),
        scope: None,
    };
    db.save_grant(&Grant::from_tokens(USER, &tokens, Utc::now()))
        .unwrap();
}

#[tokio::test]
async fn full_lifecycle_mirrors_the_todo_onto_the_calendar() {
    let mut server = mockito::Server::new_async().await;
    let create_mock = server
        .mock("POST", "/calendars/primary/events")
        .with_status(200)
        .with_body(r#"{"id": "evt-100"}"#)
        .expect(1)
        .create_async()
        .await;
    let patch_mock = server
        .mock("PATCH", "/calendars/primary/events/evt-100")
        .with_status(200)
        .with_body(r#"{"id": "evt-100"}"#)
        .expect(1)
        .create_async()
        .await;
    let delete_mock = server
        .mock("DELETE", "/calendars/primary/events/evt-100")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let db = Database::open_memory().unwrap();
    link_calendar(&db);
    let engine = engine(&db, &server.url());

    // Create: the returned reference lands on the row.
    let created = db
        .insert_todo(
            USER,
            TodoDraft {
                title: "Pay rent".to_string(),
                description: None,
                reminder_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()),
            },
        )
        .unwrap();
    let grant = db.get_grant(USER).unwrap();
    let outcome = engine.reconcile(None, Some(&created), grant).await;
    assert_eq!(outcome, SyncOutcome::Created("evt-100".to_string()));
    db.apply_sync_outcome(&created.id, &outcome).unwrap();

    let synced = db.get_todo(USER, &created.id).unwrap().unwrap();
    assert_eq!(synced.remote_event_id.as_deref(), Some("evt-100"));

    // Edit: the same event is patched, never re-created.
    let patch = TodoPatch {
        title: Some("Pay rent today".to_string()),
        ..Default::default()
    };
    let edited = db.update_todo(USER, &created.id, &patch).unwrap().unwrap();
    let grant = db.get_grant(USER).unwrap();
    let outcome = engine.reconcile(Some(&synced), Some(&edited), grant).await;
    assert_eq!(outcome, SyncOutcome::Updated);
    db.apply_sync_outcome(&edited.id, &outcome).unwrap();

    // Delete: the remote event goes away with the row.
    let pre_image = db.delete_todo(USER, &created.id).unwrap().unwrap();
    let grant = db.get_grant(USER).unwrap();
    let outcome = engine.reconcile(Some(&pre_image), None, grant).await;
    assert_eq!(outcome, SyncOutcome::Deleted);
    db.apply_sync_outcome(&pre_image.id, &outcome).unwrap();

    create_mock.assert_async().await;
    patch_mock.assert_async().await;
    delete_mock.assert_async().await;
}

#[tokio::test]
async fn unlinked_user_keeps_a_fully_usable_local_todo() {
    let server = mockito::Server::new_async().await;

    let db = Database::open_memory().unwrap();
    let engine = engine(&db, &server.url());

    let created = db
        .insert_todo(
            USER,
            TodoDraft {
                title: "Pay rent".to_string(),
                description: None,
                reminder_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()),
            },
        )
        .unwrap();

    let outcome = engine.reconcile(None, Some(&created), None).await;
    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NoAuthorization));
    db.apply_sync_outcome(&created.id, &outcome).unwrap();

    let fetched = db.get_todo(USER, &created.id).unwrap().unwrap();
    assert!(fetched.remote_event_id.is_none());
    assert_eq!(fetched.title, "Pay rent");
}

#[tokio::test]
async fn failed_create_leaves_the_todo_unsynced_but_valid() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/calendars/primary/events")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let db = Database::open_memory().unwrap();
    link_calendar(&db);
    let engine = engine(&db, &server.url());

    let created = db
        .insert_todo(
            USER,
            TodoDraft {
                title: "Pay rent".to_string(),
                description: None,
                reminder_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()),
            },
        )
        .unwrap();
    let grant = db.get_grant(USER).unwrap();
    let outcome = engine.reconcile(None, Some(&created), grant).await;
    assert!(outcome.is_failure());
    db.apply_sync_outcome(&created.id, &outcome).unwrap();

    let fetched = db.get_todo(USER, &created.id).unwrap().unwrap();
    assert!(fetched.remote_event_id.is_none());
}
