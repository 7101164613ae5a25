//! Google Calendar API client for sync operations.
//!
//! A narrow adapter over the events endpoints the engine needs. Each method
//! is a single request with no retries; every failure is mapped into a
//! [`SyncErrorKind`] deterministically so the engine's decision table stays
//! free of transport details.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use std::time::Duration;

use crate::sync::types::{CalendarApiError, EventSpec, SyncErrorKind};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Remote calendar operations needed by the sync engine.
///
/// Credentials travel per call; implementations hold no per-user state.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Create an event, returning the provider's opaque event id.
    async fn create_event(
        &self,
        access_token: &str,
        spec: &EventSpec,
    ) -> Result<String, CalendarApiError>;

    /// Patch an existing event in place. Idempotent by event id.
    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        spec: &EventSpec,
    ) -> Result<(), CalendarApiError>;

    /// Delete an event.
    async fn delete_event(
        &self,
        access_token: &str,
        event_id: &str,
    ) -> Result<(), CalendarApiError>;
}

/// Google Calendar API client against the user's primary calendar.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Create a new client with a fixed per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(DEFAULT_BASE_URL, request_timeout)
    }

    /// Create a client against a different base URL (for tests).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_base_url(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.base_url)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/calendars/primary/events/{}", self.base_url, event_id)
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn create_event(
        &self,
        access_token: &str,
        spec: &EventSpec,
    ) -> Result<String, CalendarApiError> {
        tracing::debug!(summary = %spec.summary, "creating calendar event");
        let resp = self
            .http
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(&event_body(spec))
            .send()
            .await
            .map_err(transport_error)?;

        let resp = check_response(resp).await?;
        let body: serde_json::Value = resp.json().await.map_err(transport_error)?;
        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                CalendarApiError::new(
                    SyncErrorKind::InvalidRequest,
                    "missing event id in response",
                )
            })
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        spec: &EventSpec,
    ) -> Result<(), CalendarApiError> {
        tracing::debug!(event_id, "patching calendar event");
        let resp = self
            .http
            .patch(self.event_url(event_id))
            .bearer_auth(access_token)
            .json(&event_body(spec))
            .send()
            .await
            .map_err(transport_error)?;

        check_response(resp).await.map(|_| ())
    }

    async fn delete_event(
        &self,
        access_token: &str,
        event_id: &str,
    ) -> Result<(), CalendarApiError> {
        tracing::debug!(event_id, "deleting calendar event");
        let resp = self
            .http
            .delete(self.event_url(event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        check_response(resp).await.map(|_| ())
    }
}

/// Convert an event spec to the Google Calendar event format.
fn event_body(spec: &EventSpec) -> serde_json::Value {
    json!({
        "summary": spec.summary,
        "description": spec.description,
        "start": {
            "dateTime": spec.start.to_rfc3339(),
            "timeZone": spec.time_zone,
        },
        "end": {
            "dateTime": spec.end.to_rfc3339(),
            "timeZone": spec.time_zone,
        },
    })
}

/// Map an HTTP status onto the engine's failure taxonomy.
///
/// 410 Gone joins 404: Google reports already-cancelled events that way, and
/// the end state matches intent either way.
pub fn classify_status(status: StatusCode) -> SyncErrorKind {
    match status.as_u16() {
        401 => SyncErrorKind::Unauthorized,
        404 | 410 => SyncErrorKind::NotFound,
        429 => SyncErrorKind::RateLimited,
        s if s >= 500 => SyncErrorKind::Transient,
        _ => SyncErrorKind::InvalidRequest,
    }
}

async fn check_response(resp: Response) -> Result<Response, CalendarApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".to_string());
    Err(CalendarApiError::new(
        classify_status(status),
        format!("{status}: {message}"),
    ))
}

fn transport_error(err: reqwest::Error) -> CalendarApiError {
    let kind = if err.is_decode() {
        SyncErrorKind::InvalidRequest
    } else {
        // Timeouts, connection resets and friends are all retryable.
        SyncErrorKind::Transient
    };
    CalendarApiError::new(kind, err.to_string())
}
