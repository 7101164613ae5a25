//! Calendar synchronization layer.
//!
//! One-directional propagation of todo mutations onto the remote calendar:
//! the engine decides, the calendar client executes, the caller persists
//! the resulting remote reference.

pub mod calendar_client;
pub mod engine;
pub mod types;


pub use calendar_client::{classify_status, CalendarApi, GoogleCalendarClient};
pub use engine::SyncEngine;
pub use types::{
    CalendarApiError, EventSpec, SkipReason, SyncErrorKind, SyncOutcome, REMINDER_EVENT_MINUTES,
};
