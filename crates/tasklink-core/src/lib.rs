//! # Tasklink Core Library
//!
//! This library provides the core business logic for Tasklink, a todo list
//! whose reminder-bearing entries are mirrored one-way onto Google Calendar.
//! All operations are available via a standalone CLI binary built on top of
//! this crate.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite-based todo and grant storage plus TOML-based
//!   configuration
//! - **Integrations**: OAuth2 plumbing for linking a calendar account,
//!   with app credentials in the OS keyring
//! - **Sync**: the reconcile engine and the calendar API adapter; one
//!   reconcile call per todo mutation, at most one remote side effect
//!
//! ## Key Components
//!
//! - [`Database`]: todo and grant persistence
//! - [`Config`]: application configuration management
//! - [`SyncEngine`]: the per-mutation reconcile operation
//! - [`GoogleCalendarClient`]: the calendar adapter

pub mod error;
pub mod integrations;
pub mod storage;
pub mod sync;
pub mod todo;

pub use error::{ConfigError, CoreError, DatabaseError, OAuthError, ValidationError};
pub use integrations::oauth::{OAuthConfig, OAuthTokens};
pub use storage::{Config, Database, Grant, GrantStore};
pub use sync::{
    CalendarApi, EventSpec, GoogleCalendarClient, SkipReason, SyncEngine, SyncErrorKind,
    SyncOutcome,
};
pub use todo::{Todo, TodoDraft, TodoPatch};
