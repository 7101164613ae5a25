//! Per-user calendar authorization grants.
//!
//! A grant is the stored credential pair for one user's linked calendar
//! account. At most one grant exists per user; replacing it is a single
//! whole-row write. Deleting a grant (disconnect) does not touch remote
//! events that were already created.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::integrations::oauth::OAuthTokens;

/// Seconds of safety margin before the recorded expiry at which a token is
/// already treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// A user's stored authorization credential for the calendar service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Grant {
    /// Build a grant from a completed token exchange.
    pub fn from_tokens(user_id: &str, tokens: &OAuthTokens, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at,
            scopes: tokens
                .scope
                .as_deref()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            updated_at: now,
        }
    }

    /// Whether the access token is expired (with 60s buffer).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now > exp - Duration::seconds(EXPIRY_BUFFER_SECS),
            None => false,
        }
    }

    /// The grant after a refresh exchange. The old refresh token is kept
    /// when the provider omits a new one.
    pub fn refreshed(&self, tokens: &OAuthTokens, now: DateTime<Utc>) -> Self {
        Self {
            user_id: self.user_id.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_at: tokens.expires_at,
            scopes: self.scopes.clone(),
            updated_at: now,
        }
    }
}

/// Write-back handle for refreshed grants.
///
/// The sync engine persists a refreshed grant through this trait before
/// making any calendar call with the new access token.
pub trait GrantStore {
    /// Replace the stored grant for `grant.user_id` in a single write.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    fn save_grant(&self, grant: &Grant) -> Result<(), DatabaseError>;
}

impl<T: GrantStore + ?Sized> GrantStore for &T {
    fn save_grant(&self, grant: &Grant) -> Result<(), DatabaseError> {
        (**self).save_grant(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tokens(access: &str, refresh: Option<&str>, expires_at: Option<DateTime<Utc>>) -> OAuthTokens {
        OAuthTokens {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at,
            token_type: "Bearer".to_string(),
            scope: Some("https://www.googleapis.com/auth/calendar.events".to_string()),
        }
    }

    #[test]
    fn expiry_uses_sixty_second_buffer() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let grant = Grant::from_tokens("u", &tokens("a", None, Some(now + Duration::seconds(30))), now);
        assert!(grant.is_expired(now));

        let grant = Grant::from_tokens("u", &tokens("a", None, Some(now + Duration::seconds(120))), now);
        assert!(!grant.is_expired(now));
    }

    #[test]
    fn no_expiry_means_never_expired() {
        let now = Utc::now();
        let grant = Grant::from_tokens("u", &tokens("a", None, None), now);
        assert!(!grant.is_expired(now));
    }

    #[test]
    fn refreshed_keeps_old_refresh_token_when_omitted() {
        let now = Utc::now();
        let grant = Grant::from_tokens("u", &tokens("old", Some("keep-me"), None), now);
        let refreshed = grant.refreshed(&tokens("new", None, Some(now + Duration::hours(1))), now);
        assert_eq!(refreshed.access_token, "new");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(refreshed.scopes, grant.scopes);
    }

    #[test]
    fn scope_string_splits_into_set() {
        let now = Utc::now();
        let mut t = tokens("a", None, None);
        t.scope = Some("scope-a scope-b".to_string());
        let grant = Grant::from_tokens("u", &t, now);
        assert_eq!(grant.scopes, vec!["scope-a", "scope-b"]);
    }
}
