//! Lightweight OAuth2 Authorization Code flow for linking a calendar account.
//!
//! 1. Opens browser to authorization URL
//! 2. Starts a tiny localhost HTTP server to receive the callback
//! 3. Exchanges the code for an access token (+ refresh token)
//!
//! Tokens are not stored here; the caller persists them as a per-user
//! [`Grant`](crate::storage::Grant).

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::TcpListener;

use crate::error::OAuthError;
use crate::integrations::keyring_store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

impl OAuthConfig {
    /// Google Calendar endpoints with credentials loaded from the keyring.
    /// Returns empty credential strings if none are stored yet;
    /// [`authorize`] rejects those.
    pub fn google(redirect_port: u16) -> Self {
        let client_id = keyring_store::get("google_client_id")
            .ok()
            .flatten()
            .unwrap_or_default();
        let client_secret = keyring_store::get("google_client_secret")
            .ok()
            .flatten()
            .unwrap_or_default();

        Self {
            client_id,
            client_secret,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar.events".to_string()],
            redirect_port,
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    pub fn auth_url_full(&self) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode(&scopes),
        )
    }
}

/// Run the full OAuth2 flow: open browser -> listen for callback -> exchange code.
///
/// # Errors
/// Returns an error if the browser cannot be opened, the callback is
/// malformed, or the code exchange is rejected.
pub async fn authorize(config: &OAuthConfig) -> Result<OAuthTokens, OAuthError> {
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        return Err(OAuthError::CredentialsNotConfigured {
            service: "google".to_string(),
        });
    }

    // Open browser
    let auth_url = config.auth_url_full();
    open::that(&auth_url).map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;

    // Listen for callback
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.redirect_port))
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;
    listener
        .set_nonblocking(false)
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;

    let (mut stream, _) = listener
        .accept()
        .map_err(|e| OAuthError::InvalidCallback(e.to_string()))?;
    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .map_err(|e| OAuthError::InvalidCallback(e.to_string()))?;
    let request = String::from_utf8_lossy(&buf[..n]);

    // Extract code from GET /callback?code=XXX&...
    let code = extract_code(&request)
        .ok_or_else(|| OAuthError::InvalidCallback("no code in callback".to_string()))?;

    // Send success response to browser
    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body><h2>Calendar linked!</h2><p>You can close this tab.</p><script>window.close()</script></body></html>";
    let _ = stream.write_all(response.as_bytes());
    drop(stream);
    drop(listener);

    // Exchange code for tokens
    exchange_code(config, &code).await
}

/// Exchange authorization code for tokens.
///
/// # Errors
/// Returns an error if the token endpoint rejects the code or is unreachable.
pub async fn exchange_code(config: &OAuthConfig, code: &str) -> Result<OAuthTokens, OAuthError> {
    let client = Client::new();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", &config.redirect_uri()),
    ];

    let resp = client.post(&config.token_url).form(&params).send().await?;
    let body: serde_json::Value = resp.json().await?;

    if let Some(error) = body.get("error") {
        return Err(OAuthError::TokenExchangeFailed(error.to_string()));
    }

    Ok(parse_tokens(&body))
}

/// Refresh an access token using a refresh token.
///
/// # Errors
/// Returns [`OAuthError::TokenRefreshFailed`] if the provider rejects the
/// refresh token (revoked grant) and [`OAuthError::Network`] on transport
/// failure; the two are handled differently by the sync engine.
pub async fn refresh_access_token(
    config: &OAuthConfig,
    refresh: &str,
) -> Result<OAuthTokens, OAuthError> {
    let client = Client::new();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let resp = client.post(&config.token_url).form(&params).send().await?;
    let body: serde_json::Value = resp.json().await?;

    if let Some(error) = body.get("error") {
        return Err(OAuthError::TokenRefreshFailed(error.to_string()));
    }

    let mut tokens = parse_tokens(&body);
    // Providers may omit the refresh token on refresh; keep using the old one.
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(refresh.to_string());
    }
    Ok(tokens)
}

fn parse_tokens(body: &serde_json::Value) -> OAuthTokens {
    let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
    let expires_at = expires_in.map(|ei| Utc::now() + Duration::seconds(ei));

    OAuthTokens {
        access_token: body["access_token"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        refresh_token: body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from),
        expires_at,
        token_type: body["token_type"].as_str().unwrap_or("Bearer").to_string(),
        scope: body.get("scope").and_then(|v| v.as_str()).map(String::from),
    }
}

fn extract_code(request: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let path = first_line.split_whitespace().nth(1)?;
    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
}
