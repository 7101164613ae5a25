//! Auth subcommand: link/unlink the Google Calendar account.

use chrono::Utc;
use clap::Subcommand;

use tasklink_core::integrations::{keyring_store, oauth};
use tasklink_core::{Grant, GrantStore, OAuthConfig};

use crate::common;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the Google OAuth client id/secret in the OS keyring
    SetCredentials {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
    },
    /// Link a Google Calendar account (opens the browser)
    Connect,
    /// Unlink the calendar account; existing remote events are kept
    Disconnect,
    /// Show link status
    Status,
}

pub async fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::SetCredentials {
            client_id,
            client_secret,
        } => {
            keyring_store::set("google_client_id", &client_id)?;
            keyring_store::set("google_client_secret", &client_secret)?;
            println!("Google client credentials stored");
        }
        AuthAction::Connect => {
            let ctx = common::context()?;
            let user = ctx.config.account.user.clone();
            let config = OAuthConfig::google(ctx.config.oauth.redirect_port);
            let tokens = oauth::authorize(&config).await?;
            let grant = Grant::from_tokens(&user, &tokens, Utc::now());
            ctx.db.save_grant(&grant)?;
            println!("Google Calendar linked for '{user}'");
        }
        AuthAction::Disconnect => {
            let ctx = common::context()?;
            let user = ctx.config.account.user.clone();
            ctx.db.delete_grant(&user)?;
            println!("Google Calendar unlinked; existing calendar events were left in place");
        }
        AuthAction::Status => {
            let ctx = common::context()?;
            let user = ctx.config.account.user.clone();
            match ctx.db.get_grant(&user)? {
                Some(grant) => {
                    let state = if grant.is_expired(Utc::now()) {
                        "expired (will refresh on next sync)"
                    } else {
                        "active"
                    };
                    println!("Google Calendar: linked ({state})");
                    if !grant.scopes.is_empty() {
                        println!("scopes: {}", grant.scopes.join(" "));
                    }
                }
                None => println!("Google Calendar: not linked"),
            }
        }
    }

    Ok(())
}
