mod config;
pub mod database;
pub mod grants;

pub use config::{AccountConfig, CalendarConfig, Config, OAuthClientConfig};
pub use database::Database;
pub use grants::{Grant, GrantStore};

use std::path::PathBuf;

/// Returns `~/.config/tasklink[-dev]/` based on TASKLINK_ENV.
///
/// Set TASKLINK_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TASKLINK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tasklink-dev")
    } else {
        base_dir.join("tasklink")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
