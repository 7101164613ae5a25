//! Config subcommand.

use clap::Subcommand;
use tasklink_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set the IANA time zone attached to mirrored calendar events
    SetTimeZone {
        /// e.g. "Asia/Kolkata" or "UTC"
        time_zone: String,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetTimeZone { time_zone } => {
            let mut config = Config::load()?;
            config.calendar.time_zone = time_zone;
            config.save()?;
            println!("time zone set to {}", config.calendar.time_zone);
        }
    }
    Ok(())
}
