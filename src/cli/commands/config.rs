//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ShipyardResult;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> ShipyardResult<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => print!("{}", ConfigManager::render(config)?),
        ConfigAction::Path => println!("{}", manager.path().display()),
    }
    Ok(())
}
