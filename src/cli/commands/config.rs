//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ArtifactResult;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> ArtifactResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
    }
    Ok(())
}

/// Print the effective configuration, with the resolved cache root filled in
fn show_config(config: &Config) -> ArtifactResult<()> {
    let mut effective = config.clone();
    effective.cache.root = Some(config.engine().cache_root);
    println!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}
