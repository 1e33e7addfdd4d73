//! CLI command implementations

pub mod cleanup;
pub mod config;
pub mod countries;
pub mod download;
pub mod latest;
pub mod list;

pub use cleanup::execute as cleanup;
pub use config::execute as config;
pub use countries::execute as countries;
pub use download::execute as download;
pub use latest::{execute as latest, next_major, next_minor};
pub use list::execute as list;

use crate::artifact::{Artifact, ArtifactKind, StorageAccount};
use crate::catalog::ArtifactCatalog;
use crate::cli::args::{AccountArg, KindArg, OutputFormat};
use crate::cache::local::LocalCache;
use crate::config::Config;
use crate::error::ArtifactResult;
use crate::source::{ArtifactSource, HttpSource};
use crate::ui::{self, Status, UiContext};
use console::style;
use std::sync::Arc;

/// Remote source used by all commands
pub(crate) fn remote() -> Arc<dyn ArtifactSource> {
    Arc::new(HttpSource::new())
}

/// Catalog for a kind and account, falling back to the configured account
pub(crate) fn catalog(
    config: &Config,
    kind: KindArg,
    account: Option<AccountArg>,
) -> ArtifactResult<ArtifactCatalog> {
    let engine = config.engine();
    let account = account
        .map(StorageAccount::from)
        .unwrap_or(config.catalog.default_account);
    Ok(ArtifactCatalog::new(
        ArtifactKind::from(kind),
        account,
        remote(),
        LocalCache::new(engine.cache_root),
    )?
    .with_cdn(engine.use_cdn)
    .with_strategy(engine.listing))
}

/// Country argument, or the configured default
pub(crate) fn country_or_default(config: &Config, country: Option<String>) -> String {
    country.unwrap_or_else(|| config.catalog.default_country.clone())
}

/// Print artifacts in the requested format
pub(crate) fn print_artifacts(artifacts: &[Artifact], format: OutputFormat) -> ArtifactResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(artifacts)?),
        OutputFormat::Plain => {
            for artifact in artifacts {
                match artifact.uri() {
                    Some(uri) => println!("{}", uri),
                    None => println!("{}", artifact.relative_path().display()),
                }
            }
        }
        OutputFormat::Table => {
            if artifacts.is_empty() {
                ui::status(&UiContext::detect(), Status::Info, "No artifacts found");
                return Ok(());
            }
            println!(
                "{:<9} {:<20} {:<10} {:<16}",
                style("KIND").bold(),
                style("VERSION").bold(),
                style("COUNTRY").bold(),
                style("ACCOUNT").bold()
            );
            println!("{}", "-".repeat(58));
            for artifact in artifacts {
                let account = artifact
                    .account()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "local".to_string());
                println!(
                    "{:<9} {:<20} {:<10} {:<16}",
                    artifact.kind(),
                    artifact.version(),
                    artifact.country(),
                    account
                );
            }
            println!();
            println!("{} artifact(s)", artifacts.len());
        }
    }
    Ok(())
}
