//! Latest, next-major and next-minor commands

use crate::artifact::Artifact;
use crate::cli::args::{AccountArg, KindArg, LatestArgs, NextArgs, OutputFormat};
use crate::cli::commands::{catalog, country_or_default, print_artifacts};
use crate::config::Config;
use crate::error::ArtifactResult;
use crate::ui::{self, Status, UiContext};

/// Execute the latest command
pub async fn execute(args: LatestArgs, config: &Config) -> ArtifactResult<()> {
    let catalog = catalog(config, args.kind, args.account)?;
    let country = country_or_default(config, args.country);

    let found = catalog
        .latest(args.version_prefix.as_deref(), Some(&country), args.local_first)
        .await?;
    report(found, args.format)
}

/// Execute the next-major command
pub async fn next_major(args: NextArgs, config: &Config) -> ArtifactResult<()> {
    let catalog = catalog(config, KindArg::Sandbox, Some(AccountArg::Bcinsider))?;
    let country = country_or_default(config, args.country);
    report(catalog.next_major(Some(&country)).await?, args.format)
}

/// Execute the next-minor command
pub async fn next_minor(args: NextArgs, config: &Config) -> ArtifactResult<()> {
    let catalog = catalog(config, KindArg::Sandbox, Some(AccountArg::Bcinsider))?;
    let country = country_or_default(config, args.country);
    report(catalog.next_minor(Some(&country)).await?, args.format)
}

fn report(found: Option<Artifact>, format: OutputFormat) -> ArtifactResult<()> {
    match found {
        Some(artifact) => print_artifacts(&[artifact], format),
        None => {
            if matches!(format, OutputFormat::Table) {
                ui::status(&UiContext::detect(), Status::Info, "No matching artifact");
            } else if matches!(format, OutputFormat::Json) {
                println!("[]");
            }
            Ok(())
        }
    }
}
