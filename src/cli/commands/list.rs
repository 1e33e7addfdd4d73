//! List command - show remote or cached artifacts

use crate::cli::args::ListArgs;
use crate::cli::commands::{catalog, print_artifacts};
use crate::config::Config;
use crate::error::ArtifactResult;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> ArtifactResult<()> {
    let catalog = catalog(config, args.kind, args.account)?;

    let mut artifacts = catalog
        .all(
            args.version_prefix.as_deref(),
            args.country.as_deref(),
            args.local,
        )
        .await?;
    artifacts.sort_by(|a, b| {
        a.version()
            .cmp(&b.version())
            .then_with(|| a.country().cmp(b.country()))
    });

    print_artifacts(&artifacts, args.format)
}
