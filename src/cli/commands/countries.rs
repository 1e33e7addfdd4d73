//! Countries command - list published countries

use crate::cli::args::CountriesArgs;
use crate::cli::commands::catalog;
use crate::config::Config;
use crate::error::ArtifactResult;

/// Execute the countries command
pub async fn execute(args: CountriesArgs, config: &Config) -> ArtifactResult<()> {
    let catalog = catalog(config, args.kind, args.account)?;
    for country in catalog.countries().await? {
        println!("{}", country);
    }
    Ok(())
}
