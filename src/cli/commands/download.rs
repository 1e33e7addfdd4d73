//! Download command - install an artifact into the cache

use crate::artifact::{Artifact, ArtifactKind, ArtifactVersion, StorageAccount};
use crate::cli::args::DownloadArgs;
use crate::cli::commands::{country_or_default, remote};
use crate::config::Config;
use crate::download::{ArtifactDownloader, DownloadResult};
use crate::error::{ArtifactError, ArtifactResult};
use crate::ui::{self, DownloadSpinner, UiContext};

/// Execute the download command
pub async fn execute(args: DownloadArgs, config: &Config) -> ArtifactResult<()> {
    let ctx = UiContext::detect();
    let mut engine = config.engine();
    if args.no_cdn {
        engine.use_cdn = false;
    }
    let downloader = ArtifactDownloader::new(&engine, remote());

    let artifact = match &args.uri {
        Some(uri) => Artifact::parse(uri)?,
        None => {
            let text = args.artifact_version.as_deref().unwrap_or_default();
            let version: ArtifactVersion = text
                .parse()
                .map_err(|reason: String| ArtifactError::invalid_identity(text, reason))?;
            let account = args
                .account
                .map(StorageAccount::from)
                .unwrap_or(config.catalog.default_account);
            Artifact::from_parts(
                account,
                ArtifactKind::from(args.kind),
                version,
                &country_or_default(config, args.country.clone()),
                engine.use_cdn,
            )?
        }
    };

    let spinner = DownloadSpinner::start(&ctx, &artifact);

    let result = downloader
        .download_until(&artifact, !args.no_platform, args.force, interrupted())
        .await;

    match result {
        Ok(result) => {
            spinner.succeed(&format!("Downloaded {}", artifact));
            print_result(&ctx, &result);
            Ok(())
        }
        Err(e) => {
            spinner.fail(&format!("Download of {} failed", artifact));
            Err(e)
        }
    }
}

/// Completes on Ctrl-C; never when the handler cannot be installed
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn print_result(ctx: &UiContext, result: &DownloadResult) {
    ui::detail(ctx, "artifact", result.artifact.path.display());
    if let Some(platform) = result
        .platform
        .as_ref()
        .filter(|p| p.path != result.artifact.path)
    {
        ui::detail(ctx, "platform", platform.path.display());
    }
}
