//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::artifact::{ArtifactKind, StorageAccount};

/// bcart - BC artifact downloader and cache
///
/// Resolves, downloads and caches BC build artifacts, safely shared
/// between concurrent processes.
#[derive(Parser, Debug)]
#[command(name = "bcart")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BCART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download an artifact (and its platform) into the cache
    Download(DownloadArgs),

    /// Show the latest artifact matching a version prefix
    Latest(LatestArgs),

    /// Show the newest build of the next major version
    NextMajor(NextArgs),

    /// Show the newest build of the next minor version
    NextMinor(NextArgs),

    /// List remote or cached artifacts
    List(ListArgs),

    /// List published countries
    Countries(CountriesArgs),

    /// Remove cache entries not used recently
    Cleanup(CleanupArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the download command
#[derive(Parser, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["uri", "artifact_version"])))]
pub struct DownloadArgs {
    /// Artifact URI, e.g. https://bcartifacts.blob.core.windows.net/onprem/24.0.16410.18056/w1
    pub uri: Option<String>,

    /// Artifact kind (with --version)
    #[arg(short, long, default_value = "onprem", conflicts_with = "uri")]
    pub kind: KindArg,

    /// Exact artifact version
    #[arg(long = "version", conflicts_with = "uri")]
    pub artifact_version: Option<String>,

    /// Country (default: from config)
    #[arg(long, conflicts_with = "uri")]
    pub country: Option<String>,

    /// Storage account (default: from config)
    #[arg(short, long, conflicts_with = "uri")]
    pub account: Option<AccountArg>,

    /// Skip the platform artifact
    #[arg(long)]
    pub no_platform: bool,

    /// Download again even when cached
    #[arg(short, long)]
    pub force: bool,

    /// Download from blob storage directly instead of the CDN
    #[arg(long)]
    pub no_cdn: bool,
}

/// Arguments for the latest command
#[derive(Parser, Debug)]
pub struct LatestArgs {
    /// Artifact kind
    #[arg(short, long, default_value = "onprem")]
    pub kind: KindArg,

    /// Version prefix, e.g. "24." or "24.1"
    #[arg(long = "version")]
    pub version_prefix: Option<String>,

    /// Country (default: from config)
    #[arg(long)]
    pub country: Option<String>,

    /// Storage account (default: from config)
    #[arg(short, long)]
    pub account: Option<AccountArg>,

    /// Answer from the local cache when possible
    #[arg(long)]
    pub local_first: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the next-major and next-minor commands
#[derive(Parser, Debug)]
pub struct NextArgs {
    /// Country (default: from config)
    #[arg(long)]
    pub country: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// List the local cache instead of the remote account
    #[arg(short, long)]
    pub local: bool,

    /// Artifact kind
    #[arg(short, long, default_value = "onprem")]
    pub kind: KindArg,

    /// Version prefix
    #[arg(long = "version")]
    pub version_prefix: Option<String>,

    /// Country filter
    #[arg(long)]
    pub country: Option<String>,

    /// Storage account (default: from config)
    #[arg(short, long)]
    pub account: Option<AccountArg>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the countries command
#[derive(Parser, Debug)]
pub struct CountriesArgs {
    /// Artifact kind
    #[arg(short, long, default_value = "onprem")]
    pub kind: KindArg,

    /// Storage account (default: from config)
    #[arg(short, long)]
    pub account: Option<AccountArg>,
}

/// Arguments for the cleanup command
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Remove entries unused for N days (default: from config)
    #[arg(long)]
    pub days: Option<u32>,

    /// Dry run - show what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Artifact URIs or paths, one per line
    Plain,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Artifact kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Onprem,
    Sandbox,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Onprem => ArtifactKind::OnPrem,
            KindArg::Sandbox => ArtifactKind::Sandbox,
        }
    }
}

/// Storage account argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccountArg {
    Bcartifacts,
    Bcinsider,
    Bcpublicpreview,
}

impl From<AccountArg> for StorageAccount {
    fn from(account: AccountArg) -> Self {
        match account {
            AccountArg::Bcartifacts => StorageAccount::BcArtifacts,
            AccountArg::Bcinsider => StorageAccount::BcInsider,
            AccountArg::Bcpublicpreview => StorageAccount::BcPublicPreview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_download_uri() {
        let cli = Cli::parse_from([
            "bcart",
            "download",
            "https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1",
            "--no-platform",
        ]);
        match cli.command {
            Commands::Download(args) => {
                assert!(args.uri.is_some());
                assert!(args.no_platform);
                assert!(!args.force);
            }
            _ => panic!("expected Download command"),
        }
    }

    #[test]
    fn cli_parses_download_parts() {
        let cli = Cli::parse_from([
            "bcart", "download", "--kind", "sandbox", "--version", "24.0.1.1", "--country", "us",
            "--account", "bcinsider",
        ]);
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.kind, KindArg::Sandbox);
                assert_eq!(args.artifact_version.as_deref(), Some("24.0.1.1"));
                assert_eq!(args.account, Some(AccountArg::Bcinsider));
            }
            _ => panic!("expected Download command"),
        }
    }

    #[test]
    fn cli_download_needs_target() {
        assert!(Cli::try_parse_from(["bcart", "download"]).is_err());
        assert!(Cli::try_parse_from([
            "bcart",
            "download",
            "https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1",
            "--version",
            "24.0.1.1"
        ])
        .is_err());
    }

    #[test]
    fn cli_parses_latest() {
        let cli = Cli::parse_from(["bcart", "latest", "--version", "24.", "--local-first"]);
        match cli.command {
            Commands::Latest(args) => {
                assert_eq!(args.version_prefix.as_deref(), Some("24."));
                assert!(args.local_first);
                assert_eq!(args.kind, KindArg::Onprem);
            }
            _ => panic!("expected Latest command"),
        }
    }

    #[test]
    fn cli_parses_cleanup() {
        let cli = Cli::parse_from(["bcart", "cleanup", "--days", "7", "--dry-run"]);
        match cli.command {
            Commands::Cleanup(args) => {
                assert_eq!(args.days, Some(7));
                assert!(args.dry_run);
            }
            _ => panic!("expected Cleanup command"),
        }
    }

    #[test]
    fn cli_parses_next_commands() {
        let cli = Cli::parse_from(["bcart", "next-major", "--country", "us"]);
        assert!(matches!(cli.command, Commands::NextMajor(_)));
        let cli = Cli::parse_from(["bcart", "next-minor"]);
        assert!(matches!(cli.command, Commands::NextMinor(_)));
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["bcart", "countries"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["bcart", "-v", "countries"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["bcart", "-vv", "countries"]);
        assert_eq!(cli.verbose, 2);
    }
}
