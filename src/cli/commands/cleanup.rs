//! Cleanup command - evict cache entries not used recently

use crate::cache::janitor::{CacheJanitor, CleanupReport};
use crate::cache::local::LocalCache;
use crate::cli::args::CleanupArgs;
use crate::config::Config;
use crate::error::ArtifactResult;
use crate::ui::{self, Status, UiContext};

/// Execute the cleanup command
pub async fn execute(args: CleanupArgs, config: &Config) -> ArtifactResult<()> {
    let ctx = UiContext::detect();
    let days = args.days.unwrap_or(config.cache.cleanup_days);

    if days == 0 {
        println!("Cache cleanup is disabled (cleanup_days = 0)");
        return Ok(());
    }

    let cache = LocalCache::new(config.engine().cache_root);
    ui::heading(&ctx, &format!("Cache {}", cache.root().display()));

    let janitor = CacheJanitor::new(cache).with_dry_run(args.dry_run);
    let report = janitor.cleanup(chrono::Duration::days(i64::from(days))).await?;

    print_report(&ctx, &report, days, args.dry_run);
    Ok(())
}

fn print_report(ctx: &UiContext, report: &CleanupReport, days: u32, dry_run: bool) {
    let verb = if dry_run { "Would remove" } else { "Removed" };
    for artifact in &report.removed {
        ui::status(ctx, Status::Ok, &format!("{} {}", verb, artifact));
    }
    for (path, err) in &report.failed {
        ui::status(ctx, Status::Warn, &format!("Could not remove {}: {}", path.display(), err));
    }

    if report.removed.is_empty() && report.failed.is_empty() {
        println!("No entries unused for more than {} days.", days);
    } else {
        println!(
            "{} {} of {} entr{}",
            verb,
            report.removed.len(),
            report.scanned,
            if report.scanned == 1 { "y" } else { "ies" }
        );
    }
    if report.unstamped > 0 {
        ui::status(
            ctx,
            Status::Info,
            &format!("{} entr(ies) never stamped; kept", report.unstamped),
        );
    }
}
