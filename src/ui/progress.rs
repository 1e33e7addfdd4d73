//! Download progress

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::context::UiContext;
use super::output::{status, Status};

/// Spinner shown while a download runs.
///
/// Hidden outside interactive terminals, where a single line announces the
/// download instead.
pub struct DownloadSpinner {
    bar: ProgressBar,
    ctx: UiContext,
}

impl DownloadSpinner {
    /// Announce a download of `what`
    pub fn start(ctx: &UiContext, what: impl std::fmt::Display) -> Self {
        let message = format!("Downloading {}", what);
        let bar = if ctx.is_fancy() {
            let bar = ProgressBar::new_spinner();
            if let Ok(template) = ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}") {
                bar.set_style(template);
            }
            bar.set_message(message);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            status(ctx, Status::Info, &message);
            ProgressBar::hidden()
        };
        Self { bar, ctx: *ctx }
    }

    /// Replace the spinner with a success line
    pub fn succeed(self, message: &str) {
        self.bar.finish_and_clear();
        status(&self.ctx, Status::Ok, message);
    }

    /// Replace the spinner with a failure line
    pub fn fail(self, message: &str) {
        self.bar.finish_and_clear();
        status(&self.ctx, Status::Fail, message);
    }
}

impl Drop for DownloadSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_spinner_is_hidden() {
        let spinner = DownloadSpinner::start(&UiContext::plain(), "onprem/24.0.1.1/w1");
        assert!(spinner.bar.is_hidden());
        spinner.succeed("Downloaded");
    }
}
