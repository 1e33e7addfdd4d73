//! Terminal output for bcart

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{detail, heading, status, status_line, Status};
pub use progress::DownloadSpinner;
