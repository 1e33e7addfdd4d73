//! Status lines shared by all commands

use super::context::UiContext;
use console::{style, StyledObject};

/// Outcome shown in front of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn marker(self, ctx: &UiContext) -> StyledObject<&'static str> {
        let (glyph, label) = match self {
            Self::Ok => ("✓", "[OK]"),
            Self::Warn => ("!", "[WARN]"),
            Self::Fail => ("✗", "[FAIL]"),
            Self::Info => ("•", "[INFO]"),
        };
        let marker = style(if ctx.is_fancy() { glyph } else { label });
        match self {
            Self::Ok => marker.green(),
            Self::Warn => marker.yellow(),
            Self::Fail => marker.red(),
            Self::Info => marker.cyan(),
        }
    }
}

/// Render a status line without printing it
pub fn status_line(ctx: &UiContext, status: Status, message: &str) -> String {
    format!("  {} {}", status.marker(ctx), message)
}

/// Print a status line
pub fn status(ctx: &UiContext, status: Status, message: &str) {
    println!("{}", status_line(ctx, status, message));
}

/// Print a bold heading
pub fn heading(ctx: &UiContext, title: &str) {
    if ctx.is_fancy() {
        println!("{}", style(title).cyan().bold());
    } else {
        println!("{}", title);
    }
}

/// Print an indented `label: value` line
pub fn detail(ctx: &UiContext, label: &str, value: impl std::fmt::Display) {
    if ctx.is_fancy() {
        println!("    {}: {}", style(label).dim(), value);
    } else {
        println!("    {}: {}", label, value);
    }
}
