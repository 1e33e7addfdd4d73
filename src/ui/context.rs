//! Terminal detection

use std::io::IsTerminal;

/// Variables set by the build agents bcart usually runs on
const CI_VARS: [&str; 6] = [
    "CI",
    "TF_BUILD",
    "AGENT_ID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_URL",
];

/// How output should be rendered
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Spinners and glyphs on a terminal, outside build agents
    pub fn detect() -> Self {
        let fancy = std::io::stdout().is_terminal()
            && !CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self { fancy }
    }

    /// Bracketed labels, no spinners
    pub fn plain() -> Self {
        Self { fancy: false }
    }

    pub fn is_fancy(&self) -> bool {
        self.fancy
    }
}
