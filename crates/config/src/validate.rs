//! Configuration sanity checks.
//!
//! The host copies menu strings into fixed-size buffers, so over-long labels
//! would be truncated silently. Problems are reported as diagnostics rather
//! than rejected; the plugin still starts.

use crate::schema::MassMoverConfig;

/// Size of the host's menu text and icon buffers, terminator included.
pub const MENU_TEXT_CAPACITY: usize = 128;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "menu.label"
    pub path: &'static str,
    pub message: String,
}

/// Check a loaded configuration.
pub fn validate(cfg: &MassMoverConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if cfg.menu.label.trim().is_empty() {
        out.push(Diagnostic {
            severity: Severity::Error,
            path: "menu.label",
            message: "menu label is empty".into(),
        });
    }
    for (path, value) in [("menu.label", &cfg.menu.label), ("menu.icon", &cfg.menu.icon)] {
        if value.len() >= MENU_TEXT_CAPACITY {
            out.push(Diagnostic {
                severity: Severity::Warning,
                path,
                message: format!(
                    "{} bytes, will be truncated to {}",
                    value.len(),
                    MENU_TEXT_CAPACITY - 1
                ),
            });
        }
    }

    // A bare level is the common case; full filter directives are passed through.
    let level = cfg.logging.level.trim();
    if !level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        out.push(Diagnostic {
            severity: Severity::Warning,
            path: "logging.level",
            message: format!("unknown log level {level:?}"),
        });
    }

    out
}
