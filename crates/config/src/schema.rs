//! Config schema types (menu, relocation, logging).

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MassMoverConfig {
    pub menu: MenuConfig,
    pub relocation: RelocationConfig,
    pub logging: LoggingConfig,
}

/// Channel context-menu entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MenuConfig {
    /// Text of the menu item.
    pub label: String,
    /// Icon file name, relative to the host's plugin icon directory. Empty for none.
    pub icon: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            label: "MassMove here".into(),
            icon: String::new(),
        }
    }
}

/// How a mass move resolves its scope and issues its requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelocationConfig {
    /// Reason text attached to every relocation request.
    pub reason: String,
    /// Move the invoking client with a separate request after the batch.
    /// When false the invoker travels inside the batch.
    pub move_invoker_last: bool,
    /// Fetch the channel listing once per operation instead of once per
    /// subtree expansion.
    pub cache_channel_listing: bool,
    /// Pull in the target's ancestors and their subtrees.
    pub include_ancestors: bool,
}

impl Default for RelocationConfig {
    fn default() -> Self {
        Self {
            reason: String::new(),
            move_invoker_last: true,
            cache_channel_listing: true,
            include_ancestors: true,
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_plugin_behaviour() {
        let cfg = MassMoverConfig::default();
        assert_eq!(cfg.menu.label, "MassMove here");
        assert!(cfg.relocation.move_invoker_last);
        assert!(cfg.relocation.include_ancestors);
        assert!(cfg.relocation.reason.is_empty());
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg: MassMoverConfig = toml::from_str(
            r#"
            [relocation]
            reason = "raid night"
            "#,
        )
        .unwrap_or_default();
        assert_eq!(cfg.relocation.reason, "raid night");
        assert!(cfg.relocation.cache_channel_listing);
        assert_eq!(cfg.menu, MenuConfig::default());
    }
}
