use serde::Serialize;

/// Host plugin API the plugin is built against.
pub const PLUGIN_API_VERSION: i32 = 26;

/// Static plugin metadata reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub api_version: i32,
    pub author: &'static str,
    pub description: &'static str,
    /// The plugin has no configuration dialog.
    pub offers_configure: bool,
    /// The plugin does not ask to be loaded automatically.
    pub requests_autoload: bool,
}

pub const PLUGIN_INFO: PluginInfo = PluginInfo {
    name: "MassMover",
    version: env!("CARGO_PKG_VERSION"),
    api_version: PLUGIN_API_VERSION,
    author: "MassMover Contributors",
    description: "Mass move all users from a channel and its subchannels to the target channel.",
    offers_configure: false,
    requests_autoload: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata() {
        assert_eq!(PLUGIN_INFO.name, "MassMover");
        assert_eq!(PLUGIN_INFO.version, "1.2.0");
        assert_eq!(PLUGIN_INFO.api_version, 26);
        assert!(!PLUGIN_INFO.offers_configure);
        assert!(!PLUGIN_INFO.requests_autoload);
    }
}
