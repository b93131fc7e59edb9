use {
    anyhow::Result,
    massmover_config::MassMoverConfig,
    massmover_plugins::{PLUGIN_INFO, init_menus},
    serde_json::json,
};

pub fn handle_info(config: &MassMoverConfig) -> Result<()> {
    let out = json!({
        "plugin": PLUGIN_INFO,
        "menus": init_menus(&config.menu),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
