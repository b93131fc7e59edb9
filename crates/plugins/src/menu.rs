//! Context-menu registration.

use {
    massmover_config::{MENU_TEXT_CAPACITY, MenuConfig},
    serde::Serialize,
};

/// Id of the single "MassMove here" item.
pub const MENU_ID_MASSMOVE: i32 = 1;

/// Where a menu item is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuType {
    Global,
    Channel,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    #[serde(rename = "type")]
    pub kind: MenuType,
    pub id: i32,
    pub text: String,
    pub icon: String,
}

/// Menu items plus the icon of the plugin's own submenu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMenus {
    pub items: Vec<MenuItem>,
    pub icon: String,
}

/// Longest prefix of `text` that fits a host menu buffer, NUL included.
fn fit(text: &str) -> String {
    let max = MENU_TEXT_CAPACITY - 1;
    if text.len() <= max {
        return text.to_string();
    }
    let end = (0..=max)
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0);
    text[..end].to_string()
}

/// The plugin registers exactly one channel menu item.
pub fn init_menus(cfg: &MenuConfig) -> PluginMenus {
    PluginMenus {
        items: vec![MenuItem {
            kind: MenuType::Channel,
            id: MENU_ID_MASSMOVE,
            text: fit(&cfg.label),
            icon: fit(&cfg.icon),
        }],
        icon: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_channel_item() {
        let menus = init_menus(&MenuConfig::default());
        assert_eq!(menus.items, vec![MenuItem {
            kind: MenuType::Channel,
            id: MENU_ID_MASSMOVE,
            text: "MassMove here".into(),
            icon: String::new(),
        }]);
        assert!(menus.icon.is_empty());
    }

    #[test]
    fn long_labels_are_cut_on_a_char_boundary() {
        let label = "é".repeat(MENU_TEXT_CAPACITY);
        let menus = init_menus(&MenuConfig {
            label,
            icon: String::new(),
        });
        let text = &menus.items[0].text;
        assert!(text.len() < MENU_TEXT_CAPACITY);
        assert_eq!(text.len(), MENU_TEXT_CAPACITY - 2);
        assert!(text.chars().all(|c| c == 'é'));
    }
}
