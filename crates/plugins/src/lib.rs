//! Host-facing plugin glue.
//!
//! [`MassMoverPlugin`] is what the host client loads: it reports metadata,
//! registers the channel menu item, routes menu clicks into the relocation
//! core, and filters server error events for the moves it requested. The host
//! itself is reached only through [`HostFunctions`].

pub mod directory;
pub mod error;
pub mod host;
pub mod host_log;
pub mod info;
pub mod lock;
pub mod menu;
pub mod plugin;
pub mod return_code;

pub use {
    directory::HostDirectory,
    error::{Error, Result},
    host::{ERROR_OK, HostFunctions, HostResult, LogLevel},
    host_log::{HostLogLayer, LOG_CHANNEL, install_host_logging},
    info::{PLUGIN_API_VERSION, PLUGIN_INFO, PluginInfo},
    lock::{InFlight, InFlightGuard},
    menu::{MENU_ID_MASSMOVE, MenuItem, MenuType, PluginMenus, init_menus},
    plugin::MassMoverPlugin,
    return_code::ReturnCodes,
};
