//! The plugin as the host sees it: lifecycle, menus, and event routing.

use std::sync::Arc;

use {
    massmover_channels::ErrorCode,
    massmover_common::{ChannelId, ConnectionId},
    massmover_config::{Diagnostic, MassMoverConfig, Severity, validate},
    massmover_relocation::{Invoker, MassMover, Report, Settings},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use massmover_metrics::{counter, operations as op_metrics, plugin as plugin_metrics};

use crate::{
    directory::HostDirectory,
    error::Result,
    host::{ERROR_OK, HostFunctions},
    info::{PLUGIN_INFO, PluginInfo},
    lock::InFlight,
    menu::{MENU_ID_MASSMOVE, MenuType, PluginMenus, init_menus},
    return_code::ReturnCodes,
};

pub struct MassMoverPlugin<H: HostFunctions + ?Sized + 'static> {
    config: MassMoverConfig,
    return_codes: Arc<ReturnCodes>,
    in_flight: InFlight,
    mover: MassMover<HostDirectory<H>>,
}

impl<H: HostFunctions + ?Sized + 'static> MassMoverPlugin<H> {
    pub fn new(host: Arc<H>, config: MassMoverConfig) -> Self {
        let return_codes = Arc::new(ReturnCodes::new());
        let settings = Settings::from_config(&config.relocation);
        let directory = HostDirectory::new(host, Arc::clone(&return_codes));
        Self {
            config,
            return_codes,
            in_flight: InFlight::new(),
            mover: MassMover::new(directory, settings),
        }
    }

    pub fn info(&self) -> PluginInfo {
        PLUGIN_INFO
    }

    pub fn config(&self) -> &MassMoverConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        self.mover.settings()
    }

    /// Check the configuration and announce the plugin.
    ///
    /// Configuration problems are logged and returned; none of them stop the
    /// plugin from loading.
    pub fn init(&self) -> Vec<Diagnostic> {
        let diagnostics = validate(&self.config);
        for d in &diagnostics {
            match d.severity {
                Severity::Error => error!(path = d.path, "config: {}", d.message),
                Severity::Warning => warn!(path = d.path, "config: {}", d.message),
            }
        }
        info!(version = PLUGIN_INFO.version, "plugin initialized");
        diagnostics
    }

    pub fn shutdown(&self) {
        self.return_codes.release();
        info!("plugin shut down");
    }

    pub fn register_plugin_id(&self, id: &str) -> Result<()> {
        self.return_codes.register(id)?;
        debug!(plugin_id = id, "plugin id registered");
        Ok(())
    }

    pub fn plugin_id(&self) -> Option<String> {
        self.return_codes.plugin_id()
    }

    pub fn init_menus(&self) -> PluginMenus {
        init_menus(&self.config.menu)
    }

    /// Route a menu click. Only the channel item runs a mass move; the
    /// selected item is the target channel.
    ///
    /// Returns `None` when the event is not ours or the connection is busy.
    pub fn on_menu_item_event(
        &self,
        connection: ConnectionId,
        menu_type: MenuType,
        menu_item_id: i32,
        selected_item_id: u64,
    ) -> Option<Report> {
        if menu_type != MenuType::Channel || menu_item_id != MENU_ID_MASSMOVE {
            debug!(?menu_type, menu_item_id, "menu event ignored");
            return None;
        }
        let target = ChannelId(selected_item_id);
        if target.is_root() {
            warn!(connection = %connection, "menu event without a channel ignored");
            return None;
        }

        let Some(_guard) = self.in_flight.try_acquire(connection) else {
            #[cfg(feature = "metrics")]
            counter!(op_metrics::REJECTED_BUSY_TOTAL).increment(1);
            warn!(
                connection = %connection,
                channel = %target,
                "mass move already running on this connection"
            );
            return None;
        };

        Some(
            self.mover
                .on_channel_action_triggered(connection, target, Invoker::Local),
        )
    }

    /// Log server errors answering one of our move requests.
    ///
    /// Always returns `false` so the event still reaches other plugins.
    pub fn on_server_error_event(
        &self,
        connection: ConnectionId,
        message: &str,
        error: ErrorCode,
        return_code: &str,
        extra: &str,
    ) -> bool {
        if !self.return_codes.claim(return_code) {
            return false;
        }
        if error == ERROR_OK {
            debug!(connection = %connection, return_code, "move request confirmed");
            return false;
        }

        #[cfg(feature = "metrics")]
        counter!(plugin_metrics::SERVER_ERRORS_TOTAL).increment(1);
        error!(
            connection = %connection,
            code = error,
            extra,
            "server rejected move request: {message}"
        );
        false
    }
}
