//! The host client's function table.
//!
//! [`HostFunctions`] mirrors the calls the plugin makes into the host. Lists
//! come back the way the host hands them out, terminated by a zero entry, and
//! every call reports failure as a numeric host error code.

use std::fmt;

use massmover_channels::ErrorCode;

/// Host success code.
pub const ERROR_OK: ErrorCode = 0;

pub type HostResult<T> = Result<T, ErrorCode>;

/// Severity understood by the host's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Debug,
    Info,
    Devel,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Devel => "DEVEL",
        };
        f.write_str(name)
    }
}

/// Calls into the host client, bound once when the plugin is loaded.
pub trait HostFunctions: Send + Sync {
    /// Channel ids on the connection, zero-terminated.
    fn get_channel_list(&self, connection: u64) -> HostResult<Vec<u64>>;

    fn get_parent_channel_of_channel(&self, connection: u64, channel: u64) -> HostResult<u64>;

    /// Client ids in `channel`, zero-terminated.
    fn get_channel_client_list(&self, connection: u64, channel: u64) -> HostResult<Vec<u16>>;

    /// Client id of the local client on the connection.
    fn get_client_id(&self, connection: u64) -> HostResult<u16>;

    /// Request a move of every client in the zero-terminated `clients`.
    fn request_clients_move(
        &self,
        connection: u64,
        clients: &[u16],
        channel: u64,
        reason: &str,
        return_code: &str,
    ) -> HostResult<()>;

    fn request_client_move(
        &self,
        connection: u64,
        client: u16,
        channel: u64,
        reason: &str,
        return_code: &str,
    ) -> HostResult<()>;

    /// A fresh return code the host will echo back in server error events.
    fn create_return_code(&self, plugin_id: &str) -> String;

    fn log_message(&self, message: &str, level: LogLevel, channel: &str, connection: u64);
}
