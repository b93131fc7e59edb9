use std::{collections::TryReserveError, fmt};

use massmover_common::{ChannelId, ConnectionId};

/// Crate-wide result type for directory and relocation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Host error code, as returned by the host client's function table.
pub type ErrorCode = u32;

/// The directory query that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    ListChannels,
    ParentOf(ChannelId),
    OccupantsOf(ChannelId),
    SelfId,
}

impl Lookup {
    /// Stable label used in log fields and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ListChannels => "list_channels",
            Self::ParentOf(_) => "parent_of",
            Self::OccupantsOf(_) => "occupants_of",
            Self::SelfId => "self_id",
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListChannels => f.write_str("list channels"),
            Self::ParentOf(channel) => write!(f, "parent of channel {channel}"),
            Self::OccupantsOf(channel) => write!(f, "occupants of channel {channel}"),
            Self::SelfId => f.write_str("own client id"),
        }
    }
}

/// Which relocation request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationKind {
    Batch,
    Single,
}

impl fmt::Display for RelocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => f.write_str("batch"),
            Self::Single => f.write_str("single"),
        }
    }
}

/// Typed errors shared by the directory and relocation traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A lookup against the channel/occupant directory failed.
    #[error("directory lookup failed: {lookup} (error {code})")]
    Directory { lookup: Lookup, code: ErrorCode },

    /// The host rejected a relocation request.
    #[error("{kind} relocation rejected (error {code})")]
    Relocation { kind: RelocationKind, code: ErrorCode },

    /// A working buffer could not grow.
    #[error("allocation failed: {context}")]
    Allocation {
        context: String,
        #[source]
        source: TryReserveError,
    },

    /// The connection handle is not known to the directory.
    #[error("unknown server connection: {connection}")]
    UnknownConnection { connection: ConnectionId },

    /// Input payload or parameter is invalid.
    #[error("invalid directory input: {message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn directory(lookup: Lookup, code: ErrorCode) -> Self {
        Self::Directory { lookup, code }
    }

    #[must_use]
    pub fn relocation(kind: RelocationKind, code: ErrorCode) -> Self {
        Self::Relocation { kind, code }
    }

    #[must_use]
    pub fn allocation(context: impl Into<String>, source: TryReserveError) -> Self {
        Self::Allocation {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    /// Host error code carried by directory and relocation failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Directory { code, .. } | Self::Relocation { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Allocation failures abort the running operation; everything else is
    /// absorbed by the step that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Allocation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_error_mentions_lookup_and_code() {
        let err = Error::directory(Lookup::ParentOf(ChannelId(9)), 0x0300);
        assert_eq!(
            err.to_string(),
            "directory lookup failed: parent of channel 9 (error 768)"
        );
        assert_eq!(err.code(), Some(768));
        assert!(!err.is_fatal());
    }

    #[test]
    fn allocation_errors_are_fatal() {
        let source = match Vec::<u64>::new().try_reserve(usize::MAX) {
            Err(e) => e,
            Ok(()) => return,
        };
        let err = Error::allocation("scope buffer", source);
        assert!(err.is_fatal());
        assert_eq!(err.code(), None);
    }
}
