//! Identifier newtypes shared by the directory, the relocation core, and the
//! host glue.
//!
//! All three are plain integers on the wire. Wrapping them keeps a channel id
//! from being passed where an occupant id is expected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

// ── ChannelId ───────────────────────────────────────────────────────────────

/// Server-side channel identifier, unique per server session.
///
/// Zero is reserved: as a parent it means "no parent" (the channel sits at the
/// root of the tree).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Parent value reported for top-level channels.
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ChannelId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::invalid_id("channel", s))
    }
}

// ── OccupantId ──────────────────────────────────────────────────────────────

/// Identifier of a connected client, unique per server connection.
///
/// Zero terminates occupant lists handed out by the host and is never a real
/// occupant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OccupantId(pub u16);

impl OccupantId {
    /// End-of-list marker in host occupant lists.
    pub const SENTINEL: Self = Self(0);

    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for OccupantId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for OccupantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OccupantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(Error::invalid_id("occupant", s)),
            Ok(v) => Ok(Self(v)),
        }
    }
}

// ── ConnectionId ────────────────────────────────────────────────────────────

/// Handle of one server connection inside the host client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
