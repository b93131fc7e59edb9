//! In-process server directory.
//!
//! [`MemoryDirectory`] holds a channel tree and the occupants of each channel
//! for a single connection, applies relocation requests immediately, and
//! journals every call it receives. Faults can be injected per lookup so the
//! relocation core can be exercised against partial failures.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use {
    massmover_common::{ChannelId, ConnectionId, OccupantId},
    serde::{Deserialize, Serialize},
    tracing::{debug, trace},
};

use crate::{
    ChannelDirectory, Error, Relocator, Result,
    error::{ErrorCode, Lookup, RelocationKind},
};

/// Generic failure code used for injected faults.
pub const ERROR_UNDEFINED: ErrorCode = 0x0001;
/// Code returned for lookups of an unknown client.
pub const ERROR_INVALID_CLIENT: ErrorCode = 0x0200;
/// Code returned for lookups of an unknown channel.
pub const ERROR_INVALID_CHANNEL: ErrorCode = 0x0300;

fn default_connection() -> ConnectionId {
    ConnectionId(1)
}

// ── Snapshot ────────────────────────────────────────────────────────────────

/// Serializable description of a server: channel tree, occupants, faults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSnapshot {
    #[serde(default = "default_connection")]
    pub connection: ConnectionId,
    /// Occupant id of the local client, if it is connected.
    #[serde(default)]
    pub self_id: Option<OccupantId>,
    #[serde(default)]
    pub channels: Vec<ChannelSnapshot>,
    #[serde(default)]
    pub faults: FaultPlan,
}

/// One channel in a [`ServerSnapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    #[serde(default)]
    pub parent: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub occupants: Vec<OccupantId>,
}

/// Lookups and requests that should fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FaultPlan {
    /// `parent_of` fails for these channels.
    pub parent_of: BTreeSet<ChannelId>,
    /// `occupants_of` fails for these channels.
    pub occupants_of: BTreeSet<ChannelId>,
    /// 1-based ordinals of `list_channels` calls that fail.
    pub list_channels_calls: BTreeSet<usize>,
    /// Every `list_channels` call fails.
    pub list_channels: bool,
    /// `self_id` fails.
    pub self_id: bool,
    /// Batch relocation is rejected with this code.
    pub relocate_batch: Option<ErrorCode>,
    /// Single relocation is rejected with this code.
    pub relocate_one: Option<ErrorCode>,
}

/// A call received by a [`MemoryDirectory`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    ListChannels,
    ParentOf(ChannelId),
    OccupantsOf(ChannelId),
    SelfId,
    RelocateBatch {
        occupants: Vec<OccupantId>,
        destination: ChannelId,
    },
    RelocateOne {
        occupant: OccupantId,
        destination: ChannelId,
    },
}

impl DirectoryCall {
    pub fn is_relocation(&self) -> bool {
        matches!(self, Self::RelocateBatch { .. } | Self::RelocateOne { .. })
    }
}

// ── MemoryDirectory ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ChannelNode {
    parent: ChannelId,
    occupants: Vec<OccupantId>,
}

#[derive(Debug, Default)]
struct ServerState {
    channels: BTreeMap<ChannelId, ChannelNode>,
    list_calls: usize,
}

/// Directory and relocator backed by an in-memory channel tree.
#[derive(Debug)]
pub struct MemoryDirectory {
    connection: ConnectionId,
    self_id: Option<OccupantId>,
    state: Mutex<ServerState>,
    faults: Mutex<FaultPlan>,
    journal: Mutex<Vec<DirectoryCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryDirectory {
    /// Build a directory from a snapshot.
    ///
    /// Rejects channel id zero and duplicate channel ids. Parents that do not
    /// name a known channel are kept as-is so broken topologies can be modelled.
    pub fn from_snapshot(snapshot: ServerSnapshot) -> Result<Self> {
        let mut channels = BTreeMap::new();
        for channel in snapshot.channels {
            if channel.id.is_root() {
                return Err(Error::invalid_input("channel id 0 is reserved for the root"));
            }
            let node = ChannelNode {
                parent: channel.parent,
                occupants: channel
                    .occupants
                    .into_iter()
                    .filter(|o| !o.is_sentinel())
                    .collect(),
            };
            if channels.insert(channel.id, node).is_some() {
                return Err(Error::invalid_input(format!(
                    "duplicate channel id {}",
                    channel.id
                )));
            }
        }
        debug!(
            connection = %snapshot.connection,
            channels = channels.len(),
            "memory directory loaded"
        );
        Ok(Self {
            connection: snapshot.connection,
            self_id: snapshot.self_id,
            state: Mutex::new(ServerState {
                channels,
                list_calls: 0,
            }),
            faults: Mutex::new(snapshot.faults),
            journal: Mutex::new(Vec::new()),
        })
    }

    /// Empty directory for `connection` with the local client as `self_id`.
    pub fn new(connection: ConnectionId, self_id: Option<OccupantId>) -> Self {
        Self {
            connection,
            self_id,
            state: Mutex::new(ServerState::default()),
            faults: Mutex::new(FaultPlan::default()),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Add a channel (builder style).
    #[must_use]
    pub fn with_channel(
        self,
        id: impl Into<ChannelId>,
        parent: impl Into<ChannelId>,
        occupants: &[u16],
    ) -> Self {
        lock(&self.state).channels.insert(id.into(), ChannelNode {
            parent: parent.into(),
            occupants: occupants.iter().copied().map(OccupantId).collect(),
        });
        self
    }

    /// Replace the fault plan (builder style).
    #[must_use]
    pub fn with_faults(self, faults: FaultPlan) -> Self {
        *lock(&self.faults) = faults;
        self
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Every call received so far.
    pub fn journal(&self) -> Vec<DirectoryCall> {
        lock(&self.journal).clone()
    }

    /// Only the relocation requests received so far.
    pub fn relocations(&self) -> Vec<DirectoryCall> {
        lock(&self.journal)
            .iter()
            .filter(|c| c.is_relocation())
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    /// Channel currently holding `occupant`.
    pub fn channel_of(&self, occupant: OccupantId) -> Option<ChannelId> {
        lock(&self.state)
            .channels
            .iter()
            .find(|(_, node)| node.occupants.contains(&occupant))
            .map(|(id, _)| *id)
    }

    /// Current location of every occupant, ordered by occupant id.
    pub fn placement(&self) -> BTreeMap<OccupantId, ChannelId> {
        let state = lock(&self.state);
        state
            .channels
            .iter()
            .flat_map(|(id, node)| node.occupants.iter().map(move |o| (*o, *id)))
            .collect()
    }

    fn record(&self, call: DirectoryCall) {
        trace!(?call, "directory call");
        lock(&self.journal).push(call);
    }

    fn check_connection(&self, connection: ConnectionId) -> Result<()> {
        if connection == self.connection {
            Ok(())
        } else {
            Err(Error::UnknownConnection { connection })
        }
    }

    fn move_occupant(state: &mut ServerState, occupant: OccupantId, destination: ChannelId) {
        for node in state.channels.values_mut() {
            node.occupants.retain(|o| *o != occupant);
        }
        if let Some(node) = state.channels.get_mut(&destination) {
            node.occupants.push(occupant);
        }
    }

    fn is_connected(state: &ServerState, occupant: OccupantId) -> bool {
        state
            .channels
            .values()
            .any(|node| node.occupants.contains(&occupant))
    }
}

impl ChannelDirectory for MemoryDirectory {
    fn list_channels(&self, connection: ConnectionId) -> Result<Vec<ChannelId>> {
        self.record(DirectoryCall::ListChannels);
        self.check_connection(connection)?;
        let mut state = lock(&self.state);
        state.list_calls += 1;
        let faults = lock(&self.faults);
        if faults.list_channels || faults.list_channels_calls.contains(&state.list_calls) {
            return Err(Error::directory(Lookup::ListChannels, ERROR_UNDEFINED));
        }
        Ok(state.channels.keys().copied().collect())
    }

    fn parent_of(&self, connection: ConnectionId, channel: ChannelId) -> Result<ChannelId> {
        self.record(DirectoryCall::ParentOf(channel));
        self.check_connection(connection)?;
        if lock(&self.faults).parent_of.contains(&channel) {
            return Err(Error::directory(Lookup::ParentOf(channel), ERROR_UNDEFINED));
        }
        lock(&self.state)
            .channels
            .get(&channel)
            .map(|node| node.parent)
            .ok_or_else(|| Error::directory(Lookup::ParentOf(channel), ERROR_INVALID_CHANNEL))
    }

    fn occupants_of(
        &self,
        connection: ConnectionId,
        channel: ChannelId,
    ) -> Result<Vec<OccupantId>> {
        self.record(DirectoryCall::OccupantsOf(channel));
        self.check_connection(connection)?;
        if lock(&self.faults).occupants_of.contains(&channel) {
            return Err(Error::directory(
                Lookup::OccupantsOf(channel),
                ERROR_UNDEFINED,
            ));
        }
        lock(&self.state)
            .channels
            .get(&channel)
            .map(|node| node.occupants.clone())
            .ok_or_else(|| {
                Error::directory(Lookup::OccupantsOf(channel), ERROR_INVALID_CHANNEL)
            })
    }

    fn self_id(&self, connection: ConnectionId) -> Result<OccupantId> {
        self.record(DirectoryCall::SelfId);
        self.check_connection(connection)?;
        if lock(&self.faults).self_id {
            return Err(Error::directory(Lookup::SelfId, ERROR_UNDEFINED));
        }
        self.self_id
            .ok_or_else(|| Error::directory(Lookup::SelfId, ERROR_INVALID_CLIENT))
    }
}

impl Relocator for MemoryDirectory {
    fn relocate_batch(
        &self,
        connection: ConnectionId,
        occupants: &[OccupantId],
        destination: ChannelId,
        _reason: &str,
    ) -> Result<()> {
        self.record(DirectoryCall::RelocateBatch {
            occupants: occupants.to_vec(),
            destination,
        });
        self.check_connection(connection)?;
        if let Some(code) = lock(&self.faults).relocate_batch {
            return Err(Error::relocation(RelocationKind::Batch, code));
        }
        let mut state = lock(&self.state);
        if !state.channels.contains_key(&destination) {
            return Err(Error::relocation(
                RelocationKind::Batch,
                ERROR_INVALID_CHANNEL,
            ));
        }
        if occupants
            .iter()
            .any(|o| !Self::is_connected(&state, *o))
        {
            return Err(Error::relocation(RelocationKind::Batch, ERROR_INVALID_CLIENT));
        }
        for occupant in occupants {
            Self::move_occupant(&mut state, *occupant, destination);
        }
        Ok(())
    }

    fn relocate_one(
        &self,
        connection: ConnectionId,
        occupant: OccupantId,
        destination: ChannelId,
        _reason: &str,
    ) -> Result<()> {
        self.record(DirectoryCall::RelocateOne {
            occupant,
            destination,
        });
        self.check_connection(connection)?;
        if let Some(code) = lock(&self.faults).relocate_one {
            return Err(Error::relocation(RelocationKind::Single, code));
        }
        let mut state = lock(&self.state);
        if !state.channels.contains_key(&destination) {
            return Err(Error::relocation(
                RelocationKind::Single,
                ERROR_INVALID_CHANNEL,
            ));
        }
        if !Self::is_connected(&state, occupant) {
            return Err(Error::relocation(
                RelocationKind::Single,
                ERROR_INVALID_CLIENT,
            ));
        }
        Self::move_occupant(&mut state, occupant, destination);
        Ok(())
    }
}
