use massmover_common::{ChannelId, ConnectionId, OccupantId};

use crate::Result;

/// Read side of a server connection: channel topology and who sits where.
///
/// Every call may fail on its own; callers decide whether a failure prunes a
/// branch or aborts.
pub trait ChannelDirectory: Send + Sync {
    /// All channel ids currently known on the connection.
    fn list_channels(&self, connection: ConnectionId) -> Result<Vec<ChannelId>>;

    /// Parent of `channel`, or [`ChannelId::ROOT`] for a top-level channel.
    fn parent_of(&self, connection: ConnectionId, channel: ChannelId) -> Result<ChannelId>;

    /// Occupants currently in `channel`.
    fn occupants_of(&self, connection: ConnectionId, channel: ChannelId)
    -> Result<Vec<OccupantId>>;

    /// Occupant id of the local client on this connection.
    fn self_id(&self, connection: ConnectionId) -> Result<OccupantId>;
}

/// Write side: ask the server to move occupants.
///
/// Requests are fire-and-forget from the caller's view. `Ok` means the request
/// was accepted for sending, not that the server has applied it.
pub trait Relocator: Send + Sync {
    /// Move every occupant in `occupants` to `destination` with one request.
    fn relocate_batch(
        &self,
        connection: ConnectionId,
        occupants: &[OccupantId],
        destination: ChannelId,
        reason: &str,
    ) -> Result<()>;

    /// Move a single occupant to `destination`.
    fn relocate_one(
        &self,
        connection: ConnectionId,
        occupant: OccupantId,
        destination: ChannelId,
        reason: &str,
    ) -> Result<()>;
}

impl<T: ChannelDirectory + ?Sized> ChannelDirectory for &T {
    fn list_channels(&self, connection: ConnectionId) -> Result<Vec<ChannelId>> {
        (**self).list_channels(connection)
    }

    fn parent_of(&self, connection: ConnectionId, channel: ChannelId) -> Result<ChannelId> {
        (**self).parent_of(connection, channel)
    }

    fn occupants_of(
        &self,
        connection: ConnectionId,
        channel: ChannelId,
    ) -> Result<Vec<OccupantId>> {
        (**self).occupants_of(connection, channel)
    }

    fn self_id(&self, connection: ConnectionId) -> Result<OccupantId> {
        (**self).self_id(connection)
    }
}

impl<T: Relocator + ?Sized> Relocator for &T {
    fn relocate_batch(
        &self,
        connection: ConnectionId,
        occupants: &[OccupantId],
        destination: ChannelId,
        reason: &str,
    ) -> Result<()> {
        (**self).relocate_batch(connection, occupants, destination, reason)
    }

    fn relocate_one(
        &self,
        connection: ConnectionId,
        occupant: OccupantId,
        destination: ChannelId,
        reason: &str,
    ) -> Result<()> {
        (**self).relocate_one(connection, occupant, destination, reason)
    }
}
