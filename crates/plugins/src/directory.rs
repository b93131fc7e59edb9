//! [`ChannelDirectory`] and [`Relocator`] on top of the host function table.

use std::sync::Arc;

use {
    massmover_channels::{
        ChannelDirectory, Error, Lookup, RelocationKind, Relocator, Result, error::ErrorCode,
    },
    massmover_common::{ChannelId, ConnectionId, OccupantId},
    tracing::debug,
};

use crate::{host::HostFunctions, return_code::ReturnCodes};

/// Error code reported when a move is attempted before the host assigned a
/// plugin id. Matches the host's "not connected / not ready" family.
const ERROR_NOT_READY: ErrorCode = 0x0005;

/// Directory backed by the live host client.
pub struct HostDirectory<H: ?Sized> {
    host: Arc<H>,
    return_codes: Arc<ReturnCodes>,
}

impl<H: HostFunctions + ?Sized> HostDirectory<H> {
    pub fn new(host: Arc<H>, return_codes: Arc<ReturnCodes>) -> Self {
        Self { host, return_codes }
    }

    fn return_code(&self, kind: RelocationKind) -> Result<String> {
        self.return_codes.mint(self.host.as_ref()).map_err(|e| {
            debug!(error = %e, "no return code for move request");
            Error::relocation(kind, ERROR_NOT_READY)
        })
    }
}

/// Entries of a host list up to, not including, its zero terminator.
fn until_sentinel<T: Copy + PartialEq + Default>(list: Vec<T>) -> impl Iterator<Item = T> {
    let zero = T::default();
    list.into_iter().take_while(move |v| *v != zero)
}

impl<H: HostFunctions + ?Sized> ChannelDirectory for HostDirectory<H> {
    fn list_channels(&self, connection: ConnectionId) -> Result<Vec<ChannelId>> {
        let raw = self
            .host
            .get_channel_list(connection.0)
            .map_err(|code| Error::directory(Lookup::ListChannels, code))?;
        Ok(until_sentinel(raw).map(ChannelId).collect())
    }

    fn parent_of(&self, connection: ConnectionId, channel: ChannelId) -> Result<ChannelId> {
        self.host
            .get_parent_channel_of_channel(connection.0, channel.0)
            .map(ChannelId)
            .map_err(|code| Error::directory(Lookup::ParentOf(channel), code))
    }

    fn occupants_of(
        &self,
        connection: ConnectionId,
        channel: ChannelId,
    ) -> Result<Vec<OccupantId>> {
        let raw = self
            .host
            .get_channel_client_list(connection.0, channel.0)
            .map_err(|code| Error::directory(Lookup::OccupantsOf(channel), code))?;
        Ok(until_sentinel(raw).map(OccupantId).collect())
    }

    fn self_id(&self, connection: ConnectionId) -> Result<OccupantId> {
        self.host
            .get_client_id(connection.0)
            .map(OccupantId)
            .map_err(|code| Error::directory(Lookup::SelfId, code))
    }
}

impl<H: HostFunctions + ?Sized> Relocator for HostDirectory<H> {
    fn relocate_batch(
        &self,
        connection: ConnectionId,
        occupants: &[OccupantId],
        destination: ChannelId,
        reason: &str,
    ) -> Result<()> {
        let mut clients = Vec::new();
        clients
            .try_reserve_exact(occupants.len() + 1)
            .map_err(|e| Error::allocation("client move list", e))?;
        clients.extend(occupants.iter().map(|o| o.0));
        clients.push(0);

        let return_code = self.return_code(RelocationKind::Batch)?;
        self.host
            .request_clients_move(connection.0, &clients, destination.0, reason, &return_code)
            .map_err(|code| Error::relocation(RelocationKind::Batch, code))
    }

    fn relocate_one(
        &self,
        connection: ConnectionId,
        occupant: OccupantId,
        destination: ChannelId,
        reason: &str,
    ) -> Result<()> {
        let return_code = self.return_code(RelocationKind::Single)?;
        self.host
            .request_client_move(connection.0, occupant.0, destination.0, reason, &return_code)
            .map_err(|code| Error::relocation(RelocationKind::Single, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_ends_the_list() {
        let got: Vec<u16> = until_sentinel(vec![4, 5, 0, 6]).collect();
        assert_eq!(got, vec![4, 5]);
        let got: Vec<u64> = until_sentinel(vec![7, 8]).collect();
        assert_eq!(got, vec![7, 8]);
        assert_eq!(until_sentinel(Vec::<u64>::new()).count(), 0);
    }
}
