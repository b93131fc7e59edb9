use std::collections::HashSet;

use {
    massmover_channels::{ChannelDirectory, Error, Result},
    massmover_common::{ChannelId, ConnectionId, OccupantId},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use massmover_metrics::{counter, directory as dir_metrics, labels};

use crate::scope::ScopeSet;

/// Duplicate-free occupants gathered from a scope, in collection order.
#[derive(Debug, Clone, Default)]
pub struct OccupantSet {
    occupants: Vec<OccupantId>,
    seen: HashSet<OccupantId>,
    /// Channels whose occupant list could not be fetched.
    unreadable: Vec<ChannelId>,
}

impl OccupantSet {
    /// Append `occupant` unless already present or the list sentinel.
    pub fn insert(&mut self, occupant: OccupantId) -> Result<bool> {
        if occupant.is_sentinel() || self.seen.contains(&occupant) {
            return Ok(false);
        }
        self.occupants
            .try_reserve(1)
            .map_err(|e| Error::allocation("occupant list", e))?;
        self.seen
            .try_reserve(1)
            .map_err(|e| Error::allocation("occupant index", e))?;
        self.occupants.push(occupant);
        self.seen.insert(occupant);
        Ok(true)
    }

    pub fn contains(&self, occupant: OccupantId) -> bool {
        self.seen.contains(&occupant)
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn as_slice(&self) -> &[OccupantId] {
        &self.occupants
    }

    pub fn iter(&self) -> impl Iterator<Item = OccupantId> + '_ {
        self.occupants.iter().copied()
    }

    pub fn unreadable_channels(&self) -> &[ChannelId] {
        &self.unreadable
    }
}

impl FromIterator<OccupantId> for OccupantSet {
    fn from_iter<I: IntoIterator<Item = OccupantId>>(iter: I) -> Self {
        let mut set = Self::default();
        for occupant in iter {
            if !occupant.is_sentinel() && set.seen.insert(occupant) {
                set.occupants.push(occupant);
            }
        }
        set
    }
}

/// Gather the occupants of every channel in `scope`.
///
/// A channel whose list cannot be fetched is logged, remembered in
/// [`OccupantSet::unreadable_channels`], and skipped. Each list is read up to
/// its first sentinel. Only an allocation failure is returned as an error.
pub fn collect_occupants<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
    scope: &ScopeSet,
) -> Result<OccupantSet> {
    let mut set = OccupantSet::default();

    for channel in scope {
        let listed = match directory.occupants_of(connection, channel) {
            Ok(listed) => listed,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(dir_metrics::ERRORS_TOTAL, labels::OPERATION => "occupants_of")
                    .increment(1);
                warn!(channel = %channel, error = %e, "failed to list occupants, channel skipped");
                set.unreadable
                    .try_reserve(1)
                    .map_err(|e| Error::allocation("unreadable channel list", e))?;
                set.unreadable.push(channel);
                continue;
            },
        };

        for occupant in listed.into_iter().take_while(|o| !o.is_sentinel()) {
            if !set.insert(occupant)? {
                debug!(occupant = %occupant, channel = %channel, "occupant already collected");
            }
        }
    }

    debug!(
        connection = %connection,
        occupants = set.len(),
        skipped_channels = set.unreadable.len(),
        "occupants collected"
    );
    Ok(set)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use massmover_channels::{
        ChannelDirectory, FaultPlan, MemoryDirectory,
        error::{ErrorCode, Lookup},
    };

    use super::*;

    const CONN: ConnectionId = ConnectionId(1);

    fn scope(ids: &[u64]) -> ScopeSet {
        let mut scope = ScopeSet::default();
        for id in ids {
            scope.insert(ChannelId(*id)).unwrap();
        }
        scope
    }

    fn occupants(set: &OccupantSet) -> Vec<u16> {
        set.iter().map(OccupantId::get).collect()
    }

    #[test]
    fn unions_occupants_in_scope_order() {
        let dir = MemoryDirectory::new(CONN, None)
            .with_channel(1u64, 0u64, &[5, 6])
            .with_channel(2u64, 1u64, &[7])
            .with_channel(3u64, 0u64, &[8]);
        let set = collect_occupants(&dir, CONN, &scope(&[2, 1])).unwrap();
        assert_eq!(occupants(&set), vec![7, 5, 6]);
        assert!(!set.contains(OccupantId(8)));
    }

    #[test]
    fn failed_channel_is_skipped_and_remembered() {
        let dir = MemoryDirectory::new(CONN, None)
            .with_channel(1u64, 0u64, &[5])
            .with_channel(2u64, 1u64, &[6])
            .with_faults(FaultPlan {
                occupants_of: BTreeSet::from([ChannelId(1)]),
                ..FaultPlan::default()
            });
        let set = collect_occupants(&dir, CONN, &scope(&[1, 2])).unwrap();
        assert_eq!(occupants(&set), vec![6]);
        assert_eq!(set.unreadable_channels(), &[ChannelId(1)]);
    }

    /// Directory that hands out raw, sentinel-terminated lists with stale
    /// entries after the terminator and the same client in two channels.
    struct RawLists;

    impl ChannelDirectory for RawLists {
        fn list_channels(&self, _: ConnectionId) -> Result<Vec<ChannelId>> {
            Ok(vec![ChannelId(1), ChannelId(2)])
        }

        fn parent_of(&self, _: ConnectionId, _: ChannelId) -> Result<ChannelId> {
            Ok(ChannelId::ROOT)
        }

        fn occupants_of(&self, _: ConnectionId, channel: ChannelId) -> Result<Vec<OccupantId>> {
            Ok(match channel.get() {
                1 => vec![OccupantId(3), OccupantId(4), OccupantId(0), OccupantId(9)],
                _ => vec![OccupantId(4), OccupantId(5), OccupantId(0)],
            })
        }

        fn self_id(&self, _: ConnectionId) -> Result<OccupantId> {
            const NOT_CONNECTED: ErrorCode = 0x0200;
            Err(Error::directory(Lookup::SelfId, NOT_CONNECTED))
        }
    }

    #[test]
    fn stops_at_sentinel_and_deduplicates() {
        let set = collect_occupants(&RawLists, CONN, &scope(&[1, 2])).unwrap();
        assert_eq!(occupants(&set), vec![3, 4, 5]);
    }

    #[test]
    fn empty_scope_gives_empty_set() {
        let set = collect_occupants(&RawLists, CONN, &ScopeSet::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn from_iter_drops_sentinels_and_duplicates() {
        let set: OccupantSet = [1u16, 0, 2, 1].into_iter().map(OccupantId).collect();
        assert_eq!(occupants(&set), vec![1, 2]);
    }
}
