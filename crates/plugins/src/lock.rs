//! Per-connection invocation lock.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use massmover_common::ConnectionId;

/// Connections with a mass move in progress.
#[derive(Debug, Default)]
pub struct InFlight {
    active: Mutex<HashSet<ConnectionId>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `connection`, or `None` when an operation is already running on it.
    pub fn try_acquire(&self, connection: ConnectionId) -> Option<InFlightGuard<'_>> {
        let inserted = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection);
        inserted.then(|| InFlightGuard {
            owner: self,
            connection,
        })
    }

    pub fn is_active(&self, connection: ConnectionId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&connection)
    }
}

/// Releases the connection when dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    connection: ConnectionId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_on_a_connection_is_refused() {
        let lock = InFlight::new();
        let first = lock.try_acquire(ConnectionId(1));
        assert!(first.is_some());
        assert!(lock.try_acquire(ConnectionId(1)).is_none());
        assert!(lock.try_acquire(ConnectionId(2)).is_some());
        drop(first);
        assert!(!lock.is_active(ConnectionId(1)));
        assert!(lock.try_acquire(ConnectionId(1)).is_some());
    }
}
