//! One mass move, from menu click to dispatched requests.
//!
//! An operation runs strictly forward through
//! `Idle → ResolvingScope → CollectingOccupants → Dispatching → Done`.
//! Lookup and relocation failures are absorbed by the step that hits them.
//! Running out of memory, or not knowing who the invoker is, ends the
//! operation in `Aborted` instead.

use std::fmt;

use {
    massmover_channels::{ChannelDirectory, Error, Relocator},
    massmover_common::{ChannelId, ConnectionId, OccupantId},
    massmover_config::RelocationConfig,
    tracing::{debug, error, info, info_span, warn},
};

#[cfg(feature = "metrics")]
use massmover_metrics::{counter, histogram, labels, operations as op_metrics};

use crate::{
    dispatch::{DispatchOptions, DispatchOutcome, dispatch},
    occupants::collect_occupants,
    scope::{ListingMode, ScopeOptions, resolve_scope},
};

/// Operation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ResolvingScope,
    CollectingOccupants,
    Dispatching,
    Done,
    Aborted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ResolvingScope => "resolving_scope",
            Self::CollectingOccupants => "collecting_occupants",
            Self::Dispatching => "dispatching",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Who triggered the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Invoker {
    /// The local client on the connection; its id is looked up when needed.
    #[default]
    Local,
    /// A known occupant.
    Occupant(OccupantId),
    /// Nobody to hold back: every occupant travels in the batch.
    Unattended,
}

/// Why an operation ended in [`Phase::Aborted`].
#[derive(Debug, thiserror::Error)]
pub enum AbortReason {
    #[error("out of memory while {phase}: {source}")]
    Allocation {
        phase: Phase,
        #[source]
        source: Error,
    },

    #[error("cannot determine the invoking client: {source}")]
    InvokerUnknown {
        #[source]
        source: Error,
    },
}

impl AbortReason {
    /// Whether the abort came from resource exhaustion rather than the server.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Allocation { source, .. } => source.is_fatal(),
            Self::InvokerUnknown { .. } => false,
        }
    }
}

/// Settings for every operation run by a [`MassMover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub scope: ScopeOptions,
    pub dispatch: DispatchOptions,
}

impl Settings {
    pub fn from_config(cfg: &RelocationConfig) -> Self {
        Self {
            scope: ScopeOptions {
                include_ancestors: cfg.include_ancestors,
                listing: if cfg.cache_channel_listing {
                    ListingMode::Cached
                } else {
                    ListingMode::Refetch
                },
            },
            dispatch: DispatchOptions {
                reason: cfg.reason.clone(),
                invoker_last: cfg.move_invoker_last,
            },
        }
    }
}

/// What one operation did.
#[derive(Debug)]
pub struct Report {
    pub connection: ConnectionId,
    pub target: ChannelId,
    /// Every state entered, in order, starting with [`Phase::Idle`].
    pub phases: Vec<Phase>,
    /// Channels in scope, in discovery order.
    pub scope: Vec<ChannelId>,
    /// Occupants found in scope, in collection order.
    pub occupants: Vec<OccupantId>,
    /// Channels whose occupants could not be listed.
    pub unreadable_channels: Vec<ChannelId>,
    /// Resolved invoker, when one was needed.
    pub invoker: Option<OccupantId>,
    pub dispatch: Option<DispatchOutcome>,
    pub abort: Option<AbortReason>,
}

impl Report {
    fn new(connection: ConnectionId, target: ChannelId) -> Self {
        Self {
            connection,
            target,
            phases: vec![Phase::Idle],
            scope: Vec::new(),
            occupants: Vec::new(),
            unreadable_channels: Vec::new(),
            invoker: None,
            dispatch: None,
            abort: None,
        }
    }

    /// Current (after return: final) state.
    pub fn state(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn is_done(&self) -> bool {
        self.state() == Phase::Done
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == Phase::Aborted
    }

    /// Occupants whose move request was accepted.
    pub fn moved(&self) -> usize {
        self.dispatch.as_ref().map_or(0, DispatchOutcome::moved)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.state(), to = %phase, "operation state");
        self.phases.push(phase);
    }

    fn abort(mut self, reason: AbortReason) -> Self {
        error!(fatal = reason.is_fatal(), reason = %reason, "mass move aborted");
        self.enter(Phase::Aborted);
        self.abort = Some(reason);
        self
    }

    fn finish(mut self) -> Self {
        self.enter(Phase::Done);
        self
    }
}

/// Runs mass moves against one directory.
pub struct MassMover<D> {
    directory: D,
    settings: Settings,
}

impl<D> MassMover<D>
where
    D: ChannelDirectory + Relocator,
{
    pub fn new(directory: D, settings: Settings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Move every occupant of `target`, its ancestors, and their subtrees
    /// into `target`.
    ///
    /// Never fails: the outcome, including any abort, is logged and returned.
    pub fn on_channel_action_triggered(
        &self,
        connection: ConnectionId,
        target: ChannelId,
        invoker: Invoker,
    ) -> Report {
        let span = info_span!("mass_move", connection = %connection, target = %target);
        let _guard = span.enter();

        info!(channel = %target, "starting mass move operation");
        let report = self.run(connection, target, invoker);

        #[cfg(feature = "metrics")]
        counter!(op_metrics::TOTAL, labels::OUTCOME => report.state().to_string()).increment(1);

        if report.is_done() {
            info!(
                channels = report.scope.len(),
                occupants = report.occupants.len(),
                moved = report.moved(),
                "mass move finished"
            );
        }
        report
    }

    fn run(&self, connection: ConnectionId, target: ChannelId, invoker: Invoker) -> Report {
        let mut report = Report::new(connection, target);

        report.enter(Phase::ResolvingScope);
        let scope = match resolve_scope(&self.directory, connection, target, self.settings.scope)
        {
            Ok(scope) => scope,
            Err(source) => {
                return report.abort(AbortReason::Allocation {
                    phase: Phase::ResolvingScope,
                    source,
                });
            },
        };
        info!(count = scope.len(), "found channels to move occupants from");
        report.scope = scope.as_slice().to_vec();
        #[cfg(feature = "metrics")]
        histogram!(op_metrics::SCOPE_CHANNELS).record(scope.len() as f64);

        report.enter(Phase::CollectingOccupants);
        let occupants = match collect_occupants(&self.directory, connection, &scope) {
            Ok(occupants) => occupants,
            Err(source) => {
                return report.abort(AbortReason::Allocation {
                    phase: Phase::CollectingOccupants,
                    source,
                });
            },
        };
        report.occupants = occupants.as_slice().to_vec();
        report.unreadable_channels = occupants.unreadable_channels().to_vec();
        drop(scope);
        info!(count = occupants.len(), "found occupants to move");

        report.enter(Phase::Dispatching);
        if occupants.is_empty() {
            info!("no occupants found to move");
            return report.finish();
        }

        let invoker = match invoker {
            Invoker::Local => match self.directory.self_id(connection) {
                Ok(id) => Some(id),
                Err(source) => return report.abort(AbortReason::InvokerUnknown { source }),
            },
            Invoker::Occupant(id) => Some(id),
            Invoker::Unattended => None,
        };
        report.invoker = invoker;

        match dispatch(
            &self.directory,
            connection,
            &occupants,
            target,
            invoker,
            &self.settings.dispatch,
        ) {
            Ok(outcome) => {
                if !outcome.is_clean() {
                    warn!(
                        moved = outcome.moved(),
                        requested = occupants.len(),
                        "some move requests were rejected"
                    );
                }
                report.dispatch = Some(outcome);
                report.finish()
            },
            Err(source) => report.abort(AbortReason::Allocation {
                phase: Phase::Dispatching,
                source,
            }),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use massmover_channels::{DirectoryCall, FaultPlan, MemoryDirectory, Result};

    use super::*;

    const CONN: ConnectionId = ConnectionId(1);

    fn out_of_memory(context: &str) -> Error {
        let err = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
        Error::allocation(context, err)
    }

    /// Wraps a [`MemoryDirectory`] and runs out of memory at chosen calls.
    struct Starved {
        inner: MemoryDirectory,
        occupants: bool,
        batch: bool,
    }

    impl ChannelDirectory for Starved {
        fn list_channels(&self, connection: ConnectionId) -> Result<Vec<ChannelId>> {
            self.inner.list_channels(connection)
        }

        fn parent_of(&self, connection: ConnectionId, channel: ChannelId) -> Result<ChannelId> {
            self.inner.parent_of(connection, channel)
        }

        fn occupants_of(
            &self,
            connection: ConnectionId,
            channel: ChannelId,
        ) -> Result<Vec<OccupantId>> {
            if self.occupants {
                return Err(out_of_memory("occupant list"));
            }
            self.inner.occupants_of(connection, channel)
        }

        fn self_id(&self, connection: ConnectionId) -> Result<OccupantId> {
            self.inner.self_id(connection)
        }
    }

    impl Relocator for Starved {
        fn relocate_batch(
            &self,
            connection: ConnectionId,
            occupants: &[OccupantId],
            destination: ChannelId,
            reason: &str,
        ) -> Result<()> {
            if self.batch {
                return Err(out_of_memory("client move list"));
            }
            self.inner
                .relocate_batch(connection, occupants, destination, reason)
        }

        fn relocate_one(
            &self,
            connection: ConnectionId,
            occupant: OccupantId,
            destination: ChannelId,
            reason: &str,
        ) -> Result<()> {
            self.inner
                .relocate_one(connection, occupant, destination, reason)
        }
    }

    fn server() -> MemoryDirectory {
        MemoryDirectory::new(CONN, Some(OccupantId(1)))
            .with_channel(10u64, 0u64, &[1])
            .with_channel(20u64, 10u64, &[2])
            .with_channel(30u64, 0u64, &[3])
    }

    #[test]
    fn walks_every_state_in_order() {
        let mover = MassMover::new(server(), Settings::default());
        let report = mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Local);
        assert_eq!(report.phases, vec![
            Phase::Idle,
            Phase::ResolvingScope,
            Phase::CollectingOccupants,
            Phase::Dispatching,
            Phase::Done,
        ]);
        assert_eq!(report.invoker, Some(OccupantId(1)));
        assert_eq!(report.moved(), 2);
        assert_eq!(
            mover.directory().channel_of(OccupantId(3)),
            Some(ChannelId(30))
        );
    }

    #[test]
    fn unknown_self_id_aborts_before_any_move() {
        let dir = server().with_faults(FaultPlan {
            self_id: true,
            ..FaultPlan::default()
        });
        let mover = MassMover::new(dir, Settings::default());
        let report = mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Local);
        assert!(report.is_aborted());
        assert!(matches!(
            report.abort,
            Some(AbortReason::InvokerUnknown { .. })
        ));
        assert!(mover.directory().relocations().is_empty());
        assert!(report.state().is_terminal());
    }

    #[test]
    fn explicit_invoker_skips_the_self_lookup() {
        let mover = MassMover::new(server(), Settings::default());
        let report =
            mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Occupant(OccupantId(2)));
        assert!(report.is_done());
        assert!(
            !mover
                .directory()
                .journal()
                .contains(&DirectoryCall::SelfId)
        );
        assert_eq!(
            mover.directory().relocations().last(),
            Some(&DirectoryCall::RelocateOne {
                occupant: OccupantId(2),
                destination: ChannelId(20),
            })
        );
    }

    #[test]
    fn unattended_sends_a_single_batch() {
        let mover = MassMover::new(server(), Settings::default());
        let report = mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Unattended);
        assert!(report.is_done());
        assert_eq!(mover.directory().relocations(), vec![
            DirectoryCall::RelocateBatch {
                occupants: vec![OccupantId(2), OccupantId(1)],
                destination: ChannelId(20),
            }
        ]);
    }

    #[test]
    fn allocation_failure_in_batch_request_aborts() {
        let dir = Starved {
            inner: server(),
            occupants: false,
            batch: true,
        };
        let mover = MassMover::new(dir, Settings::default());
        let report = mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Local);
        assert!(report.is_aborted());
        assert!(matches!(
            report.abort,
            Some(AbortReason::Allocation {
                phase: Phase::Dispatching,
                ..
            })
        ));
        assert!(report.abort.as_ref().unwrap().is_fatal());
        assert!(report.dispatch.is_none());
        assert!(mover.directory().inner.relocations().is_empty());
    }

    #[test]
    fn abort_while_collecting_keeps_the_resolved_scope() {
        let dir = Starved {
            inner: server(),
            occupants: true,
            batch: false,
        };
        let mover = MassMover::new(dir, Settings::default());
        let report = mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Local);
        assert!(report.is_aborted());
        assert!(matches!(
            report.abort,
            Some(AbortReason::Allocation {
                phase: Phase::CollectingOccupants,
                ..
            })
        ));
        assert_eq!(report.scope, vec![ChannelId(20), ChannelId(10)]);
        assert!(report.occupants.is_empty());
    }

    #[test]
    fn failed_occupant_listing_is_reported_not_fatal() {
        let dir = server().with_faults(FaultPlan {
            occupants_of: BTreeSet::from([ChannelId(10)]),
            ..FaultPlan::default()
        });
        let mover = MassMover::new(dir, Settings::default());
        let report = mover.on_channel_action_triggered(CONN, ChannelId(20), Invoker::Local);
        assert!(report.is_done());
        assert_eq!(report.unreadable_channels, vec![ChannelId(10)]);
        assert_eq!(report.occupants, vec![OccupantId(2)]);
    }

    #[test]
    fn settings_follow_config() {
        let cfg = RelocationConfig {
            reason: "event".into(),
            move_invoker_last: false,
            cache_channel_listing: false,
            include_ancestors: false,
        };
        let settings = Settings::from_config(&cfg);
        assert_eq!(settings.scope.listing, ListingMode::Refetch);
        assert!(!settings.scope.include_ancestors);
        assert!(!settings.dispatch.invoker_last);
        assert_eq!(settings.dispatch.reason, "event");
        assert_eq!(
            Settings::from_config(&RelocationConfig::default()),
            Settings::default()
        );
    }
}
