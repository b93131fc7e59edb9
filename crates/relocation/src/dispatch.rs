//! Two-phase relocation: everyone else in one batch, then the invoker alone.
//!
//! Moving the invoking client inside a large batch is unreliable on some
//! server versions, so the invoker is held back and moved with its own
//! request once the batch has been sent. The two requests succeed or fail
//! independently and nothing is rolled back.

use {
    massmover_channels::{Error, Relocator, Result},
    massmover_common::{ChannelId, ConnectionId, OccupantId},
    tracing::{error, info},
};

#[cfg(feature = "metrics")]
use massmover_metrics::{counter, labels, relocation as reloc_metrics};

use crate::occupants::OccupantSet;

/// Per-dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Reason text attached to both requests.
    pub reason: String,
    /// Hold the invoker back for a separate request.
    pub invoker_last: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            reason: String::new(),
            invoker_last: true,
        }
    }
}

/// Which request an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Batch,
    Invoker,
}

impl DispatchPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Invoker => "invoker",
        }
    }
}

/// Occupants split into the batch request and the trailing single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    pub batch: Vec<OccupantId>,
    pub invoker: Option<OccupantId>,
}

impl DispatchPlan {
    /// Split `occupants` around `invoker`.
    ///
    /// The invoker only gets its own request when it is actually among the
    /// occupants and `invoker_last` is set; otherwise everyone goes in the batch.
    pub fn split(
        occupants: &OccupantSet,
        invoker: Option<OccupantId>,
        invoker_last: bool,
    ) -> Result<Self> {
        let held_back = invoker.filter(|id| invoker_last && occupants.contains(*id));
        let mut batch = Vec::new();
        batch
            .try_reserve_exact(occupants.len())
            .map_err(|e| Error::allocation("relocation batch", e))?;
        batch.extend(occupants.iter().filter(|o| Some(*o) != held_back));
        Ok(Self {
            batch,
            invoker: held_back,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty() && self.invoker.is_none()
    }

    pub fn total(&self) -> usize {
        self.batch.len() + usize::from(self.invoker.is_some())
    }
}

/// Result of one relocation request.
#[derive(Debug)]
pub enum StepOutcome {
    /// Nothing to send.
    Skipped,
    /// The host accepted the request for `count` occupants.
    Moved { count: usize },
    /// The host rejected the request for `count` occupants.
    Failed { count: usize, error: Error },
}

impl StepOutcome {
    pub fn moved(&self) -> usize {
        match self {
            Self::Moved { count } => *count,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Outcome of both phases, reported separately.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub batch: StepOutcome,
    pub invoker: StepOutcome,
}

impl DispatchOutcome {
    /// Occupants whose move request was accepted.
    pub fn moved(&self) -> usize {
        self.batch.moved() + self.invoker.moved()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.batch.error().into_iter().chain(self.invoker.error())
    }

    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// Send the relocation requests for `occupants`.
///
/// The batch goes first; a rejected batch does not stop the invoker's request.
/// Only allocation failures are returned as errors, whether they happen while
/// planning or inside a request. A failed batch allocation skips the invoker.
pub fn dispatch<R: Relocator + ?Sized>(
    relocator: &R,
    connection: ConnectionId,
    occupants: &OccupantSet,
    destination: ChannelId,
    invoker: Option<OccupantId>,
    options: &DispatchOptions,
) -> Result<DispatchOutcome> {
    let plan = DispatchPlan::split(occupants, invoker, options.invoker_last)?;
    execute(relocator, connection, &plan, destination, &options.reason)
}

/// Send the requests of an already split plan.
pub fn execute<R: Relocator + ?Sized>(
    relocator: &R,
    connection: ConnectionId,
    plan: &DispatchPlan,
    destination: ChannelId,
    reason: &str,
) -> Result<DispatchOutcome> {
    let batch = if plan.batch.is_empty() {
        StepOutcome::Skipped
    } else {
        let result = relocator.relocate_batch(connection, &plan.batch, destination, reason);
        settle(DispatchPhase::Batch, plan.batch.len(), destination, result)?
    };

    let invoker = match plan.invoker {
        None => StepOutcome::Skipped,
        Some(invoker) => {
            let result = relocator.relocate_one(connection, invoker, destination, reason);
            settle(DispatchPhase::Invoker, 1, destination, result)?
        },
    };

    Ok(DispatchOutcome { batch, invoker })
}

/// Turn a request result into an outcome. Fatal errors are passed through.
fn settle(
    phase: DispatchPhase,
    count: usize,
    destination: ChannelId,
    result: Result<()>,
) -> Result<StepOutcome> {
    let outcome = match result {
        Ok(()) => {
            #[cfg(feature = "metrics")]
            counter!(reloc_metrics::OCCUPANTS_MOVED_TOTAL, labels::PHASE => phase.label())
                .increment(count as u64);
            info!(
                phase = phase.label(),
                count,
                channel = %destination,
                "move requested"
            );
            StepOutcome::Moved { count }
        },
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            #[cfg(feature = "metrics")]
            counter!(reloc_metrics::REJECTED_TOTAL, labels::PHASE => phase.label()).increment(1);
            error!(
                phase = phase.label(),
                count,
                channel = %destination,
                error = %e,
                "move request rejected"
            );
            StepOutcome::Failed { count, error: e }
        },
    };
    Ok(outcome)
}
