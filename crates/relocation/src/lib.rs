//! Mass-move core: scope resolution, occupant collection, two-phase dispatch,
//! and the orchestrator that sequences them.
//!
//! Everything here is synchronous and talks to the server only through the
//! [`massmover_channels::ChannelDirectory`] and
//! [`massmover_channels::Relocator`] traits. A [`MassMover`] is not meant to
//! run two operations on the same connection at once; the host glue
//! serialises triggers per connection.

pub mod dispatch;
pub mod occupants;
pub mod orchestrator;
pub mod scope;

pub use {
    dispatch::{
        DispatchOptions, DispatchOutcome, DispatchPhase, DispatchPlan, StepOutcome, dispatch,
    },
    occupants::{OccupantSet, collect_occupants},
    orchestrator::{AbortReason, Invoker, MassMover, Phase, Report, Settings},
    scope::{ListingMode, ScopeOptions, ScopeSet, resolve_scope},
};
