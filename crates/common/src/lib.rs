//! Shared identifiers and the id parsing error used across all massmover crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, Result},
    types::{ChannelId, ConnectionId, OccupantId},
};
