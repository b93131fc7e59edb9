//! Server directory contract.
//!
//! The relocation core never talks to the host client directly. It reads the
//! channel tree through [`ChannelDirectory`] and issues moves through
//! [`Relocator`]; the host glue and the in-memory [`MemoryDirectory`] provide
//! the implementations.

pub mod directory;
pub mod error;
pub mod memory;

pub use {
    directory::{ChannelDirectory, Relocator},
    error::{Error, ErrorCode, Lookup, RelocationKind, Result},
    memory::{ChannelSnapshot, DirectoryCall, FaultPlan, MemoryDirectory, ServerSnapshot},
};
