//! Metrics names for massmover.
//!
//! Recording goes through the `metrics` crate facade. Without an installed
//! recorder every macro is a no-op, so the host decides whether anything is
//! exported.
//!
//! # Usage
//!
//! ```rust,ignore
//! use massmover_metrics::{counter, operations};
//!
//! counter!(operations::TOTAL, "outcome" => "done").increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
