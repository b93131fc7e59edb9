//! Metric name and label definitions.
//!
//! Every metric massmover records is named here so the set of exported series
//! can be read in one place.

/// Mass-move operation metrics
pub mod operations {
    /// Operations started from the channel menu, labelled by terminal `outcome`
    pub const TOTAL: &str = "massmover_operations_total";
    /// Menu triggers rejected because an operation was already running on the connection
    pub const REJECTED_BUSY_TOTAL: &str = "massmover_operations_rejected_busy_total";
    /// Number of channels in the resolved scope
    pub const SCOPE_CHANNELS: &str = "massmover_scope_channels";
}

/// Occupant relocation metrics
pub mod relocation {
    /// Occupants accepted for moving, labelled by `phase` (batch or invoker)
    pub const OCCUPANTS_MOVED_TOTAL: &str = "massmover_occupants_moved_total";
    /// Relocation requests rejected by the host, labelled by `phase`
    pub const REJECTED_TOTAL: &str = "massmover_relocations_rejected_total";
}

/// Directory lookup metrics
pub mod directory {
    /// Failed directory lookups, labelled by `operation`
    pub const ERRORS_TOTAL: &str = "massmover_directory_errors_total";
}

/// Host plugin metrics
pub mod plugin {
    /// Server error events that carried one of our return codes
    pub const SERVER_ERRORS_TOTAL: &str = "massmover_server_errors_total";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const PHASE: &str = "phase";
    pub const OPERATION: &str = "operation";
}
