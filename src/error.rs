use thiserror::Error;

use crate::process::ProcessId;

/// Result alias used across the simulator.
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    /// Every process slot is occupied; admission waits for a later tick.
    #[error("process table is full")]
    CapacityExceeded,

    /// The pending I/O queue is full. Unreachable with a valid configuration.
    #[error("pending I/O queue saturated at {capacity} entries")]
    QueueSaturated { capacity: usize },

    #[error("unknown sender {0}")]
    UnknownSender(ProcessId),

    #[error("{0} is already admitted")]
    DuplicateIdentity(ProcessId),

    #[error("address {address} outside of [0, {limit})")]
    InvalidAddress { address: u32, limit: u32 },

    /// A worker sent a second request while its fault was still pending.
    #[error("{0} sent a request while blocked on an outstanding fault")]
    AlreadyBlocked(ProcessId),

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("resource teardown failed: {0}")]
    ResourceTeardown(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Errors that must stop the simulation rather than drop a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::QueueSaturated { .. } | SimError::ResourceTeardown(_) | SimError::Io(_)
        )
    }
}
