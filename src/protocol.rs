//! Messages exchanged with workers and the host interface the dispatcher
//! drives them through.

use crate::clock::SimClock;
use crate::error::Result;
use crate::memory::{MemorySnapshot, PageOwner};
use crate::process::{FrameIndex, PageNumber, ProcessId, SlotIndex};

/// A memory access issued by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub sender: ProcessId,
    pub address: u32,
    pub is_write: bool,
}

/// Completion notice for a [`Request`], addressed to `sender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub sender: ProcessId,
    pub address: u32,
    pub is_write: bool,
}

impl From<Request> for Reply {
    fn from(request: Request) -> Self {
        Reply {
            sender: request.sender,
            address: request.address,
            is_write: request.is_write,
        }
    }
}

/// Spawns workers and carries their messages. All calls are non-blocking.
pub trait WorkerHost {
    /// Start a new worker and return its identity.
    fn spawn(&mut self) -> Result<ProcessId>;

    /// Workers that exited since the last call.
    fn poll_exited(&mut self) -> Vec<ProcessId>;

    /// Next queued request from any worker.
    fn try_recv(&mut self) -> Option<Request>;

    /// Deliver a reply to the worker named in it.
    fn send_reply(&mut self, reply: Reply) -> Result<()>;

    /// Stop a worker that is still running.
    fn terminate(&mut self, identity: ProcessId) -> Result<()>;
}

/// Structured record of what the coordinator did, for the report.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Admitted {
        identity: ProcessId,
        slot: SlotIndex,
        at: SimClock,
    },
    Requested {
        identity: ProcessId,
        address: u32,
        is_write: bool,
        at: SimClock,
    },
    Hit {
        identity: ProcessId,
        address: u32,
        frame: FrameIndex,
        is_write: bool,
        at: SimClock,
    },
    /// `queued` is set when no frame was free and the fault waits for I/O.
    Fault {
        identity: ProcessId,
        address: u32,
        page: PageNumber,
        queued: bool,
        at: SimClock,
    },
    Evicted {
        frame: FrameIndex,
        owner: PageOwner,
        identity: Option<ProcessId>,
        dirty: bool,
        at: SimClock,
    },
    /// A dirty frame was written back; the clock was charged.
    WriteBack {
        frame: FrameIndex,
        charged_ns: u64,
        at: SimClock,
    },
    Loaded {
        identity: ProcessId,
        page: PageNumber,
        frame: FrameIndex,
        at: SimClock,
    },
    Granted {
        identity: ProcessId,
        address: u32,
        is_write: bool,
        at: SimClock,
    },
    Reaped {
        identity: ProcessId,
        slot: SlotIndex,
        frames_released: usize,
        dropped_faults: usize,
        at: SimClock,
    },
    MemoryMap(MemorySnapshot),
}
