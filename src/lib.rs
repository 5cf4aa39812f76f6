pub mod clock;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod io_queue;
pub mod logger;
pub mod memory;
pub mod process;
pub mod protocol;
pub mod replacement;
pub mod report;
pub mod simulation;
pub mod stats;
pub mod worker;

// Re-export commonly used items for convenience
pub use clock::SimClock;
pub use config::{MemoryGeometry, SimConfig};
pub use dispatcher::{Outcome, RequestDispatcher};
pub use error::{Result, SimError};
pub use process::ProcessId;
pub use protocol::{Reply, Request, SimEvent, WorkerHost};
