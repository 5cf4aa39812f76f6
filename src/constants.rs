/// Slots in the process table.
pub const MAX_SLOTS: usize = 20;
/// Upper bound on simultaneously running workers.
pub const MAX_SIMULTANEOUS: usize = 18;

pub const NUM_PAGES: usize = 32;
pub const PAGE_SIZE: u32 = 1024;
pub const FRAME_COUNT: usize = 256;

pub const NANOS_PER_SEC: u32 = 1_000_000_000;
pub const NANOS_PER_MS: u64 = 1_000_000;

/// Clock charge for servicing a resident page.
pub const HIT_SERVICE_NS: u64 = 100;
/// Disk service time, used both for a fault and for a dirty write-back.
pub const IO_DELAY_NS: u64 = 14 * NANOS_PER_MS;

// per-iteration clock increment, models instruction execution between accesses
pub const TICK_MIN_NS: u32 = 1_000;
pub const TICK_MAX_NS: u32 = 100_000;

pub const DEFAULT_TOTAL_PROCESSES: usize = 40;
pub const DEFAULT_SIMULTANEOUS: usize = MAX_SIMULTANEOUS;
pub const DEFAULT_LAUNCH_INTERVAL_MS: u64 = 500;
pub const DEFAULT_LOG_FILE: &str = "oss.log";
pub const DEFAULT_WALL_BUDGET_SECS: u64 = 60;

/// Percentage of worker accesses that are reads.
pub const READ_BIAS: u32 = 80;
pub const MIN_WORKER_ACCESSES: u32 = 1000;
pub const MAX_WORKER_ACCESSES: u32 = 1200;
