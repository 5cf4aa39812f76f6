use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::warn;

use crate::constants::*;
use crate::error::{Result, SimError};

/// Table sizes for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryGeometry {
    pub frames: usize,
    pub pages: usize,
    pub page_size: u32,
    pub slots: usize,
}

impl MemoryGeometry {
    /// Exclusive upper bound on request addresses.
    pub fn address_limit(&self) -> u32 {
        self.pages as u32 * self.page_size
    }

    fn validate(&self) -> Result<()> {
        if self.frames == 0 || self.pages == 0 || self.page_size == 0 || self.slots == 0 {
            return Err(SimError::Config(format!("table sizes must be non-zero: {self:?}")));
        }
        if (self.pages as u64) * (self.page_size as u64) > u32::MAX as u64 {
            return Err(SimError::Config(format!(
                "{} pages of {} bytes overflow a 32-bit address",
                self.pages, self.page_size
            )));
        }
        Ok(())
    }
}

impl Default for MemoryGeometry {
    fn default() -> Self {
        MemoryGeometry {
            frames: FRAME_COUNT,
            pages: NUM_PAGES,
            page_size: PAGE_SIZE,
            slots: MAX_SLOTS,
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub total_processes: usize,
    pub simultaneous: usize,
    pub launch_interval_ms: u64,
    pub log_file: PathBuf,
    pub verbose: bool,
    pub wall_budget: Duration,
    pub seed: Option<u64>,
    /// Inclusive bounds of the per-iteration clock increment.
    pub tick_ns: (u32, u32),
    pub geometry: MemoryGeometry,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            total_processes: DEFAULT_TOTAL_PROCESSES,
            simultaneous: DEFAULT_SIMULTANEOUS,
            launch_interval_ms: DEFAULT_LAUNCH_INTERVAL_MS,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            verbose: false,
            wall_budget: Duration::from_secs(DEFAULT_WALL_BUDGET_SECS),
            seed: None,
            tick_ns: (TICK_MIN_NS, TICK_MAX_NS),
            geometry: MemoryGeometry::default(),
        }
    }
}

impl SimConfig {
    pub fn launch_interval_ns(&self) -> u64 {
        self.launch_interval_ms * NANOS_PER_MS
    }

    /// Check the settings, capping `simultaneous` at [`MAX_SIMULTANEOUS`].
    pub fn validate(mut self) -> Result<Self> {
        self.geometry.validate()?;

        if self.total_processes == 0 {
            return Err(SimError::Config("total child processes must be at least one".into()));
        }
        if self.simultaneous == 0 {
            return Err(SimError::Config("simultaneous processes must be positive".into()));
        }
        if self.launch_interval_ms == 0 {
            return Err(SimError::Config("launch interval must be positive".into()));
        }
        // the interval is added to a clock whose seconds field is 32 bits
        if self.launch_interval_ms / 1_000 > u32::MAX as u64 {
            return Err(SimError::Config(format!(
                "launch interval of {} ms overflows the simulated clock",
                self.launch_interval_ms
            )));
        }
        if self.tick_ns.0 > self.tick_ns.1 {
            return Err(SimError::Config(format!(
                "tick range {}..={} is empty",
                self.tick_ns.0, self.tick_ns.1
            )));
        }

        if self.simultaneous > MAX_SIMULTANEOUS {
            warn!(
                "simultaneous processes cannot exceed {MAX_SIMULTANEOUS}, using {MAX_SIMULTANEOUS}"
            );
            self.simultaneous = MAX_SIMULTANEOUS;
        }
        if self.simultaneous > self.geometry.slots {
            return Err(SimError::Config(format!(
                "{} simultaneous processes do not fit {} process slots",
                self.simultaneous, self.geometry.slots
            )));
        }
        // each blocked worker holds one queue entry; the queue is bounded by the frame count
        if self.simultaneous > self.geometry.frames {
            return Err(SimError::Config(format!(
                "{} simultaneous processes exceed {} frames",
                self.simultaneous, self.geometry.frames
            )));
        }
        Ok(self)
    }
}

/// Simulated memory management: workers issue accesses, the coordinator
/// resolves page faults with LRU replacement.
#[derive(Parser, Debug)]
#[command(name = "oss", version, about, long_about = None)]
pub struct Cli {
    /// Total number of user processes to launch
    #[arg(short = 'n', value_name = "PROC", default_value_t = DEFAULT_TOTAL_PROCESSES)]
    pub total: usize,

    /// Maximum number of simultaneous processes
    #[arg(short = 's', value_name = "SIMUL", default_value_t = DEFAULT_SIMULTANEOUS)]
    pub simultaneous: usize,

    /// Simulated milliseconds between process launches
    #[arg(short = 'i', value_name = "INTERVAL", default_value_t = DEFAULT_LAUNCH_INTERVAL_MS)]
    pub interval: u64,

    /// Log file for the simulation report
    #[arg(short = 'f', value_name = "LOGFILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Echo the report to the screen as well
    #[arg(short, long)]
    pub verbose: bool,

    /// Seed for the clock increments and the workers
    #[arg(long)]
    pub seed: Option<u64>,

    /// Real seconds before the run is stopped
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_WALL_BUDGET_SECS)]
    pub budget: u64,
}

impl Cli {
    pub fn into_config(self) -> Result<SimConfig> {
        SimConfig {
            total_processes: self.total,
            simultaneous: self.simultaneous,
            launch_interval_ms: self.interval,
            log_file: self.log_file,
            verbose: self.verbose,
            wall_budget: Duration::from_secs(self.budget),
            seed: self.seed,
            ..SimConfig::default()
        }
        .validate()
    }
}
