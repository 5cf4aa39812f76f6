//! Minimal `log` backend writing diagnostics to stderr.

use std::str::FromStr;

use log::{LevelFilter, Log, Metadata, Record};

use crate::error::{Result, SimError};

struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Level from `RUST_LOG` if it parses, else `Info` when verbose and `Warn`
/// otherwise.
pub fn level_for(verbose: bool, env: Option<&str>) -> LevelFilter {
    env.and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(if verbose { LevelFilter::Info } else { LevelFilter::Warn })
}

/// Install the logger. Fails if a logger is already set.
pub fn init(verbose: bool) -> Result<()> {
    let env = std::env::var("RUST_LOG").ok();
    let level = level_for(verbose, env.as_deref());
    log::set_boxed_logger(Box::new(StderrLogger { level }))
        .map(|()| log::set_max_level(level))
        .map_err(|err| SimError::Config(err.to_string()))
}
