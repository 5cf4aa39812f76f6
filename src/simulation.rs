//! Drives a [`RequestDispatcher`] against real workers until every worker
//! finished, the wall-clock budget ran out, or an interrupt arrived.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use log::{error, info, warn};

use crate::config::SimConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::Result;
use crate::protocol::WorkerHost;
use crate::report::Reporter;
use crate::stats::Summary;
use crate::worker::{ThreadHost, WorkerProfile};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    BudgetExpired,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub stop: StopReason,
    pub summary: Summary,
    pub launched: usize,
}

/// Run a full simulation, writing the report to `config.log_file`.
pub fn run(config: &SimConfig, interrupted: &AtomicBool) -> Result<RunReport> {
    let mut reporter = Reporter::create(&config.log_file, config.verbose)?;
    let mut host = ThreadHost::new(WorkerProfile::new(&config.geometry), config.seed);
    let mut dispatcher = RequestDispatcher::new(config);
    let report = drive(config, &mut dispatcher, &mut host, &mut reporter, interrupted);

    // the tables and the workers are released on every exit path
    for identity in dispatcher.shutdown() {
        if let Err(err) = host.terminate(identity) {
            warn!("{identity} already gone at shutdown: {err}");
        }
    }
    let teardown = host.shutdown();
    reporter.flush()?;

    let report = report?;
    teardown?;
    info!("simulation finished: {:?}", report.stop);
    Ok(report)
}

/// The main loop against any host and report sink.
pub fn drive<H: WorkerHost, W: Write>(
    config: &SimConfig,
    dispatcher: &mut RequestDispatcher,
    host: &mut H,
    reporter: &mut Reporter<W>,
    interrupted: &AtomicBool,
) -> Result<RunReport> {
    let started = Instant::now();
    let stop = loop {
        if dispatcher.is_finished() {
            break StopReason::Completed;
        }
        if interrupted.load(Ordering::SeqCst) {
            warn!("interrupt caught, terminating all processes");
            break StopReason::Interrupted;
        }
        if started.elapsed() >= config.wall_budget {
            warn!("wall-clock budget elapsed, terminating all processes");
            break StopReason::BudgetExpired;
        }

        let stepped = dispatcher.step(host);
        for event in dispatcher.take_events() {
            reporter.record(&event)?;
        }
        if let Err(err) = stepped {
            error!("stopping simulation: {err}");
            return Err(err);
        }
        thread::yield_now();
    };

    reporter.record(&dispatcher.snapshot())?;
    let summary = dispatcher.summary();
    reporter.summary(&summary)?;
    Ok(RunReport {
        stop,
        summary,
        launched: dispatcher.launched(),
    })
}
