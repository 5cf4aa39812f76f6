//! oss - memory management coordinator
//!
//! Usage: oss [-n proc] [-s simul] [-i interval] [-f logfile] [-v]
//!
//! Options:
//!   -n proc      Total number of user processes to launch (default 40)
//!   -s simul     Maximum number of simultaneous processes (max 18)
//!   -i interval  Simulated milliseconds between launches (default 500)
//!   -f logfile   Report file (default oss.log)
//!   -v           Echo the report to the screen as well

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use log::{error, warn};

use pagesim::config::Cli;
use pagesim::{logger, simulation};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logger::init(cli.verbose) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("could not install interrupt handler: {}", e);
    }

    match simulation::run(&config, &interrupted) {
        Ok(report) => {
            if config.verbose {
                eprintln!(
                    "Stopped ({:?}) after launching {} processes; report in {}",
                    report.stop,
                    report.launched,
                    config.log_file.display()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
