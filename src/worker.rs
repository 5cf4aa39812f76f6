//! Thread-backed workers.
//!
//! Each worker issues random accesses over its address space and blocks on
//! its own reply channel after every request. Requests share one channel into
//! the coordinator; exit notices travel on a third.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::MemoryGeometry;
use crate::constants::{MAX_WORKER_ACCESSES, MIN_WORKER_ACCESSES, READ_BIAS};
use crate::error::{Result, SimError};
use crate::process::ProcessId;
use crate::protocol::{Reply, Request, WorkerHost};

/// Access pattern of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerProfile {
    pub pages: u32,
    pub page_size: u32,
    /// Percentage of accesses that are reads.
    pub read_bias: u32,
    /// Inclusive range of accesses before the worker exits.
    pub lifetime: (u32, u32),
}

impl WorkerProfile {
    pub fn new(geometry: &MemoryGeometry) -> Self {
        WorkerProfile {
            pages: geometry.pages as u32,
            page_size: geometry.page_size,
            read_bias: READ_BIAS,
            lifetime: (MIN_WORKER_ACCESSES, MAX_WORKER_ACCESSES),
        }
    }

    /// Draw the next access.
    pub fn next_access<R: Rng>(&self, rng: &mut R) -> (u32, bool) {
        let page = rng.gen_range(0..self.pages);
        let offset = rng.gen_range(0..self.page_size);
        let is_write = rng.gen_range(0..100) >= self.read_bias;
        (page * self.page_size + offset, is_write)
    }
}

fn run_worker(
    identity: ProcessId,
    profile: WorkerProfile,
    mut rng: StdRng,
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    exits: Sender<ProcessId>,
) {
    let lifetime = rng.gen_range(profile.lifetime.0..=profile.lifetime.1);
    let mut completed = 0;
    while completed < lifetime {
        let (address, is_write) = profile.next_access(&mut rng);
        let request = Request { sender: identity, address, is_write };
        if requests.send(request).is_err() {
            break;
        }
        // a closed reply channel means the coordinator terminated us
        if replies.recv().is_err() {
            break;
        }
        completed += 1;
    }
    debug!("{identity} exiting after {completed} accesses");
    exits.send(identity).ok();
}

/// [`WorkerHost`] that runs each worker on its own OS thread.
pub struct ThreadHost {
    profile: WorkerProfile,
    seeds: StdRng,
    next_id: u32,
    request_tx: Sender<Request>,
    request_rx: Receiver<Request>,
    exit_tx: Sender<ProcessId>,
    exit_rx: Receiver<ProcessId>,
    replies: HashMap<ProcessId, Sender<Reply>>,
    handles: HashMap<ProcessId, JoinHandle<()>>,
}

impl ThreadHost {
    pub fn new(profile: WorkerProfile, seed: Option<u64>) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();
        let seeds = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ThreadHost {
            profile,
            seeds,
            next_id: 1,
            request_tx,
            request_rx,
            exit_tx,
            exit_rx,
            replies: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn running(&self) -> usize {
        self.replies.len()
    }

    /// Stop every worker and wait for its thread.
    pub fn shutdown(&mut self) -> Result<()> {
        self.replies.clear();
        let mut failed = Vec::new();
        for (identity, handle) in self.handles.drain() {
            if handle.join().is_err() {
                failed.push(identity);
            }
        }
        // drain notices from workers that exited during teardown
        while self.exit_rx.try_recv().is_ok() {}

        if failed.is_empty() {
            Ok(())
        } else {
            Err(SimError::ResourceTeardown(format!(
                "{} worker thread(s) panicked",
                failed.len()
            )))
        }
    }
}

impl WorkerHost for ThreadHost {
    fn spawn(&mut self) -> Result<ProcessId> {
        let identity = ProcessId(self.next_id);
        let (reply_tx, reply_rx) = mpsc::channel();
        let requests = self.request_tx.clone();
        let exits = self.exit_tx.clone();
        let profile = self.profile;
        let rng = StdRng::seed_from_u64(self.seeds.next_u64());

        let handle = thread::Builder::new()
            .name(format!("worker-{}", identity.0))
            .spawn(move || run_worker(identity, profile, rng, requests, reply_rx, exits))
            .map_err(|err| SimError::Spawn(err.to_string()))?;

        self.next_id += 1;
        self.replies.insert(identity, reply_tx);
        self.handles.insert(identity, handle);
        Ok(identity)
    }

    fn poll_exited(&mut self) -> Vec<ProcessId> {
        let mut exited = Vec::new();
        loop {
            match self.exit_rx.try_recv() {
                Ok(identity) => {
                    self.replies.remove(&identity);
                    if let Some(handle) = self.handles.remove(&identity) {
                        if handle.join().is_err() {
                            warn!("{identity} panicked");
                        }
                    }
                    exited.push(identity);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        exited
    }

    fn try_recv(&mut self) -> Option<Request> {
        self.request_rx.try_recv().ok()
    }

    fn send_reply(&mut self, reply: Reply) -> Result<()> {
        let channel = self
            .replies
            .get(&reply.sender)
            .ok_or(SimError::UnknownSender(reply.sender))?;
        channel
            .send(reply)
            .map_err(|_| SimError::UnknownSender(reply.sender))
    }

    fn terminate(&mut self, identity: ProcessId) -> Result<()> {
        // dropping the reply sender wakes the worker with a receive error
        self.replies
            .remove(&identity)
            .map(drop)
            .ok_or(SimError::UnknownSender(identity))
    }
}
