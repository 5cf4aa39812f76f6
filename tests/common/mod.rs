#![allow(dead_code)]

use std::collections::VecDeque;

use pagesim::config::{MemoryGeometry, SimConfig};
use pagesim::{ProcessId, Reply, Request, RequestDispatcher, Result, SimError, WorkerHost};

/// Host whose workers are scripted by the test.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    pub next_id: u32,
    pub spawned: Vec<ProcessId>,
    pub inbox: VecDeque<Request>,
    pub exited: Vec<ProcessId>,
    pub replies: Vec<Reply>,
    pub terminated: Vec<ProcessId>,
    pub fail_spawn: bool,
    /// Workers that send the same request again as soon as they are answered.
    pub eager: Vec<ProcessId>,
}

impl ScriptedHost {
    pub fn push(&mut self, sender: ProcessId, address: u32, is_write: bool) {
        self.inbox.push_back(Request { sender, address, is_write });
    }

    pub fn exit(&mut self, identity: ProcessId) {
        self.exited.push(identity);
    }

    pub fn replies_for(&self, identity: ProcessId) -> usize {
        self.replies.iter().filter(|r| r.sender == identity).count()
    }
}

impl WorkerHost for ScriptedHost {
    fn spawn(&mut self) -> Result<ProcessId> {
        if self.fail_spawn {
            return Err(SimError::Spawn("scripted failure".into()));
        }
        self.next_id += 1;
        let identity = ProcessId(1000 + self.next_id);
        self.spawned.push(identity);
        Ok(identity)
    }

    fn poll_exited(&mut self) -> Vec<ProcessId> {
        std::mem::take(&mut self.exited)
    }

    fn try_recv(&mut self) -> Option<Request> {
        self.inbox.pop_front()
    }

    fn send_reply(&mut self, reply: Reply) -> Result<()> {
        if self.eager.contains(&reply.sender) {
            self.push(reply.sender, reply.address, reply.is_write);
        }
        self.replies.push(reply);
        Ok(())
    }

    fn terminate(&mut self, identity: ProcessId) -> Result<()> {
        self.terminated.push(identity);
        Ok(())
    }
}

pub const LAUNCH_INTERVAL_NS: u64 = 1_000_000;

pub fn config(frames: usize, total: usize, simultaneous: usize) -> SimConfig {
    unchecked_config(frames, total, simultaneous)
        .validate()
        .expect("valid test config")
}

/// Like [`config`] but skips validation, for setups validation would refuse.
pub fn unchecked_config(frames: usize, total: usize, simultaneous: usize) -> SimConfig {
    SimConfig {
        total_processes: total,
        simultaneous,
        launch_interval_ms: 1,
        seed: Some(42),
        tick_ns: (1_000, 1_000),
        geometry: MemoryGeometry { frames, ..MemoryGeometry::default() },
        ..SimConfig::default()
    }
}

/// Admit `count` workers, advancing the clock past each launch interval.
pub fn admit(d: &mut RequestDispatcher, host: &mut ScriptedHost, count: usize) -> Vec<ProcessId> {
    (0..count)
        .map(|_| {
            d.advance_clock(LAUNCH_INTERVAL_NS);
            let slot = d.admit_new(host).unwrap().expect("admission allowed");
            d.directory().slot(slot).unwrap().identity
        })
        .collect()
}
