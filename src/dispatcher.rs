//! The coordinator loop.
//!
//! One tick runs `AdvanceClock → DrainIO → ReapTerminated → AdmitNew →
//! ReceiveRequests`. The dispatcher is the only writer of the process table,
//! the frame table and the I/O queue, so none of them need locking. Workers
//! are reached only through a [`WorkerHost`].

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::constants::{HIT_SERVICE_NS, IO_DELAY_NS};
use crate::error::{Result, SimError};
use crate::io_queue::{PendingFault, PendingIoQueue};
use crate::memory::MemoryMap;
use crate::process::{FrameIndex, ProcessDirectory, ProcessId, SlotIndex};
use crate::protocol::{Reply, Request, SimEvent, WorkerHost};
use crate::replacement::{Lru, ReplacementPolicy};
use crate::stats::{Statistics, Summary};

/// How a request was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit(Reply),
    /// Fault resolved with a free frame; the reply goes out immediately.
    Loaded(Reply),
    /// Fault waiting on the I/O queue; the reply is withheld.
    Queued,
}

impl Outcome {
    pub fn reply(&self) -> Option<Reply> {
        match self {
            Outcome::Hit(reply) | Outcome::Loaded(reply) => Some(*reply),
            Outcome::Queued => None,
        }
    }
}

pub struct RequestDispatcher<P = Lru> {
    clock: SimClock,
    directory: ProcessDirectory,
    memory: MemoryMap,
    io_queue: PendingIoQueue,
    stats: Statistics,
    policy: P,
    rng: StdRng,

    total_target: usize,
    concurrency_limit: usize,
    launch_interval_ns: u64,
    tick_ns: (u32, u32),
    page_size: u32,
    address_limit: u32,

    launched: usize,
    next_launch: SimClock,
    last_dump_second: u32,
    events: Vec<SimEvent>,
}

impl RequestDispatcher<Lru> {
    pub fn new(config: &SimConfig) -> Self {
        Self::with_policy(config, Lru)
    }
}

impl<P: ReplacementPolicy> RequestDispatcher<P> {
    pub fn with_policy(config: &SimConfig, policy: P) -> Self {
        let geometry = config.geometry;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RequestDispatcher {
            clock: SimClock::ZERO,
            directory: ProcessDirectory::new(geometry.slots, geometry.pages),
            memory: MemoryMap::new(geometry.frames),
            io_queue: PendingIoQueue::new(geometry.frames),
            stats: Statistics::default(),
            policy,
            rng,
            total_target: config.total_processes,
            concurrency_limit: config.simultaneous,
            launch_interval_ns: config.launch_interval_ns(),
            tick_ns: config.tick_ns,
            page_size: geometry.page_size,
            address_limit: geometry.address_limit(),
            launched: 0,
            next_launch: SimClock::ZERO,
            last_dump_second: 0,
            events: Vec::new(),
        }
    }

    pub fn clock(&self) -> SimClock {
        self.clock
    }

    pub fn directory(&self) -> &ProcessDirectory {
        &self.directory
    }

    pub fn memory(&self) -> &MemoryMap {
        &self.memory
    }

    pub fn io_queue(&self) -> &PendingIoQueue {
        &self.io_queue
    }

    pub fn stats(&self) -> Statistics {
        self.stats
    }

    pub fn launched(&self) -> usize {
        self.launched
    }

    pub fn active_count(&self) -> usize {
        self.directory.active_count()
    }

    /// Every worker has been launched and has exited.
    pub fn is_finished(&self) -> bool {
        self.launched >= self.total_target && self.active_count() == 0
    }

    /// Events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn summary(&self) -> Summary {
        self.stats.summary(self.clock)
    }

    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.memory.check_invariants(&self.directory)?;
        for fault in self.io_queue.iter() {
            let live = self
                .directory
                .slot(fault.slot)
                .is_some_and(|slot| slot.occupied && slot.identity == fault.identity);
            if !live {
                return Err(format!("pending fault references stale slot {}", fault.slot));
            }
        }
        if self.stats.total_page_faults > self.stats.total_accesses {
            return Err("more page faults than accesses".into());
        }
        Ok(())
    }

    /// Run one full tick. Only fatal errors are returned.
    pub fn step<H: WorkerHost>(&mut self, host: &mut H) -> Result<()> {
        let (min, max) = self.tick_ns;
        let increment = self.rng.gen_range(min..=max);
        self.advance_clock(increment as u64);

        self.drain_io(host)?;
        self.reap_terminated(host);
        self.admit_new(host)?;
        self.receive_requests(host)?;
        self.dump_if_due();
        Ok(())
    }

    pub fn advance_clock(&mut self, nanos: u64) {
        self.clock.advance_ns(nanos);
    }

    /// Complete every pending fault whose deadline has passed, in FIFO order.
    pub fn drain_io<H: WorkerHost>(&mut self, host: &mut H) -> Result<usize> {
        let mut completed = 0;
        while let Some(fault) = self.io_queue.peek_ready(self.clock).copied() {
            self.io_queue.dequeue();
            if let Some(reply) = self.complete_fault(fault)? {
                self.deliver(host, reply);
                completed += 1;
            }
        }
        Ok(completed)
    }

    /// Load the page of a pending fault and produce its deferred reply.
    fn complete_fault(&mut self, fault: PendingFault) -> Result<Option<Reply>> {
        let live = self
            .directory
            .slot(fault.slot)
            .is_some_and(|slot| slot.occupied && slot.identity == fault.identity);
        if !live {
            warn!("dropping pending fault of departed {}", fault.identity);
            return Ok(None);
        }

        let frame = self.acquire_frame()?;
        self.memory.bind(
            &mut self.directory,
            fault.slot,
            fault.page,
            frame,
            self.clock,
            fault.is_write,
        );
        self.directory.set_blocked(fault.slot, false);
        self.events.push(SimEvent::Loaded {
            identity: fault.identity,
            page: fault.page,
            frame,
            at: self.clock,
        });
        debug!(
            "{} page {} loaded into frame {} at {}",
            fault.identity, fault.page, frame, self.clock
        );
        Ok(Some(Reply {
            sender: fault.identity,
            address: fault.address,
            is_write: fault.is_write,
        }))
    }

    /// Pick a frame, evicting and charging the write-back if needed.
    /// The returned frame is free.
    fn acquire_frame(&mut self) -> Result<FrameIndex> {
        let frame = self
            .policy
            .choose_frame(self.memory.frames())
            .ok_or_else(|| SimError::Config("frame table is empty".into()))?;

        if self.memory.frames()[frame].dirty {
            self.clock.advance_ns(IO_DELAY_NS);
            self.events.push(SimEvent::WriteBack {
                frame,
                charged_ns: IO_DELAY_NS,
                at: self.clock,
            });
        }
        if let Some(eviction) = self.memory.unbind(&mut self.directory, frame) {
            let identity = self
                .directory
                .slot(eviction.owner.slot)
                .filter(|slot| slot.occupied)
                .map(|slot| slot.identity);
            debug!(
                "evicting slot {} page {} from frame {}",
                eviction.owner.slot, eviction.owner.page, frame
            );
            self.events.push(SimEvent::Evicted {
                frame,
                owner: eviction.owner,
                identity,
                dirty: eviction.dirty,
                at: self.clock,
            });
        }
        Ok(frame)
    }

    /// Reap every worker the host reports as exited.
    pub fn reap_terminated<H: WorkerHost>(&mut self, host: &mut H) {
        for identity in host.poll_exited() {
            if let Err(err) = self.reap(identity) {
                warn!("ignoring exit notice: {err}");
            }
        }
    }

    /// Drop the worker's pending faults, reclaim its frames and free its slot.
    pub fn reap(&mut self, identity: ProcessId) -> Result<SlotIndex> {
        let slot = self.directory.find(identity)?;
        let dropped_faults = self.io_queue.drop_slot(slot);
        let frames_released = self.memory.reclaim(&mut self.directory, slot);
        self.directory.release(slot);

        info!(
            "{identity} terminated at {}, released {frames_released} frames",
            self.clock
        );
        if dropped_faults > 0 {
            warn!("{identity} exited with {dropped_faults} unresolved fault(s)");
        }
        self.events.push(SimEvent::Reaped {
            identity,
            slot,
            frames_released,
            dropped_faults,
            at: self.clock,
        });
        Ok(slot)
    }

    /// Launch a worker if the admission rules allow it this tick.
    pub fn admit_new<H: WorkerHost>(&mut self, host: &mut H) -> Result<Option<SlotIndex>> {
        if self.launched >= self.total_target
            || self.active_count() >= self.concurrency_limit
            || self.clock < self.next_launch
        {
            return Ok(None);
        }
        if self.active_count() >= self.directory.capacity() {
            debug!("{}, admission deferred", SimError::CapacityExceeded);
            return Ok(None);
        }

        let identity = match host.spawn() {
            Ok(identity) => identity,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("{err}, admission deferred");
                return Ok(None);
            }
        };
        let slot = match self.directory.admit(identity, self.clock) {
            Ok(slot) => slot,
            Err(err) => {
                warn!("could not admit {identity}: {err}");
                if let Err(err) = host.terminate(identity) {
                    warn!("failed to stop unadmitted {identity}: {err}");
                }
                return Ok(None);
            }
        };

        self.launched += 1;
        self.next_launch = self.clock.plus_ns(self.launch_interval_ns);
        info!("{identity} admitted to slot {slot} at {}", self.clock);
        self.events.push(SimEvent::Admitted {
            identity,
            slot,
            at: self.clock,
        });
        Ok(Some(slot))
    }

    /// Classify every request currently queued at the host.
    ///
    /// The queue is drained before any reply goes out, so requests sent in
    /// response to this call wait for the next tick.
    pub fn receive_requests<H: WorkerHost>(&mut self, host: &mut H) -> Result<usize> {
        let batch: Vec<Request> = std::iter::from_fn(|| host.try_recv()).collect();
        let mut handled = 0;
        for request in batch {
            match self.handle_request(request) {
                Ok(outcome) => {
                    if let Some(reply) = outcome.reply() {
                        self.deliver(host, reply);
                    }
                    handled += 1;
                }
                Err(err) if err.is_fatal() => {
                    error!("invariant violated: {err}");
                    return Err(err);
                }
                Err(err @ SimError::UnknownSender(_)) => warn!("dropping request: {err}"),
                Err(err) => error!("dropping request: {err}"),
            }
        }
        Ok(handled)
    }

    /// Classify one request as a hit, an immediate load or a queued fault.
    pub fn handle_request(&mut self, request: Request) -> Result<Outcome> {
        let slot = self.directory.find(request.sender)?;
        if request.address >= self.address_limit {
            return Err(SimError::InvalidAddress {
                address: request.address,
                limit: self.address_limit,
            });
        }
        if self.directory.is_blocked(slot) {
            return Err(SimError::AlreadyBlocked(request.sender));
        }

        let page = (request.address / self.page_size) as usize;
        self.events.push(SimEvent::Requested {
            identity: request.sender,
            address: request.address,
            is_write: request.is_write,
            at: self.clock,
        });

        if let Some(frame) = self.memory.translate(&self.directory, slot, page) {
            self.memory.touch(frame, self.clock, request.is_write);
            self.clock.advance_ns(HIT_SERVICE_NS);
            self.stats.record_hit();
            debug!("{} hit page {page} in frame {frame}", request.sender);
            self.events.push(SimEvent::Hit {
                identity: request.sender,
                address: request.address,
                frame,
                is_write: request.is_write,
                at: self.clock,
            });
            return Ok(Outcome::Hit(request.into()));
        }

        self.stats.record_fault();
        if self.memory.has_free_frame() {
            self.events.push(SimEvent::Fault {
                identity: request.sender,
                address: request.address,
                page,
                queued: false,
                at: self.clock,
            });
            let frame = self.acquire_frame()?;
            self.memory
                .bind(&mut self.directory, slot, page, frame, self.clock, request.is_write);
            debug!("{} faulted page {page} into free frame {frame}", request.sender);
            self.events.push(SimEvent::Loaded {
                identity: request.sender,
                page,
                frame,
                at: self.clock,
            });
            return Ok(Outcome::Loaded(request.into()));
        }

        let due_at = self.clock.plus_ns(IO_DELAY_NS);
        self.io_queue.enqueue(PendingFault {
            slot,
            identity: request.sender,
            page,
            address: request.address,
            is_write: request.is_write,
            due_at,
        })?;
        self.directory.set_blocked(slot, true);
        debug!("{} faulted page {page}, queued until {due_at}", request.sender);
        self.events.push(SimEvent::Fault {
            identity: request.sender,
            address: request.address,
            page,
            queued: true,
            at: self.clock,
        });
        Ok(Outcome::Queued)
    }

    fn deliver<H: WorkerHost>(&mut self, host: &mut H, reply: Reply) {
        self.events.push(SimEvent::Granted {
            identity: reply.sender,
            address: reply.address,
            is_write: reply.is_write,
            at: self.clock,
        });
        if let Err(err) = host.send_reply(reply) {
            warn!("reply to {} not delivered: {err}", reply.sender);
        }
    }

    /// Record a memory-map snapshot once per simulated second.
    fn dump_if_due(&mut self) {
        if self.clock.seconds > self.last_dump_second {
            self.last_dump_second = self.clock.seconds;
            self.events
                .push(SimEvent::MemoryMap(self.memory.snapshot(&self.directory, self.clock)));
        }
    }

    pub fn snapshot(&self) -> SimEvent {
        SimEvent::MemoryMap(self.memory.snapshot(&self.directory, self.clock))
    }

    /// Release every table entry. Returns the workers that were still
    /// admitted so the host can stop them. Calling it again is a no-op.
    pub fn shutdown(&mut self) -> Vec<ProcessId> {
        let remaining: Vec<(SlotIndex, ProcessId)> = self
            .directory
            .occupied()
            .map(|(slot, entry)| (slot, entry.identity))
            .collect();

        self.io_queue.clear();
        self.memory.clear(&mut self.directory);
        for &(slot, _) in &remaining {
            self.directory.release(slot);
        }
        if !remaining.is_empty() {
            info!("shutdown released {} process slot(s)", remaining.len());
        }
        remaining.into_iter().map(|(_, identity)| identity).collect()
    }
}
