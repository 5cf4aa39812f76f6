use std::collections::VecDeque;

use crate::clock::SimClock;
use crate::error::{Result, SimError};
use crate::process::{PageNumber, ProcessId, SlotIndex};

/// A page fault waiting for its simulated disk read to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFault {
    pub slot: SlotIndex,
    pub identity: ProcessId,
    pub page: PageNumber,
    pub address: u32,
    pub is_write: bool,
    pub due_at: SimClock,
}

/// Bounded FIFO of pending faults. Only the head is ever serviced.
#[derive(Debug, Clone)]
pub struct PendingIoQueue {
    entries: VecDeque<PendingFault>,
    capacity: usize,
}

impl PendingIoQueue {
    pub fn new(capacity: usize) -> Self {
        PendingIoQueue {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, fault: PendingFault) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(SimError::QueueSaturated { capacity: self.capacity });
        }
        self.entries.push_back(fault);
        Ok(())
    }

    /// The head entry, if its deadline has passed.
    pub fn peek_ready(&self, now: SimClock) -> Option<&PendingFault> {
        self.entries.front().filter(|fault| now >= fault.due_at)
    }

    pub fn dequeue(&mut self) -> Option<PendingFault> {
        self.entries.pop_front()
    }

    /// Remove every entry belonging to `slot`, keeping the order of the rest.
    pub fn drop_slot(&mut self, slot: SlotIndex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|fault| fault.slot != slot);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingFault> + '_ {
        self.entries.iter()
    }
}
