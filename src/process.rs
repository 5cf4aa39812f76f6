use std::fmt;

use crate::clock::SimClock;
use crate::error::{Result, SimError};

pub type SlotIndex = usize;
pub type PageNumber = usize;
pub type FrameIndex = usize;

/// Identity of a worker as assigned by the host that spawned it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// One entry of the process table.
#[derive(Debug, Clone)]
pub struct ProcessSlot {
    pub occupied: bool,
    pub identity: ProcessId,
    pub admitted_at: SimClock,
    /// `Some(frame)` when the page is resident.
    pub page_table: Vec<Option<FrameIndex>>,
    /// Set while the process waits on a pending fault.
    pub blocked: bool,
}

impl ProcessSlot {
    fn vacant(pages: usize) -> Self {
        ProcessSlot {
            occupied: false,
            identity: ProcessId::default(),
            admitted_at: SimClock::ZERO,
            page_table: vec![None; pages],
            blocked: false,
        }
    }

    /// Pages currently mapped to a frame.
    pub fn resident_pages(&self) -> usize {
        self.page_table.iter().filter(|entry| entry.is_some()).count()
    }
}

/// Fixed-capacity table of admitted workers.
#[derive(Debug, Clone)]
pub struct ProcessDirectory {
    slots: Vec<ProcessSlot>,
}

impl ProcessDirectory {
    pub fn new(capacity: usize, pages: usize) -> Self {
        ProcessDirectory {
            slots: (0..capacity).map(|_| ProcessSlot::vacant(pages)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Place `identity` in the first unoccupied slot.
    pub fn admit(&mut self, identity: ProcessId, now: SimClock) -> Result<SlotIndex> {
        if self.find(identity).is_ok() {
            return Err(SimError::DuplicateIdentity(identity));
        }
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.occupied)
            .ok_or(SimError::CapacityExceeded)?;

        let slot = &mut self.slots[index];
        slot.occupied = true;
        slot.identity = identity;
        slot.admitted_at = now;
        slot.blocked = false;
        slot.page_table.fill(None);
        Ok(index)
    }

    /// Mark a slot unoccupied. Frames must already have been reclaimed.
    pub fn release(&mut self, index: SlotIndex) {
        if let Some(slot) = self.slots.get_mut(index) {
            debug_assert!(
                slot.page_table.iter().all(Option::is_none),
                "released slot {index} still maps frames"
            );
            let pages = slot.page_table.len();
            *slot = ProcessSlot::vacant(pages);
        }
    }

    pub fn find(&self, identity: ProcessId) -> Result<SlotIndex> {
        self.slots
            .iter()
            .position(|slot| slot.occupied && slot.identity == identity)
            .ok_or(SimError::UnknownSender(identity))
    }

    #[inline]
    pub fn slot(&self, index: SlotIndex) -> Option<&ProcessSlot> {
        self.slots.get(index)
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, index: SlotIndex) -> Option<&mut ProcessSlot> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[ProcessSlot] {
        &self.slots
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupied).count()
    }

    /// Occupied slots with their indices.
    pub fn occupied(&self) -> impl Iterator<Item = (SlotIndex, &ProcessSlot)> + '_ {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.occupied)
    }

    pub fn is_blocked(&self, index: SlotIndex) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.blocked)
    }

    pub fn set_blocked(&mut self, index: SlotIndex, blocked: bool) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.blocked = blocked;
        }
    }
}
