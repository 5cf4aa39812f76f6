use crate::clock::SimClock;
use crate::process::{FrameIndex, PageNumber, ProcessDirectory, ProcessId, SlotIndex};

/// The `(process slot, page)` pair a frame is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageOwner {
    pub slot: SlotIndex,
    pub page: PageNumber,
}

/// One entry of the global frame table. Frames carry metadata only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSlot {
    pub occupied: bool,
    pub dirty: bool,
    pub owner: Option<PageOwner>,
    pub last_reference: SimClock,
}

/// What `unbind` took out of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub frame: FrameIndex,
    pub owner: PageOwner,
    pub dirty: bool,
}

/// Global frame table. Page tables live in the [`ProcessDirectory`]; every
/// operation that changes a mapping takes the directory so both sides move
/// together.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    frames: Vec<FrameSlot>,
}

impl MemoryMap {
    /// Create a frame table with every frame free
    pub fn new(frame_count: usize) -> Self {
        MemoryMap {
            frames: vec![FrameSlot::default(); frame_count],
        }
    }

    #[inline]
    pub fn frames(&self) -> &[FrameSlot] {
        &self.frames
    }

    #[inline]
    pub fn frame(&self, index: FrameIndex) -> Option<&FrameSlot> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frames(&self) -> usize {
        self.frames.iter().filter(|frame| !frame.occupied).count()
    }

    pub fn has_free_frame(&self) -> bool {
        self.frames.iter().any(|frame| !frame.occupied)
    }

    /// Look up the frame holding `page` of the process in `slot`
    #[inline]
    pub fn translate(
        &self,
        directory: &ProcessDirectory,
        slot: SlotIndex,
        page: PageNumber,
    ) -> Option<FrameIndex> {
        directory
            .slot(slot)
            .filter(|entry| entry.occupied)
            .and_then(|entry| entry.page_table.get(page).copied().flatten())
    }

    /// Load `page` of `slot` into `frame`, updating the page table and the
    /// frame owner together. The frame must be free.
    pub fn bind(
        &mut self,
        directory: &mut ProcessDirectory,
        slot: SlotIndex,
        page: PageNumber,
        frame: FrameIndex,
        now: SimClock,
        is_write: bool,
    ) {
        debug_assert!(!self.frames[frame].occupied, "bind into occupied frame {frame}");
        debug_assert!(
            self.translate(directory, slot, page).is_none(),
            "page {page} of slot {slot} is already resident"
        );

        if let Some(entry) = directory.slot_mut(slot) {
            entry.page_table[page] = Some(frame);
        }
        self.frames[frame] = FrameSlot {
            occupied: true,
            dirty: is_write,
            owner: Some(PageOwner { slot, page }),
            last_reference: now,
        };
    }

    /// Empty `frame`, clearing the owner's page-table entry as well.
    /// Returns `None` if the frame was already free.
    pub fn unbind(&mut self, directory: &mut ProcessDirectory, frame: FrameIndex) -> Option<Eviction> {
        let slot = self.frames.get_mut(frame)?;
        let previous = std::mem::take(slot);
        let owner = previous.owner?;

        if let Some(entry) = directory.slot_mut(owner.slot) {
            if entry.page_table.get(owner.page) == Some(&Some(frame)) {
                entry.page_table[owner.page] = None;
            }
        }
        Some(Eviction {
            frame,
            owner,
            dirty: previous.dirty,
        })
    }

    /// Record a hit on a resident frame.
    #[inline]
    pub fn touch(&mut self, frame: FrameIndex, now: SimClock, is_write: bool) {
        let slot = &mut self.frames[frame];
        slot.last_reference = now;
        slot.dirty |= is_write;
    }

    /// Release every frame owned by `slot`. Returns the number released.
    pub fn reclaim(&mut self, directory: &mut ProcessDirectory, slot: SlotIndex) -> usize {
        let owned: Vec<FrameIndex> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.owner.is_some_and(|owner| owner.slot == slot))
            .map(|(index, _)| index)
            .collect();

        for &frame in &owned {
            self.unbind(directory, frame);
        }
        owned.len()
    }

    /// Release every frame.
    pub fn clear(&mut self, directory: &mut ProcessDirectory) {
        for frame in 0..self.frames.len() {
            self.unbind(directory, frame);
        }
    }

    pub fn snapshot(&self, directory: &ProcessDirectory, at: SimClock) -> MemorySnapshot {
        MemorySnapshot {
            at,
            frames: self.frames.clone(),
            processes: directory
                .occupied()
                .map(|(slot, entry)| ProcessRow {
                    slot,
                    identity: entry.identity,
                    admitted_at: entry.admitted_at,
                    page_table: entry.page_table.clone(),
                })
                .collect(),
        }
    }

    /// Verify the frame-table and page-table consistency rules.
    pub fn check_invariants(&self, directory: &ProcessDirectory) -> Result<(), String> {
        for (index, frame) in self.frames.iter().enumerate() {
            if !frame.occupied {
                if frame.owner.is_some() || frame.dirty {
                    return Err(format!("free frame {index} has an owner or dirty bit"));
                }
                continue;
            }
            let owner = frame
                .owner
                .ok_or_else(|| format!("occupied frame {index} has no owner"))?;
            if self.translate(directory, owner.slot, owner.page) != Some(index) {
                return Err(format!(
                    "frame {index} owned by slot {} page {} but the page table disagrees",
                    owner.slot, owner.page
                ));
            }
        }

        for (slot, entry) in directory.slots().iter().enumerate() {
            for (page, mapping) in entry.page_table.iter().enumerate() {
                let Some(frame) = *mapping else { continue };
                if !entry.occupied {
                    return Err(format!("vacant slot {slot} maps page {page}"));
                }
                let owner = self.frames.get(frame).and_then(|f| f.owner);
                if owner != Some(PageOwner { slot, page }) {
                    return Err(format!(
                        "slot {slot} page {page} maps frame {frame} owned by {owner:?}"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Page table of one admitted process, as captured in a [`MemorySnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub slot: SlotIndex,
    pub identity: ProcessId,
    pub admitted_at: SimClock,
    pub page_table: Vec<Option<FrameIndex>>,
}

/// Copy of the frame table and page tables at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub at: SimClock,
    pub frames: Vec<FrameSlot>,
    pub processes: Vec<ProcessRow>,
}
