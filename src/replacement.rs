//! Frame selection for page faults.
//!
//! A free frame is always preferred. When none is left the policy picks a
//! victim among the occupied frames; the caller is responsible for charging
//! the write-back delay when the victim is dirty and for unbinding it before
//! loading the new page.

use crate::memory::FrameSlot;
use crate::process::FrameIndex;

/// Chooses the frame a faulting page will be loaded into.
pub trait ReplacementPolicy {
    /// Pick a victim among `frames`, all of which are occupied.
    fn pick_victim(&self, frames: &[FrameSlot]) -> Option<FrameIndex>;

    /// Lowest-index free frame, else the policy's victim.
    /// Returns `None` only for an empty frame table.
    fn choose_frame(&self, frames: &[FrameSlot]) -> Option<FrameIndex> {
        frames
            .iter()
            .position(|frame| !frame.occupied)
            .or_else(|| self.pick_victim(frames))
    }
}

/// Least-recently-used: oldest `last_reference`, ties to the lowest index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lru;

impl ReplacementPolicy for Lru {
    fn pick_victim(&self, frames: &[FrameSlot]) -> Option<FrameIndex> {
        // min_by_key keeps the first of equal keys, giving the lowest index
        frames
            .iter()
            .enumerate()
            .min_by_key(|(_, frame)| frame.last_reference)
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::memory::PageOwner;

    fn used(page: usize, seconds: u32, nanoseconds: u32, dirty: bool) -> FrameSlot {
        FrameSlot {
            occupied: true,
            dirty,
            owner: Some(PageOwner { slot: 0, page }),
            last_reference: SimClock { seconds, nanoseconds },
        }
    }

    #[test]
    fn test_free_frame_preferred() {
        let frames = vec![used(0, 0, 1, false), FrameSlot::default(), FrameSlot::default()];
        assert_eq!(Lru.choose_frame(&frames), Some(1));
    }

    #[test]
    fn test_lru_picks_oldest() {
        let frames = vec![
            used(0, 1, 500, false),
            used(1, 0, 999_999_999, true),
            used(2, 1, 0, false),
        ];
        assert_eq!(Lru.choose_frame(&frames), Some(1));
    }

    #[test]
    fn test_lru_lexicographic_comparison() {
        // seconds dominate nanoseconds
        let frames = vec![used(0, 2, 0, false), used(1, 1, 900_000_000, false)];
        assert_eq!(Lru.choose_frame(&frames), Some(1));
    }

    #[test]
    fn test_tie_breaks_to_lowest_index() {
        let frames = vec![
            used(0, 3, 0, false),
            used(1, 1, 7, false),
            used(2, 1, 7, true),
            used(3, 1, 7, false),
        ];
        for _ in 0..10 {
            assert_eq!(Lru.choose_frame(&frames), Some(1));
        }
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(Lru.choose_frame(&[]), None);
    }
}
