//! Slot identity allocation.
//!
//! Every distinct stack location that ever holds a reference receives a
//! dense, zero-based slot id. The downstream encoding's bit layout depends
//! on ids being issued category-by-category: all pinned ids below all
//! tracked ids below all untracked-aggregate ids. The registry enforces
//! that ordering at allocation time rather than sorting after the fact.

use crate::error::GcInfoError;
use rustc_hash::FxHashMap;
use std::fmt;

// =============================================================================
// SlotId
// =============================================================================

/// Dense, zero-based identifier of a reference-bearing stack slot.
///
/// Ids are contiguous and monotonically increasing in allocation order;
/// once assigned, an id is never reassigned or reused within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u32);

impl SlotId {
    /// Create a slot id from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        SlotId(index)
    }

    /// The raw index of this slot.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

// =============================================================================
// SlotCategory
// =============================================================================

/// Allocation category of a slot.
///
/// Categories allocate in ascending rank order within one function:
/// `Pinned`, then `Tracked`, then `UntrackedAggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotCategory {
    /// Address must not move; always reported live, never liveness-tracked.
    Pinned = 0,
    /// Ordinary stack slot whose liveness changes per safepoint.
    Tracked = 1,
    /// Reference-bearing sub-offset of an aggregate; live for its entire
    /// scope, never liveness-tracked.
    UntrackedAggregate = 2,
}

// =============================================================================
// SlotRegistry
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct SlotInfo {
    offset: i32,
    category: SlotCategory,
}

/// Maps stack offsets to stable slot ids, enforcing category ordering.
///
/// Allocation is strictly append-only: no id is ever freed or renumbered.
/// Re-deriving a previously seen offset returns the id assigned the first
/// time.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    /// Offset → id for every slot allocated so far.
    map: FxHashMap<i32, SlotId>,
    /// Dense per-id info; `slots[id.index()]` is the slot's record.
    slots: Vec<SlotInfo>,
    /// Highest category that has allocated so far.
    frontier: Option<SlotCategory>,
    /// First and last id issued per category rank, if any.
    ranges: [Option<(u32, u32)>; 3],
}

impl SlotRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `offset`, allocating a fresh one if the offset has
    /// never been seen. The bool is true when a new slot was allocated.
    ///
    /// A previously seen offset must carry the same category; a conflicting
    /// category is an upstream invariant violation (categories are
    /// disjoint) and fails with [`GcInfoError::DuplicateRegistration`].
    pub fn assign_or_get(
        &mut self,
        offset: i32,
        category: SlotCategory,
    ) -> Result<(SlotId, bool), GcInfoError> {
        if let Some(&id) = self.map.get(&offset) {
            let existing = self.slots[id.index()].category;
            if existing != category {
                return Err(GcInfoError::DuplicateRegistration {
                    offset,
                    existing,
                    requested: category,
                });
            }
            return Ok((id, false));
        }
        let id = self.allocate(offset, category)?;
        Ok((id, true))
    }

    /// Resolve a tracked-stream offset, allocating on first sight.
    ///
    /// Unlike [`assign_or_get`](Self::assign_or_get) this tolerates the
    /// offset resolving to a pinned slot: the upstream liveness stream
    /// legitimately reports pinned locations live, and the caller skips
    /// liveness marking for them. The bool is true when a new tracked slot
    /// was allocated.
    pub fn resolve_tracked(&mut self, offset: i32) -> Result<(SlotId, bool), GcInfoError> {
        if let Some(&id) = self.map.get(&offset) {
            return Ok((id, false));
        }
        let id = self.allocate(offset, SlotCategory::Tracked)?;
        Ok((id, true))
    }

    /// Allocate a contiguous run of fresh ids for offsets known to be new.
    ///
    /// `on_new` is invoked once per offset, in allocation order. Any offset
    /// already registered is a caller contract violation and fails with
    /// [`GcInfoError::DuplicateRegistration`].
    pub fn allocate_batch(
        &mut self,
        offsets: &[i32],
        category: SlotCategory,
        mut on_new: impl FnMut(SlotId, i32),
    ) -> Result<(), GcInfoError> {
        for &offset in offsets {
            if let Some(&id) = self.map.get(&offset) {
                return Err(GcInfoError::DuplicateRegistration {
                    offset,
                    existing: self.slots[id.index()].category,
                    requested: category,
                });
            }
            let id = self.allocate(offset, category)?;
            on_new(id, offset);
        }
        Ok(())
    }

    fn allocate(&mut self, offset: i32, category: SlotCategory) -> Result<SlotId, GcInfoError> {
        if let Some(frontier) = self.frontier {
            if category < frontier {
                return Err(GcInfoError::AllocationOrder {
                    requested: category,
                    frontier,
                });
            }
        }
        self.frontier = Some(category);

        let id = SlotId::new(self.slots.len() as u32);
        self.slots.push(SlotInfo { offset, category });
        self.map.insert(offset, id);

        let range = &mut self.ranges[category as usize];
        *range = match *range {
            None => Some((id.0, id.0)),
            Some((first, _)) => Some((first, id.0)),
        };
        Ok(id)
    }

    /// Look up the id for an offset without allocating.
    #[inline]
    pub fn get(&self, offset: i32) -> Option<SlotId> {
        self.map.get(&offset).copied()
    }

    /// Category of an allocated slot.
    #[inline]
    pub fn category(&self, id: SlotId) -> SlotCategory {
        self.slots[id.index()].category
    }

    /// Stack offset of an allocated slot.
    #[inline]
    pub fn offset(&self, id: SlotId) -> i32 {
        self.slots[id.index()].offset
    }

    /// Total number of slots allocated across all categories.
    #[inline]
    pub fn total_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of allocated slots in `category`.
    pub fn count(&self, category: SlotCategory) -> usize {
        match self.ranges[category as usize] {
            Some((first, last)) => (last - first + 1) as usize,
            None => 0,
        }
    }

    /// Number of pinned slots.
    #[inline]
    pub fn pinned_count(&self) -> usize {
        self.count(SlotCategory::Pinned)
    }

    /// Number of tracked slots.
    #[inline]
    pub fn tracked_count(&self) -> usize {
        self.count(SlotCategory::Tracked)
    }

    /// First and last id issued for `category`, if any slot exists there.
    #[inline]
    pub fn id_range(&self, category: SlotCategory) -> Option<(SlotId, SlotId)> {
        self.ranges[category as usize].map(|(first, last)| (SlotId::new(first), SlotId::new(last)))
    }
}

// =============================================================================
// Tests
// =============================================================================
