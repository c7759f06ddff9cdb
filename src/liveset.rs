//! Incremental live-set tracking across a safepoint stream.
//!
//! The upstream liveness stream reports the absolute set of live locations
//! at each safepoint, while the downstream encoding wants births and deaths
//! relative to the previous safepoint. The tracker keeps two bitsets, one
//! bit per slot id, and emits the symmetric difference at each step.
//!
//! Pinned slots occupy the low ids but are permanently live as far as the
//! downstream format is concerned, so their bits are never set; we spend a
//! few unused bits rather than offsetting every index.

use crate::slot::SlotId;

/// Initial bitset capacity in bits; doubled whenever the slot count
/// outgrows it.
const INITIAL_CAPACITY: usize = 32;

const BITS_PER_WORD: usize = u64::BITS as usize;

// =============================================================================
// SlotState
// =============================================================================

/// Liveness transition of one slot between consecutive safepoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// The slot holds a live reference from this safepoint onward.
    Live,
    /// The slot no longer holds a live reference.
    Dead,
}

// =============================================================================
// LiveSetTracker
// =============================================================================

/// Previous/current live-set bitsets with symmetric-difference emission.
#[derive(Debug)]
pub struct LiveSetTracker {
    /// Live set as of the previous safepoint.
    previous: Vec<u64>,
    /// Live set being accumulated for the current safepoint.
    current: Vec<u64>,
    /// Capacity in bits.
    capacity: usize,
    /// Ids below this are pinned and excluded from liveness tracking.
    untracked_prefix: usize,
}

impl LiveSetTracker {
    /// Create a tracker for a function with `untracked_prefix` pinned slots.
    pub fn new(untracked_prefix: usize) -> Self {
        let mut capacity = INITIAL_CAPACITY;
        while capacity < untracked_prefix {
            capacity *= 2;
        }
        let words = capacity.div_ceil(BITS_PER_WORD);
        LiveSetTracker {
            previous: vec![0; words],
            current: vec![0; words],
            capacity,
            untracked_prefix,
        }
    }

    /// Clear the current set in preparation for the next safepoint.
    pub fn begin_safepoint(&mut self) {
        self.current.fill(0);
    }

    /// Grow both bitsets so at least `total_slots` bits are addressable.
    ///
    /// Existing bits are preserved. Growth doubles the capacity, so the
    /// amortized cost per slot is constant.
    pub fn ensure_capacity(&mut self, total_slots: usize) {
        if total_slots <= self.capacity {
            return;
        }
        while self.capacity < total_slots {
            self.capacity *= 2;
        }
        let words = self.capacity.div_ceil(BITS_PER_WORD);
        self.previous.resize(words, 0);
        self.current.resize(words, 0);
    }

    /// Mark a slot live at the current safepoint.
    ///
    /// No-op for pinned ids (they are permanently live downstream and must
    /// not produce transition events). The id must be within capacity; the
    /// driver grows the tracker whenever the registry allocates.
    #[inline]
    pub fn mark_live(&mut self, id: SlotId) {
        let index = id.index();
        if index < self.untracked_prefix {
            return;
        }
        debug_assert!(index < self.capacity, "slot id beyond bitset capacity");
        self.current[index / BITS_PER_WORD] |= 1u64 << (index % BITS_PER_WORD);
    }

    /// Emit the liveness transitions between the previous and current
    /// safepoint, then advance: current becomes previous, current clears.
    ///
    /// `emit` is invoked in ascending slot-id order, once per slot whose
    /// membership changed, and never for ids below the pinned prefix.
    pub fn diff_and_advance(
        &mut self,
        total_slots: usize,
        mut emit: impl FnMut(SlotId, SlotState),
    ) {
        debug_assert!(total_slots <= self.capacity);
        for index in self.untracked_prefix..total_slots {
            let word = index / BITS_PER_WORD;
            let bit = 1u64 << (index % BITS_PER_WORD);
            let was_live = self.previous[word] & bit != 0;
            let is_live = self.current[word] & bit != 0;

            if !was_live && is_live {
                emit(SlotId::new(index as u32), SlotState::Live);
            } else if was_live && !is_live {
                emit(SlotId::new(index as u32), SlotState::Dead);
            }

            if is_live {
                self.previous[word] |= bit;
            } else {
                self.previous[word] &= !bit;
            }
            self.current[word] &= !bit;
        }
    }

    /// Whether a slot was live as of the last advanced safepoint.
    #[inline]
    pub fn was_live(&self, id: SlotId) -> bool {
        let index = id.index();
        index < self.capacity
            && self.previous[index / BITS_PER_WORD] & (1u64 << (index % BITS_PER_WORD)) != 0
    }

    /// Current capacity in bits.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// =============================================================================
// Tests
// =============================================================================
