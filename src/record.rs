//! Safepoint records as produced by the upstream stackmap decoder.
//!
//! The decoder hands the translator one function's worth of records,
//! ordered by instruction offset. Each record lists every location the
//! compiler's analysis considers live at that safepoint; the translator
//! turns those absolute sets into per-slot transition events.

use smallvec::SmallVec;

// =============================================================================
// LiveLocation
// =============================================================================

/// One live-location descriptor within a safepoint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveLocation {
    /// A constant or already-resolved derived value. Never aliases a
    /// reference-bearing stack slot; skipped by the translator.
    Constant,
    /// A live reference in a machine register. Unsupported: references
    /// must be spilled to the stack before every safepoint.
    Register(u16),
    /// A stack location at a byte offset from the stack base register.
    Stack {
        /// Signed byte offset relative to the stack base.
        offset: i32,
    },
    /// A location reached through a register-plus-offset load. The
    /// translator rejects these as malformed; the upstream decoder never
    /// produces them for reference slots.
    Indirect {
        /// Base register of the load.
        register: u16,
        /// Byte displacement from the base register.
        offset: i32,
    },
}

// =============================================================================
// SafepointRecord
// =============================================================================

/// One safepoint: a raw instruction offset plus the locations live there.
#[derive(Debug, Clone)]
pub struct SafepointRecord {
    /// Instruction offset as reported by the upstream decoder, relative to
    /// the function entry and pointing past the end of the call.
    pub instruction_offset: u32,
    /// Live-location descriptors at this safepoint.
    pub locations: SmallVec<[LiveLocation; 8]>,
}

impl SafepointRecord {
    /// Build a record from an offset and location list.
    pub fn new(instruction_offset: u32, locations: impl IntoIterator<Item = LiveLocation>) -> Self {
        SafepointRecord {
            instruction_offset,
            locations: locations.into_iter().collect(),
        }
    }
}
