//! Error types for GC table translation.
//!
//! Every variant is fatal for the function being encoded: a partially
//! correct liveness table is more dangerous than no table, so the
//! translator never produces best-effort output. Callers decide whether
//! a failed function aborts the whole compilation unit.

use crate::slot::SlotCategory;
use std::fmt;

// =============================================================================
// GcInfoError
// =============================================================================

/// Errors that abort translation of the current function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcInfoError {
    /// A live reference was reported resident in a machine register at a
    /// safepoint. References must be spilled to the stack before every
    /// safepoint; a register-resident reference is not representable in
    /// the output encoding.
    UnsupportedLiveness {
        /// Corrected code offset of the offending safepoint.
        code_offset: u32,
        /// Register number reported by the upstream decoder.
        register: u16,
    },
    /// A live-location descriptor had a kind the translator does not
    /// recognize (e.g. an indirect location).
    MalformedLocation {
        /// Corrected code offset of the offending safepoint.
        code_offset: u32,
    },
    /// A stack offset was registered twice where a fresh registration was
    /// required, or re-registered under a conflicting category.
    DuplicateRegistration {
        /// The stack offset that collided.
        offset: i32,
        /// Category of the already-registered slot.
        existing: SlotCategory,
        /// Category the failing registration asked for.
        requested: SlotCategory,
    },
    /// Corrected safepoint offsets went backwards within one function.
    /// The upstream decoder guarantees monotonically ordered records, so
    /// this indicates corrupted input.
    NonMonotonicSafepoint {
        /// Corrected offset of the preceding safepoint.
        previous: u32,
        /// Corrected offset of the out-of-order safepoint.
        current: u32,
    },
    /// Slot allocation was attempted for a category after a later category
    /// had already started allocating. The output encoding requires all
    /// pinned slot ids below all tracked ids below all untracked ids.
    AllocationOrder {
        /// Category the failing allocation asked for.
        requested: SlotCategory,
        /// Highest category that has already allocated a slot.
        frontier: SlotCategory,
    },
}

impl fmt::Display for GcInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcInfoError::UnsupportedLiveness {
                code_offset,
                register,
            } => {
                write!(
                    f,
                    "live reference in register {} at safepoint offset {:#x}; \
                     references must be spilled before safepoints",
                    register, code_offset
                )
            }
            GcInfoError::MalformedLocation { code_offset } => {
                write!(
                    f,
                    "unrecognized live-location kind at safepoint offset {:#x}",
                    code_offset
                )
            }
            GcInfoError::DuplicateRegistration {
                offset,
                existing,
                requested,
            } => {
                write!(
                    f,
                    "stack offset {} already registered as {:?}, re-registered as {:?}",
                    offset, existing, requested
                )
            }
            GcInfoError::NonMonotonicSafepoint { previous, current } => {
                write!(
                    f,
                    "safepoint offset {:#x} precedes earlier safepoint at {:#x}",
                    current, previous
                )
            }
            GcInfoError::AllocationOrder {
                requested,
                frontier,
            } => {
                write!(
                    f,
                    "{:?} slot allocated after {:?} allocation already began",
                    requested, frontier
                )
            }
        }
    }
}

impl std::error::Error for GcInfoError {}
