//! Downstream encoder interface.
//!
//! The sink owns the final bit-packed table format; this crate's only
//! obligation is to feed it complete, correctly ordered submissions. For
//! one function the emitter drives the sink in a fixed sequence:
//!
//! 1. `set_code_length` / `set_stack_base` — header, before any slot.
//! 2. `define_slot` for every pinned slot.
//! 3. `define_slot` for tracked slots interleaved with `set_slot_state`
//!    events, in ascending safepoint order.
//! 4. `define_slot` for every untracked-aggregate slot.
//! 5. `define_call_sites`, then `finalize`. No submissions after that.

use crate::liveset::SlotState;
use crate::slot::{SlotCategory, SlotId};

// =============================================================================
// StackBase
// =============================================================================

/// Register the encoded stack offsets are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackBase {
    /// Offsets are relative to the frame pointer.
    FramePointer,
    /// Offsets are relative to the stack pointer.
    StackPointer,
}

// =============================================================================
// CallSite
// =============================================================================

/// A call site reported to the sink: start offset and instruction size.
///
/// The upstream decoder only reports the offset past the end of the call,
/// so the size is the fixed backoff the translator subtracted; the
/// downstream format only ever consumes their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    /// Corrected offset of the start of the call instruction.
    pub offset: u32,
    /// Size of the call instruction in bytes.
    pub size: u8,
}

// =============================================================================
// GcInfoSink
// =============================================================================

/// Consumer of slot definitions and liveness transition events.
///
/// Implemented by the runtime-specific table encoder. Methods are called
/// in the order documented at the module level; implementations may rely
/// on it.
pub trait GcInfoSink {
    /// Record the function's code length. Called once, first.
    fn set_code_length(&mut self, length: u32);

    /// Record which register stack offsets are relative to. Called once,
    /// before any slot definition.
    fn set_stack_base(&mut self, base: StackBase);

    /// Define a slot. Ids arrive densely ascending from zero, all pinned
    /// slots before all tracked slots before all untracked-aggregate slots.
    fn define_slot(&mut self, slot: SlotId, offset: i32, category: SlotCategory);

    /// Record a liveness transition for a tracked slot at a safepoint.
    /// Offsets are non-decreasing across calls; within one safepoint,
    /// slot ids are strictly ascending.
    fn set_slot_state(&mut self, code_offset: u32, slot: SlotId, state: SlotState);

    /// Report every call site of the function, in ascending offset order.
    fn define_call_sites(&mut self, sites: &[CallSite]);

    /// Seal the encoding. No further submissions are accepted.
    fn finalize(&mut self);
}
