//! Translation tracing callback interface.
//!
//! Debug observability for the translator without a logging dependency:
//! a trace implementation receives every slot definition, safepoint, and
//! transition event as it happens. The default [`NoopTrace`] compiles to
//! nothing, so release builds pay no cost for the hooks.

use crate::liveset::SlotState;
use crate::slot::{SlotCategory, SlotId};

/// Callback interface observing the translation as it runs.
///
/// All methods have empty default bodies; implement only the hooks you
/// need. A diagnostic dumper mirroring the slot table and per-safepoint
/// birth/death lists is a typical implementation.
pub trait TranslationTrace {
    /// A slot was assigned a fresh id.
    fn slot_defined(&mut self, slot: SlotId, offset: i32, category: SlotCategory) {
        let _ = (slot, offset, category);
    }

    /// A safepoint record is about to have its transitions emitted.
    fn safepoint(&mut self, code_offset: u32) {
        let _ = code_offset;
    }

    /// A liveness transition was emitted to the sink.
    fn slot_state(&mut self, code_offset: u32, slot: SlotId, state: SlotState) {
        let _ = (code_offset, slot, state);
    }
}

/// Trace implementation that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrace;

impl TranslationTrace for NoopTrace {}
