//! Per-function emission driver.
//!
//! Composes the registry, tracker, translator, and special-slot
//! allocator into the fixed sequence the downstream encoder requires:
//!
//! 1. Header: code length and stack base register.
//! 2. Pinned slots (ids start at 0).
//! 3. Tracked liveness from the safepoint stream.
//! 4. Untracked aggregate slots (ids above all tracked ids).
//! 5. Call sites, then finalization.
//!
//! One emitter handles exactly one function; `emit` consumes it, so a
//! second stream cannot be appended to a sealed encoding. Multi-function
//! payloads must be split by the caller before decoding.
//!
//! # Usage
//!
//! ```ignore
//! use gctable::{FunctionGcInfo, GcInfoEmitter, StackBase};
//!
//! let func = FunctionGcInfo {
//!     code_length: 0x80,
//!     stack_base: StackBase::StackPointer,
//!     pinned_offsets: vec![-4],
//!     aggregates: vec![],
//! };
//! GcInfoEmitter::new(&mut encoder, offset_correction)
//!     .emit(&func, records, &layout)?;
//! ```

use crate::error::GcInfoError;
use crate::liveset::LiveSetTracker;
use crate::record::SafepointRecord;
use crate::sink::{GcInfoSink, StackBase};
use crate::slot::SlotRegistry;
use crate::special::{AggregateLocation, LayoutOracle, SpecialSlotAllocator};
use crate::trace::{NoopTrace, TranslationTrace};
use crate::translate::{SafepointTranslator, DEFAULT_CALL_SITE_BACKOFF};

// =============================================================================
// FunctionGcInfo
// =============================================================================

/// Everything known about one function's GC layout before translation.
#[derive(Debug, Clone)]
pub struct FunctionGcInfo<T> {
    /// Length of the function's code in bytes, for the header.
    pub code_length: u32,
    /// Register the encoded stack offsets are relative to.
    pub stack_base: StackBase,
    /// Stack offsets of pinned reference slots.
    pub pinned_offsets: Vec<i32>,
    /// Stack-allocated aggregates with embedded references.
    pub aggregates: Vec<AggregateLocation<T>>,
}

// =============================================================================
// GcInfoEmitter
// =============================================================================

/// Drives the full encoding of one function into a sink.
pub struct GcInfoEmitter<'a, S: GcInfoSink> {
    sink: &'a mut S,
    trace: Option<&'a mut dyn TranslationTrace>,
    offset_correction: u32,
    call_site_backoff: u32,
}

impl<'a, S: GcInfoSink> GcInfoEmitter<'a, S> {
    /// Create an emitter writing to `sink`.
    ///
    /// `offset_correction` is the byte distance from the code block start
    /// to the function entry; the decoder's offsets are shifted by it.
    pub fn new(sink: &'a mut S, offset_correction: u32) -> Self {
        GcInfoEmitter {
            sink,
            trace: None,
            offset_correction,
            call_site_backoff: DEFAULT_CALL_SITE_BACKOFF,
        }
    }

    /// Attach a trace callback observing the translation.
    pub fn with_trace(mut self, trace: &'a mut dyn TranslationTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Override the call-instruction size subtracted from raw offsets.
    pub fn with_call_site_backoff(mut self, backoff: u32) -> Self {
        self.call_site_backoff = backoff;
        self
    }

    /// Encode one function: header, slots, liveness events, call sites,
    /// finalization.
    ///
    /// On error the sink is left unfinalized and the whole encoding must
    /// be discarded by the caller.
    pub fn emit<O: LayoutOracle>(
        mut self,
        func: &FunctionGcInfo<O::AggregateType>,
        records: impl IntoIterator<Item = SafepointRecord>,
        oracle: &O,
    ) -> Result<(), GcInfoError> {
        let mut noop = NoopTrace;
        let trace: &mut dyn TranslationTrace = match self.trace.take() {
            Some(trace) => trace,
            None => &mut noop,
        };

        self.sink.set_code_length(func.code_length);
        self.sink.set_stack_base(func.stack_base);

        let mut registry = SlotRegistry::new();

        // Pinned slots take the low ids.
        SpecialSlotAllocator::new(&mut registry, &mut *self.sink, &mut *trace)
            .allocate_pinned(&func.pinned_offsets)?;

        // Tracked slots and their transition events.
        let mut tracker = LiveSetTracker::new(registry.total_count());
        let mut translator = SafepointTranslator::new(
            &mut registry,
            &mut tracker,
            &mut *self.sink,
            &mut *trace,
            self.offset_correction,
            self.call_site_backoff,
        );
        translator.translate(records)?;
        let call_sites = translator.into_call_sites();

        // Aggregate sub-slots take the high ids.
        SpecialSlotAllocator::new(&mut registry, &mut *self.sink, &mut *trace)
            .allocate_aggregates(&func.aggregates, oracle)?;

        self.sink.define_call_sites(&call_sites);
        self.sink.finalize();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveset::SlotState;
    use crate::record::LiveLocation;
    use crate::sink::CallSite;
    use crate::slot::{SlotCategory, SlotId};
    use smallvec::SmallVec;

    /// Oracle over offset-list aggregate "types".
    struct FixedLayout;

    impl LayoutOracle for FixedLayout {
        type AggregateType = Vec<u32>;

        fn reference_offsets(&self, ty: &Vec<u32>) -> SmallVec<[u32; 4]> {
            ty.iter().copied().collect()
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        CodeLength(u32),
        Base(StackBase),
        Slot(usize, i32, SlotCategory),
        State(u32, usize, SlotState),
        CallSites(Vec<CallSite>),
        Finalize,
    }

    #[derive(Default)]
    struct CallLog {
        calls: Vec<Call>,
    }

    impl GcInfoSink for CallLog {
        fn set_code_length(&mut self, length: u32) {
            self.calls.push(Call::CodeLength(length));
        }
        fn set_stack_base(&mut self, base: StackBase) {
            self.calls.push(Call::Base(base));
        }
        fn define_slot(&mut self, slot: SlotId, offset: i32, category: SlotCategory) {
            self.calls.push(Call::Slot(slot.index(), offset, category));
        }
        fn set_slot_state(&mut self, code_offset: u32, slot: SlotId, state: SlotState) {
            self.calls.push(Call::State(code_offset, slot.index(), state));
        }
        fn define_call_sites(&mut self, sites: &[CallSite]) {
            self.calls.push(Call::CallSites(sites.to_vec()));
        }
        fn finalize(&mut self) {
            self.calls.push(Call::Finalize);
        }
    }

    fn func(pinned: Vec<i32>, aggregates: Vec<AggregateLocation<Vec<u32>>>) -> FunctionGcInfo<Vec<u32>> {
        FunctionGcInfo {
            code_length: 0x100,
            stack_base: StackBase::StackPointer,
            pinned_offsets: pinned,
            aggregates,
        }
    }

    #[test]
    fn test_full_sequence_order() {
        let mut sink = CallLog::default();
        let records = vec![SafepointRecord::new(2, [LiveLocation::Stack { offset: -8 }])];
        let aggregates = vec![AggregateLocation {
            base_offset: -32,
            ty: vec![0u32, 8],
        }];
        GcInfoEmitter::new(&mut sink, 0)
            .emit(&func(vec![-4], aggregates), records, &FixedLayout)
            .unwrap();

        assert_eq!(
            sink.calls,
            vec![
                Call::CodeLength(0x100),
                Call::Base(StackBase::StackPointer),
                Call::Slot(0, -4, SlotCategory::Pinned),
                Call::Slot(1, -8, SlotCategory::Tracked),
                Call::State(0, 1, SlotState::Live),
                Call::Slot(2, -32, SlotCategory::UntrackedAggregate),
                Call::Slot(3, -24, SlotCategory::UntrackedAggregate),
                Call::CallSites(vec![CallSite { offset: 0, size: 2 }]),
                Call::Finalize,
            ]
        );
    }

    #[test]
    fn test_error_leaves_sink_unfinalized() {
        let mut sink = CallLog::default();
        let records = vec![SafepointRecord::new(2, [LiveLocation::Register(1)])];
        let err = GcInfoEmitter::new(&mut sink, 0)
            .emit(&func(vec![], vec![]), records, &FixedLayout)
            .unwrap_err();
        assert!(matches!(err, GcInfoError::UnsupportedLiveness { .. }));
        assert!(!sink.calls.contains(&Call::Finalize));
    }

    #[test]
    fn test_custom_backoff() {
        let mut sink = CallLog::default();
        let records = vec![SafepointRecord::new(8, [LiveLocation::Stack { offset: -8 }])];
        GcInfoEmitter::new(&mut sink, 0)
            .with_call_site_backoff(5)
            .emit(&func(vec![], vec![]), records, &FixedLayout)
            .unwrap();
        assert!(sink
            .calls
            .contains(&Call::CallSites(vec![CallSite { offset: 3, size: 5 }])));
    }
}
