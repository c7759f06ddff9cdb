//! Pre-allocation of pinned and aggregate-derived slots.
//!
//! Pinned locations and the reference-bearing sub-offsets of aggregates
//! are reported live for their entire scope, so they carry no transition
//! events. They still need slot ids, and the downstream format requires
//! pinned ids below all tracked ids and aggregate ids above them. The
//! driver therefore runs `allocate_pinned` before the safepoint stream
//! and `allocate_aggregates` after it; the registry rejects any other
//! order.

use crate::error::GcInfoError;
use crate::sink::GcInfoSink;
use crate::slot::{SlotCategory, SlotRegistry};
use crate::trace::TranslationTrace;
use smallvec::SmallVec;

// =============================================================================
// LayoutOracle
// =============================================================================

/// Type-layout oracle for aggregate expansion.
///
/// Implemented by the compiler side, which knows the target data layout.
/// Must be pure: the same aggregate type always yields the same offsets,
/// in ascending order.
pub trait LayoutOracle {
    /// The compiler's representation of an aggregate type.
    type AggregateType;

    /// Byte offsets of embedded references within the aggregate,
    /// ascending, relative to the aggregate's base.
    fn reference_offsets(&self, ty: &Self::AggregateType) -> SmallVec<[u32; 4]>;
}

// =============================================================================
// AggregateLocation
// =============================================================================

/// A stack-allocated aggregate with embedded references.
#[derive(Debug, Clone)]
pub struct AggregateLocation<T> {
    /// Stack offset of the aggregate's first byte.
    pub base_offset: i32,
    /// The aggregate's type, resolved through the layout oracle.
    pub ty: T,
}

// =============================================================================
// SpecialSlotAllocator
// =============================================================================

/// Allocates ids for the slot categories outside the tracked stream.
pub struct SpecialSlotAllocator<'a, S: GcInfoSink> {
    registry: &'a mut SlotRegistry,
    sink: &'a mut S,
    trace: &'a mut dyn TranslationTrace,
}

impl<'a, S: GcInfoSink> SpecialSlotAllocator<'a, S> {
    /// Create an allocator over the shared registry and sink.
    pub fn new(
        registry: &'a mut SlotRegistry,
        sink: &'a mut S,
        trace: &'a mut dyn TranslationTrace,
    ) -> Self {
        SpecialSlotAllocator {
            registry,
            sink,
            trace,
        }
    }

    /// Allocate one pinned slot per offset, in the given order.
    ///
    /// Must run before any tracked slot is allocated for the function;
    /// the registry fails with [`GcInfoError::AllocationOrder`] otherwise.
    /// A repeated offset fails with [`GcInfoError::DuplicateRegistration`].
    pub fn allocate_pinned(&mut self, offsets: &[i32]) -> Result<(), GcInfoError> {
        let SpecialSlotAllocator {
            registry,
            sink,
            trace,
        } = self;
        registry.allocate_batch(offsets, SlotCategory::Pinned, |slot, offset| {
            sink.define_slot(slot, offset, SlotCategory::Pinned);
            trace.slot_defined(slot, offset, SlotCategory::Pinned);
        })
    }

    /// Expand each aggregate through the oracle and allocate one
    /// untracked slot per reference-bearing sub-offset.
    ///
    /// Must run after the safepoint stream has been fully processed, so
    /// the aggregate ids land above every tracked id.
    pub fn allocate_aggregates<O: LayoutOracle>(
        &mut self,
        aggregates: &[AggregateLocation<O::AggregateType>],
        oracle: &O,
    ) -> Result<(), GcInfoError> {
        let SpecialSlotAllocator {
            registry,
            sink,
            trace,
        } = self;
        for aggregate in aggregates {
            let sub_offsets = oracle.reference_offsets(&aggregate.ty);
            debug_assert!(
                sub_offsets.windows(2).all(|w| w[0] < w[1]),
                "layout oracle must return ascending offsets"
            );

            let offsets: SmallVec<[i32; 4]> = sub_offsets
                .iter()
                .map(|&sub| aggregate.base_offset + sub as i32)
                .collect();
            registry.allocate_batch(
                &offsets,
                SlotCategory::UntrackedAggregate,
                |slot, offset| {
                    sink.define_slot(slot, offset, SlotCategory::UntrackedAggregate);
                    trace.slot_defined(slot, offset, SlotCategory::UntrackedAggregate);
                },
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
