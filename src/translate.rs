//! Safepoint stream translation.
//!
//! Drives the pipeline for the tracked slots of one function: resolve
//! each live location to a slot id, accumulate the current live set, and
//! emit birth/death events relative to the previous safepoint. Slot ids
//! are allocated on first sight, so the id space grows while the stream
//! is consumed and the live-set bitsets grow with it.
//!
//! # Offset correction
//!
//! The upstream decoder reports offsets relative to the function entry
//! and pointing past the end of the call instruction; the downstream
//! format wants offsets relative to the code block start and pointing at
//! the call's first byte. Each raw offset is therefore corrected once:
//!
//! ```text
//! corrected = raw + offset_correction - call_site_backoff
//! ```
//!
//! The decoder does not expose real call-instruction sizes, so the
//! backoff is a fixed per-target constant. The default of 2 matches the
//! indirect-call encoding the code generator emits on x64; any positive
//! value works because the downstream consumer only uses offset + size.

use crate::error::GcInfoError;
use crate::liveset::LiveSetTracker;
use crate::record::{LiveLocation, SafepointRecord};
use crate::sink::{CallSite, GcInfoSink};
use crate::slot::{SlotCategory, SlotRegistry};
use crate::trace::TranslationTrace;
use smallvec::SmallVec;

/// Default call-instruction size subtracted from every raw offset.
pub const DEFAULT_CALL_SITE_BACKOFF: u32 = 2;

// =============================================================================
// SafepointTranslator
// =============================================================================

/// Translates one function's safepoint stream into slot transition events.
///
/// Exclusively owns its registry and tracker borrows for the duration of
/// the stream; a fresh translator is built per function.
pub struct SafepointTranslator<'a, S: GcInfoSink> {
    registry: &'a mut SlotRegistry,
    tracker: &'a mut LiveSetTracker,
    sink: &'a mut S,
    trace: &'a mut dyn TranslationTrace,
    offset_correction: u32,
    call_site_backoff: u32,
    /// Corrected offset of the last processed record, for the
    /// monotonicity check.
    last_offset: Option<u32>,
    call_sites: SmallVec<[CallSite; 16]>,
}

impl<'a, S: GcInfoSink> SafepointTranslator<'a, S> {
    /// Create a translator over the shared registry, tracker, and sink.
    pub fn new(
        registry: &'a mut SlotRegistry,
        tracker: &'a mut LiveSetTracker,
        sink: &'a mut S,
        trace: &'a mut dyn TranslationTrace,
        offset_correction: u32,
        call_site_backoff: u32,
    ) -> Self {
        SafepointTranslator {
            registry,
            tracker,
            sink,
            trace,
            offset_correction,
            call_site_backoff,
            last_offset: None,
            call_sites: SmallVec::new(),
        }
    }

    /// Consume the safepoint stream, emitting transition events in order.
    ///
    /// Fatal on register-resident references, malformed locations, and
    /// non-monotonic corrected offsets; nothing is emitted for the record
    /// that fails.
    pub fn translate(
        &mut self,
        records: impl IntoIterator<Item = SafepointRecord>,
    ) -> Result<(), GcInfoError> {
        for record in records {
            self.translate_record(&record)?;
        }
        Ok(())
    }

    fn translate_record(&mut self, record: &SafepointRecord) -> Result<(), GcInfoError> {
        let corrected = self.correct_offset(record.instruction_offset);
        if let Some(previous) = self.last_offset {
            if corrected < previous {
                return Err(GcInfoError::NonMonotonicSafepoint {
                    previous,
                    current: corrected,
                });
            }
        }

        self.tracker.begin_safepoint();
        for location in &record.locations {
            match *location {
                LiveLocation::Constant => continue,
                LiveLocation::Register(register) => {
                    return Err(GcInfoError::UnsupportedLiveness {
                        code_offset: corrected,
                        register,
                    });
                }
                LiveLocation::Indirect { .. } => {
                    return Err(GcInfoError::MalformedLocation {
                        code_offset: corrected,
                    });
                }
                LiveLocation::Stack { offset } => {
                    let (slot, is_new) = self.registry.resolve_tracked(offset)?;
                    if is_new {
                        self.sink.define_slot(slot, offset, SlotCategory::Tracked);
                        self.trace.slot_defined(slot, offset, SlotCategory::Tracked);
                        self.tracker.ensure_capacity(self.registry.total_count());
                    }
                    // No-op when the offset aliased a pinned slot.
                    self.tracker.mark_live(slot);
                }
            }
        }

        self.trace.safepoint(corrected);
        let SafepointTranslator {
            registry,
            tracker,
            sink,
            trace,
            ..
        } = self;
        tracker.diff_and_advance(registry.total_count(), |slot, state| {
            sink.set_slot_state(corrected, slot, state);
            trace.slot_state(corrected, slot, state);
        });

        self.call_sites.push(CallSite {
            offset: corrected,
            size: self.call_site_backoff as u8,
        });
        self.last_offset = Some(corrected);
        Ok(())
    }

    #[inline]
    fn correct_offset(&self, raw: u32) -> u32 {
        debug_assert!(
            raw + self.offset_correction >= self.call_site_backoff,
            "raw offset precedes the call-site backoff"
        );
        raw + self.offset_correction - self.call_site_backoff
    }

    /// Call sites recorded so far, in stream order.
    #[inline]
    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    /// Consume the translator, yielding the recorded call sites.
    pub fn into_call_sites(self) -> SmallVec<[CallSite; 16]> {
        self.call_sites
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveset::SlotState;
    use crate::sink::StackBase;
    use crate::slot::SlotId;
    use crate::trace::NoopTrace;

    #[derive(Default, Debug)]
    struct EventLog {
        defined: Vec<(usize, i32)>,
        events: Vec<(u32, usize, SlotState)>,
    }

    impl GcInfoSink for EventLog {
        fn set_code_length(&mut self, _length: u32) {}
        fn set_stack_base(&mut self, _base: StackBase) {}
        fn define_slot(&mut self, slot: SlotId, offset: i32, _category: SlotCategory) {
            self.defined.push((slot.index(), offset));
        }
        fn set_slot_state(&mut self, code_offset: u32, slot: SlotId, state: SlotState) {
            self.events.push((code_offset, slot.index(), state));
        }
        fn define_call_sites(&mut self, _sites: &[CallSite]) {}
        fn finalize(&mut self) {}
    }

    fn translate(
        records: Vec<SafepointRecord>,
        pinned: &[i32],
    ) -> Result<(EventLog, SmallVec<[CallSite; 16]>), GcInfoError> {
        let mut registry = SlotRegistry::new();
        let mut sink = EventLog::default();
        let mut trace = NoopTrace;
        registry
            .allocate_batch(pinned, SlotCategory::Pinned, |slot, offset| {
                sink.defined.push((slot.index(), offset));
            })
            .unwrap();
        let mut tracker = LiveSetTracker::new(registry.total_count());
        let mut translator = SafepointTranslator::new(
            &mut registry,
            &mut tracker,
            &mut sink,
            &mut trace,
            0,
            DEFAULT_CALL_SITE_BACKOFF,
        );
        translator.translate(records)?;
        let call_sites = translator.into_call_sites();
        Ok((sink, call_sites))
    }

    #[test]
    fn test_two_safepoint_stream() {
        // Safepoint 1 live: {-8}; safepoint 2 live: {-8, -16}.
        let records = vec![
            SafepointRecord::new(0x12, [LiveLocation::Stack { offset: -8 }]),
            SafepointRecord::new(
                0x22,
                [
                    LiveLocation::Stack { offset: -8 },
                    LiveLocation::Stack { offset: -16 },
                ],
            ),
        ];
        let (sink, call_sites) = translate(records, &[]).unwrap();

        assert_eq!(sink.defined, vec![(0, -8), (1, -16)]);
        assert_eq!(
            sink.events,
            vec![(0x10, 0, SlotState::Live), (0x20, 1, SlotState::Live)]
        );
        assert_eq!(call_sites.len(), 2);
        assert_eq!(call_sites[0], CallSite { offset: 0x10, size: 2 });
    }

    #[test]
    fn test_death_events() {
        let records = vec![
            SafepointRecord::new(
                0x12,
                [
                    LiveLocation::Stack { offset: -8 },
                    LiveLocation::Stack { offset: -16 },
                ],
            ),
            SafepointRecord::new(0x22, [LiveLocation::Stack { offset: -16 }]),
        ];
        let (sink, _) = translate(records, &[]).unwrap();
        assert_eq!(
            sink.events,
            vec![
                (0x10, 0, SlotState::Live),
                (0x10, 1, SlotState::Live),
                (0x20, 0, SlotState::Dead),
            ]
        );
    }

    #[test]
    fn test_constants_skipped() {
        let records = vec![SafepointRecord::new(
            0x12,
            [LiveLocation::Constant, LiveLocation::Stack { offset: -8 }],
        )];
        let (sink, _) = translate(records, &[]).unwrap();
        assert_eq!(sink.defined, vec![(0, -8)]);
    }

    #[test]
    fn test_register_liveness_fatal() {
        let records = vec![
            SafepointRecord::new(0x12, [LiveLocation::Stack { offset: -8 }]),
            SafepointRecord::new(0x22, [LiveLocation::Register(3)]),
        ];
        let err = translate(records, &[]).unwrap_err();
        assert_eq!(
            err,
            GcInfoError::UnsupportedLiveness {
                code_offset: 0x20,
                register: 3,
            }
        );
    }

    #[test]
    fn test_register_aborts_before_events() {
        let records = vec![SafepointRecord::new(
            0x12,
            [LiveLocation::Stack { offset: -8 }, LiveLocation::Register(0)],
        )];
        let mut registry = SlotRegistry::new();
        let mut tracker = LiveSetTracker::new(0);
        let mut sink = EventLog::default();
        let mut trace = NoopTrace;
        let mut translator = SafepointTranslator::new(
            &mut registry,
            &mut tracker,
            &mut sink,
            &mut trace,
            0,
            DEFAULT_CALL_SITE_BACKOFF,
        );
        assert!(translator.translate(records).is_err());
        assert!(translator.call_sites().is_empty());
        // No transition events for the failing record.
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_indirect_location_fatal() {
        let records = vec![SafepointRecord::new(
            0x12,
            [LiveLocation::Indirect {
                register: 5,
                offset: 16,
            }],
        )];
        let err = translate(records, &[]).unwrap_err();
        assert_eq!(err, GcInfoError::MalformedLocation { code_offset: 0x10 });
    }

    #[test]
    fn test_non_monotonic_offsets_fatal() {
        let records = vec![
            SafepointRecord::new(0x32, [LiveLocation::Stack { offset: -8 }]),
            SafepointRecord::new(0x12, [LiveLocation::Stack { offset: -8 }]),
        ];
        let err = translate(records, &[]).unwrap_err();
        assert_eq!(
            err,
            GcInfoError::NonMonotonicSafepoint {
                previous: 0x30,
                current: 0x10,
            }
        );
    }

    #[test]
    fn test_offset_correction_applied() {
        let records = vec![SafepointRecord::new(
            0x10,
            [LiveLocation::Stack { offset: -8 }],
        )];
        let mut registry = SlotRegistry::new();
        let mut tracker = LiveSetTracker::new(0);
        let mut sink = EventLog::default();
        let mut trace = NoopTrace;
        let mut translator = SafepointTranslator::new(
            &mut registry,
            &mut tracker,
            &mut sink,
            &mut trace,
            0x40,
            DEFAULT_CALL_SITE_BACKOFF,
        );
        translator.translate(records).unwrap();
        assert_eq!(sink.events, vec![(0x4e, 0, SlotState::Live)]);
    }

    #[test]
    fn test_pinned_location_in_stream_not_tracked() {
        // The liveness stream may report a pinned location; it resolves to
        // the existing slot and produces no transition events.
        let records = vec![SafepointRecord::new(
            0x12,
            [
                LiveLocation::Stack { offset: -4 },
                LiveLocation::Stack { offset: -8 },
            ],
        )];
        let (sink, _) = translate(records, &[-4]).unwrap();
        assert_eq!(sink.defined, vec![(0, -4), (1, -8)]);
        assert_eq!(sink.events, vec![(0x10, 1, SlotState::Live)]);
    }

    #[test]
    fn test_growth_past_initial_capacity() {
        // More tracked slots than the initial bitset capacity; earlier
        // liveness must survive the resize.
        let mut locations = Vec::new();
        for i in 0..40 {
            locations.push(LiveLocation::Stack {
                offset: -8 * (i + 1),
            });
        }
        let records = vec![
            SafepointRecord::new(0x12, locations.clone()),
            SafepointRecord::new(0x22, locations[..1].to_vec()),
        ];
        let (sink, _) = translate(records, &[]).unwrap();

        let births: Vec<_> = sink
            .events
            .iter()
            .filter(|(off, _, state)| *off == 0x10 && *state == SlotState::Live)
            .collect();
        assert_eq!(births.len(), 40);

        // All but slot 0 die at the second safepoint.
        let deaths: Vec<_> = sink
            .events
            .iter()
            .filter(|(off, _, state)| *off == 0x20 && *state == SlotState::Dead)
            .collect();
        assert_eq!(deaths.len(), 39);
    }
}
