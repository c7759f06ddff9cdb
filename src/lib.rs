//! GC table translation from per-safepoint liveness snapshots.
//!
//! A precise, moving collector needs to know, at every safepoint, which
//! stack slots hold live object references. The compiler's analysis
//! reports that as an absolute live set per safepoint; the runtime's
//! table format wants a dense slot-id space plus minimal became-live /
//! became-dead transition events between consecutive safepoints. This
//! crate performs that translation.
//!
//! # Architecture
//!
//! - [`SlotRegistry`]: maps stack offsets to dense, stable slot ids and
//!   enforces the category allocation order the output format requires
//!   (pinned, then tracked, then untracked-aggregate).
//! - [`LiveSetTracker`]: previous/current live-set bitsets; emits the
//!   symmetric difference per safepoint.
//! - [`SafepointTranslator`]: consumes the ordered safepoint stream,
//!   allocating tracked slots on first sight and emitting events.
//! - [`SpecialSlotAllocator`]: pre-allocates pinned slots and expands
//!   aggregates through the [`LayoutOracle`] into untracked slots.
//! - [`GcInfoEmitter`]: thin driver composing the above for one function.
//!
//! The surrounding toolchain supplies three collaborators: the decoded
//! safepoint stream ([`SafepointRecord`]), the type-layout oracle
//! ([`LayoutOracle`]), and the table encoder ([`GcInfoSink`]).
//!
//! # Safety model
//!
//! An omitted live slot lets the collector reclaim a reachable object, so
//! every inconsistency is fatal for the function being encoded: there is
//! no partial-success mode. A spurious live slot only wastes scan time
//! and is tolerated (all slots are currently reported with interior
//! semantics).
//!
//! # Usage
//!
//! ```ignore
//! use gctable::{FunctionGcInfo, GcInfoEmitter, StackBase};
//!
//! let func = FunctionGcInfo {
//!     code_length,
//!     stack_base: StackBase::StackPointer,
//!     pinned_offsets,
//!     aggregates,
//! };
//! GcInfoEmitter::new(&mut encoder, offset_correction)
//!     .emit(&func, decoded_records, &layout_oracle)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod emitter;
pub mod error;
pub mod liveset;
pub mod record;
pub mod sink;
pub mod slot;
pub mod special;
pub mod trace;
pub mod translate;

pub use emitter::{FunctionGcInfo, GcInfoEmitter};
pub use error::GcInfoError;
pub use liveset::{LiveSetTracker, SlotState};
pub use record::{LiveLocation, SafepointRecord};
pub use sink::{CallSite, GcInfoSink, StackBase};
pub use slot::{SlotCategory, SlotId, SlotRegistry};
pub use special::{AggregateLocation, LayoutOracle, SpecialSlotAllocator};
pub use trace::{NoopTrace, TranslationTrace};
pub use translate::{SafepointTranslator, DEFAULT_CALL_SITE_BACKOFF};
