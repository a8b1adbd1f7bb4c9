//! Data-integrity engine for block-oriented storage.
//!
//! Tessera generates and verifies per-interval protection tuples (guard
//! checksum, application tag, reference tag) carried in an out-of-band
//! metadata stream, and remaps reference tags when an extent is re-addressed
//! without being re-checksummed. Data and metadata are walked in lock-step
//! across arbitrary physical segmentation; all multi-byte tuple fields are
//! big-endian on the wire.
//!
//! The engine is synchronous and call-local: one call walks one
//! (data, metadata) pair start to finish with no I/O, no locking, and no
//! state surviving the call. Calls over different pairs may run concurrently
//! on different threads; serializing overlapping access to one metadata
//! buffer is the caller's responsibility.

pub mod checksum;
pub mod engine;
pub mod remap;
pub mod segment;

pub use checksum::GuardAccumulator;
pub use engine::{generate, verify};
pub use remap::{ExtentRemapState, remap_complete, remap_prepare};
pub use segment::{SegmentReader, SegmentWriter};

pub use tessera_error::{FaultKind, Result, TesseraError};
pub use tessera_types::{
    APP_TAG_ESCAPE, GuardAlgorithm, ProtectionDescriptor, Tuple, TupleLayout,
};
