//! Reference-tag remapping for already-generated protection metadata.
//!
//! When a higher layer re-addresses an extent (re-striping, stacking) the
//! guards stay valid — only the reference tags need to move from the old
//! sequence values to the new ones. The remapper walks the metadata stream
//! alone, using the same tuple locator as the generate/verify engine, and
//! rewrites only the reference-tag sub-field of each tuple. Guard and
//! application-tag bytes are never written.
//!
//! A tuple whose current reference tag does not equal the expected value for
//! its interval is left untouched: it was already remapped by an earlier
//! layer, or never matched, and must not be clobbered.

use tracing::debug;

use tessera_error::{Result, TesseraError};
use tessera_types::ProtectionDescriptor;

use crate::segment::{Exhausted, SegmentWriter};

/// Caller-held remap bookkeeping for one extent.
///
/// Once a [`remap_prepare`] call has walked every tuple of the extent, later
/// `remap_prepare` calls with the same state short-circuit to a no-op. The
/// full scan is the specification; this flag is only a cache consistent with
/// it, and the caller must [`reset`](Self::reset) it whenever a new remap
/// target is introduced for the extent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtentRemapState {
    fully_remapped: bool,
}

impl ExtentRemapState {
    /// Fresh state: nothing remapped yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fully_remapped: false,
        }
    }

    /// True once a prepare pass has covered the whole extent.
    #[must_use]
    pub const fn is_fully_remapped(&self) -> bool {
        self.fully_remapped
    }

    /// Invalidate the fast path. Must be called when a new remap target is
    /// introduced for the extent.
    pub fn reset(&mut self) {
        self.fully_remapped = false;
    }
}

/// Rewrite reference tags from the old addressing to the new one.
///
/// For each of `interval_count` tuples: if the stored reference tag equals
/// `old_seed + i` (wrapped at the layout width), rewrite it to
/// `new_seed + i`; otherwise leave the tuple untouched. Sets the fast-path
/// flag on `state` after a full scan.
pub fn remap_prepare(
    metadata: &mut [&mut [u8]],
    state: &mut ExtentRemapState,
    descriptor: &ProtectionDescriptor,
    interval_count: u64,
    old_seed: u64,
    new_seed: u64,
) -> Result<()> {
    if state.is_fully_remapped() {
        debug!(interval_count, "extent already remapped, skipping scan");
        return Ok(());
    }
    remap_walk(metadata, descriptor, interval_count, old_seed, new_seed)?;
    state.fully_remapped = true;
    Ok(())
}

/// Undo [`remap_prepare`] on completion: rewrite reference tags that equal
/// `new_seed + i` back to `old_seed + i`. The unwind direction always scans;
/// it never consults the fast-path flag.
pub fn remap_complete(
    metadata: &mut [&mut [u8]],
    descriptor: &ProtectionDescriptor,
    interval_count: u64,
    old_seed: u64,
    new_seed: u64,
) -> Result<()> {
    remap_walk(metadata, descriptor, interval_count, new_seed, old_seed)
}

fn remap_walk(
    metadata: &mut [&mut [u8]],
    descriptor: &ProtectionDescriptor,
    interval_count: u64,
    from_seed: u64,
    to_seed: u64,
) -> Result<()> {
    descriptor.validate()?;
    let layout = descriptor.layout();
    let mask = layout.ref_tag_mask();
    let mut cursor = SegmentWriter::new(metadata);

    let needed = usize::try_from(interval_count)
        .unwrap_or(usize::MAX)
        .saturating_mul(descriptor.metadata_unit_size());
    if cursor.remaining() < needed {
        return Err(TesseraError::metadata_too_small(needed, cursor.remaining()));
    }

    debug!(
        interval_count,
        from = from_seed,
        to = to_seed,
        layout = ?layout,
        "remapping reference tags"
    );

    let mut from = from_seed & mask;
    let mut to = to_seed & mask;
    for _ in 0..interval_count {
        cursor
            .skip(descriptor.leading_padding)
            .map_err(exhausted_metadata)?;
        cursor
            .with_tuple(layout.tuple_size(), |window| {
                if layout.read_ref_tag(window) == from {
                    layout.write_ref_tag(window, to);
                }
            })
            .map_err(exhausted_metadata)?;
        from = (from + 1) & mask;
        to = (to + 1) & mask;
    }
    Ok(())
}

fn exhausted_metadata(err: Exhausted) -> TesseraError {
    TesseraError::metadata_too_small(err.needed, err.available)
}
