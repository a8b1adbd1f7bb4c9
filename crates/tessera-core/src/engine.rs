//! Generate and verify passes over one (data, metadata) extent pair.
//!
//! Both entry points share the same lock-step walk: per interval, feed the
//! data stream's contiguous runs to the guard accumulator, optionally mix
//! the metadata unit's leading padding into the guard, finish the checksum,
//! then either compose-and-store a tuple or read-and-compare the stored one.
//! The running sequence value starts at the descriptor seed and advances by
//! one per interval, wrapping at the layout's reference-tag width.
//!
//! Caller contract violations (malformed descriptor, unaligned extent,
//! undersized metadata) are detected before the interval loop and abort the
//! whole call. Verification stops at the first faulting interval: a single
//! bad sector is enough to fail the whole operation, and the interval index
//! on the error lets the caller map the fault back to a physical address.

use tracing::debug;

use tessera_error::{Result, TesseraError};
use tessera_types::{ProtectionDescriptor, Tuple};

use crate::checksum::GuardAccumulator;
use crate::segment::{Exhausted, SegmentReader, SegmentWriter};

/// Compute and store one protection tuple per interval.
///
/// Guard = finished checksum of the interval (plus padding when the
/// descriptor says so), application tag = 0, reference tag = the running
/// sequence value. Fails only on caller contract violations; generation
/// itself cannot fault.
pub fn generate(
    data: &[&[u8]],
    metadata: &mut [&mut [u8]],
    descriptor: &ProtectionDescriptor,
) -> Result<()> {
    let mut data_cursor = SegmentReader::new(data);
    let mut meta_cursor = SegmentWriter::new(metadata);
    let intervals = validated_interval_count(descriptor, data_cursor.remaining(), meta_cursor.remaining())?;
    let layout = descriptor.layout();
    let mask = layout.ref_tag_mask();

    debug!(
        algorithm = ?descriptor.algorithm,
        intervals,
        interval_size = descriptor.interval_size,
        seed = descriptor.seed,
        "generating protection tuples"
    );

    let mut seq = descriptor.seed & mask;
    for _ in 0..intervals {
        let mut acc = GuardAccumulator::new(descriptor.algorithm);
        accumulate_data(&mut data_cursor, descriptor.interval_size_usize(), &mut acc);
        if descriptor.leading_padding > 0 {
            if descriptor.guard_includes_padding {
                meta_cursor
                    .visit(descriptor.leading_padding, |run| acc.update(run))
                    .map_err(exhausted_metadata)?;
            } else {
                meta_cursor
                    .skip(descriptor.leading_padding)
                    .map_err(exhausted_metadata)?;
            }
        }
        let tuple = Tuple::compose(layout, acc.finish(), 0, seq);
        meta_cursor
            .with_tuple(layout.tuple_size(), |window| tuple.write_to(window))
            .map_err(exhausted_metadata)?;
        seq = (seq + 1) & mask;
    }
    Ok(())
}

/// Recompute each interval's checksum and compare against the stored tuple.
///
/// Escape policy, applied per interval in order: with reference-tag checking
/// enabled, an escaped application tag passes the interval unconditionally
/// (the guard is not checked); otherwise a reference-tag mismatch is a
/// [`TesseraError::ReferenceTagFault`]. With reference-tag checking
/// disabled, a tuple whose application tag and reference tag are both
/// escaped passes unconditionally. Any other tuple has its guard compared
/// against the recomputed checksum; a mismatch is a
/// [`TesseraError::GuardFault`]. The walk stops at the first fault.
pub fn verify(data: &[&[u8]], metadata: &[&[u8]], descriptor: &ProtectionDescriptor) -> Result<()> {
    let mut data_cursor = SegmentReader::new(data);
    let mut meta_cursor = SegmentReader::new(metadata);
    let intervals = validated_interval_count(descriptor, data_cursor.remaining(), meta_cursor.remaining())?;
    let layout = descriptor.layout();
    let mask = layout.ref_tag_mask();

    debug!(
        algorithm = ?descriptor.algorithm,
        intervals,
        interval_size = descriptor.interval_size,
        seed = descriptor.seed,
        check_reference_tag = descriptor.check_reference_tag,
        "verifying protection tuples"
    );

    let mut seq = descriptor.seed & mask;
    for interval in 0..intervals {
        let mut acc = GuardAccumulator::new(descriptor.algorithm);
        accumulate_data(&mut data_cursor, descriptor.interval_size_usize(), &mut acc);
        if descriptor.leading_padding > 0 {
            if descriptor.guard_includes_padding {
                meta_cursor
                    .visit(descriptor.leading_padding, |run| acc.update(run))
                    .map_err(exhausted_metadata)?;
            } else {
                meta_cursor
                    .skip(descriptor.leading_padding)
                    .map_err(exhausted_metadata)?;
            }
        }
        let computed = acc.finish();
        let tuple = meta_cursor
            .with_tuple(layout.tuple_size(), |window| Tuple::parse(layout, window))
            .map_err(exhausted_metadata)??;

        check_interval(interval, &tuple, computed, seq, descriptor)?;
        seq = (seq + 1) & mask;
    }
    Ok(())
}

fn check_interval(
    interval: u64,
    tuple: &Tuple,
    computed: u64,
    expected_ref: u64,
    descriptor: &ProtectionDescriptor,
) -> Result<()> {
    if descriptor.check_reference_tag {
        if tuple.app_tag_escaped() {
            // Escaped tuples are a designed skip-verification signal, not
            // an error; the guard is not checked either.
            return Ok(());
        }
        if tuple.ref_tag() != expected_ref {
            debug!(
                interval,
                stored = tuple.ref_tag(),
                expected = expected_ref,
                "reference tag fault"
            );
            return Err(TesseraError::ReferenceTagFault {
                interval,
                stored: tuple.ref_tag(),
                expected: expected_ref,
            });
        }
    } else if tuple.app_tag_escaped() && tuple.ref_tag_escaped() {
        return Ok(());
    }

    if tuple.guard() != computed {
        debug!(
            interval,
            stored = tuple.guard(),
            computed,
            "guard fault"
        );
        return Err(TesseraError::GuardFault {
            interval,
            stored: tuple.guard(),
            computed,
        });
    }
    Ok(())
}

/// Validate the descriptor and both stream lengths once, before the
/// interval loop, and return the interval count.
fn validated_interval_count(
    descriptor: &ProtectionDescriptor,
    data_len: usize,
    metadata_len: usize,
) -> Result<u64> {
    descriptor.validate()?;
    let interval_size = descriptor.interval_size_usize();
    if data_len % interval_size != 0 {
        return Err(TesseraError::unaligned_extent(
            data_len,
            descriptor.interval_size,
        ));
    }
    let intervals = data_len / interval_size;
    let metadata_needed = intervals.saturating_mul(descriptor.metadata_unit_size());
    if metadata_len < metadata_needed {
        return Err(TesseraError::metadata_too_small(
            metadata_needed,
            metadata_len,
        ));
    }
    Ok(u64::try_from(intervals).expect("interval count fits in u64"))
}

/// Feed one interval's worth of data-stream bytes into the accumulator,
/// crossing as many physical segments as the interval spans. The extent
/// length was validated up front, so the stream cannot run dry mid-interval.
fn accumulate_data(data: &mut SegmentReader<'_>, interval_size: usize, acc: &mut GuardAccumulator) {
    let mut left = interval_size;
    while left > 0 {
        let run = data.take(left);
        debug_assert!(!run.is_empty(), "data stream exhausted mid-interval");
        if run.is_empty() {
            break;
        }
        acc.update(run);
        left -= run.len();
    }
}

fn exhausted_metadata(err: Exhausted) -> TesseraError {
    TesseraError::metadata_too_small(err.needed, err.available)
}
