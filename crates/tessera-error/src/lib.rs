use thiserror::Error;

/// Primary error type for tessera operations.
///
/// Two families share the enum. Caller contract violations (malformed
/// descriptor, unaligned extent, undersized metadata) are detected once,
/// before the interval loop starts, and indicate a bug in the caller.
/// Protection faults (guard or reference-tag mismatch) are per-interval
/// data/metadata events reported with the zero-based interval index so the
/// caller can map them back to a physical address. Use
/// [`is_protection_fault`](Self::is_protection_fault) to separate the two.
#[derive(Error, Debug)]
pub enum TesseraError {
    // === Caller contract violations ===
    /// Interval size must be a non-zero power of two.
    #[error("interval size {size} is not a power of two")]
    IntervalSizeNotPowerOfTwo { size: u32 },

    /// The data extent does not divide evenly into intervals.
    #[error("extent length {extent} is not a multiple of interval size {interval_size}")]
    UnalignedExtent { extent: usize, interval_size: u32 },

    /// The metadata stream cannot hold one tuple (plus padding) per interval.
    #[error("metadata stream too small: need {needed} bytes, got {available}")]
    MetadataTooSmall { needed: usize, available: usize },

    /// A tuple was parsed from a buffer shorter than its layout requires.
    #[error("tuple buffer too small: expected {expected} bytes, got {actual}")]
    TupleBufferTooSmall { expected: usize, actual: usize },

    // === Protection faults ===
    /// Stored guard checksum disagrees with the recomputed checksum.
    #[error("guard mismatch in interval {interval}: stored {stored:#x}, computed {computed:#x}")]
    GuardFault {
        interval: u64,
        stored: u64,
        computed: u64,
    },

    /// Stored reference tag disagrees with the expected sequence value.
    #[error(
        "reference tag mismatch in interval {interval}: stored {stored:#x}, expected {expected:#x}"
    )]
    ReferenceTagFault {
        interval: u64,
        stored: u64,
        expected: u64,
    },
}

/// The kind of protection fault reported by a verify pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The guard checksum did not match the recomputed value.
    Guard,
    /// The reference tag did not match the expected sequence value.
    ReferenceTag,
}

impl TesseraError {
    /// True for per-interval data/metadata events (guard or reference-tag
    /// mismatch), false for caller contract violations.
    #[must_use]
    pub const fn is_protection_fault(&self) -> bool {
        matches!(
            self,
            Self::GuardFault { .. } | Self::ReferenceTagFault { .. }
        )
    }

    /// True for errors that indicate a bug in the caller rather than a
    /// data-integrity event.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        !self.is_protection_fault()
    }

    /// Zero-based index of the faulting interval, if this is a protection
    /// fault.
    #[must_use]
    pub const fn fault_interval(&self) -> Option<u64> {
        match self {
            Self::GuardFault { interval, .. } | Self::ReferenceTagFault { interval, .. } => {
                Some(*interval)
            }
            _ => None,
        }
    }

    /// The fault kind, if this is a protection fault.
    #[must_use]
    pub const fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::GuardFault { .. } => Some(FaultKind::Guard),
            Self::ReferenceTagFault { .. } => Some(FaultKind::ReferenceTag),
            _ => None,
        }
    }

    /// Create an unaligned-extent error.
    pub const fn unaligned_extent(extent: usize, interval_size: u32) -> Self {
        Self::UnalignedExtent {
            extent,
            interval_size,
        }
    }

    /// Create a metadata-too-small error.
    pub const fn metadata_too_small(needed: usize, available: usize) -> Self {
        Self::MetadataTooSmall { needed, available }
    }
}

/// Result type alias using `TesseraError`.
pub type Result<T> = std::result::Result<T, TesseraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_guard_fault() {
        let err = TesseraError::GuardFault {
            interval: 3,
            stored: 0xBEEF,
            computed: 0xDEAD,
        };
        assert_eq!(
            err.to_string(),
            "guard mismatch in interval 3: stored 0xbeef, computed 0xdead"
        );
    }

    #[test]
    fn error_display_reference_tag_fault() {
        let err = TesseraError::ReferenceTagFault {
            interval: 1,
            stored: 999,
            expected: 101,
        };
        assert_eq!(
            err.to_string(),
            "reference tag mismatch in interval 1: stored 0x3e7, expected 0x65"
        );
    }

    #[test]
    fn error_display_contract_violations() {
        assert_eq!(
            TesseraError::IntervalSizeNotPowerOfTwo { size: 500 }.to_string(),
            "interval size 500 is not a power of two"
        );
        assert_eq!(
            TesseraError::unaligned_extent(1000, 512).to_string(),
            "extent length 1000 is not a multiple of interval size 512"
        );
        assert_eq!(
            TesseraError::metadata_too_small(24, 16).to_string(),
            "metadata stream too small: need 24 bytes, got 16"
        );
    }

    #[test]
    fn fault_classification() {
        let guard = TesseraError::GuardFault {
            interval: 7,
            stored: 0,
            computed: 1,
        };
        assert!(guard.is_protection_fault());
        assert!(!guard.is_contract_violation());
        assert_eq!(guard.fault_interval(), Some(7));
        assert_eq!(guard.fault_kind(), Some(FaultKind::Guard));

        let reftag = TesseraError::ReferenceTagFault {
            interval: 0,
            stored: 2,
            expected: 3,
        };
        assert_eq!(reftag.fault_kind(), Some(FaultKind::ReferenceTag));
        assert_eq!(reftag.fault_interval(), Some(0));
    }

    #[test]
    fn contract_violation_classification() {
        let err = TesseraError::IntervalSizeNotPowerOfTwo { size: 3 };
        assert!(err.is_contract_violation());
        assert!(!err.is_protection_fault());
        assert_eq!(err.fault_interval(), None);
        assert_eq!(err.fault_kind(), None);

        let err = TesseraError::TupleBufferTooSmall {
            expected: 8,
            actual: 5,
        };
        assert!(err.is_contract_violation());
    }
}
