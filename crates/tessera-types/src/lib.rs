//! Core types for the tessera data-integrity engine: the checksum-algorithm
//! selector, the per-operation stream descriptor, and the protection-tuple
//! wire codec.

pub mod layout;

pub use layout::{
    APP_TAG_ESCAPE, EXTENDED_TUPLE_SIZE, ExtendedTuple, MAX_TUPLE_SIZE, SHORT_TUPLE_SIZE,
    ShortTuple, Tuple, TupleLayout,
};

use tessera_error::{Result, TesseraError};

/// Guard checksum algorithm for a protection stream.
///
/// The algorithm fully determines the tuple layout: [`Nvme64`](Self::Nvme64)
/// streams carry extended (16-byte) tuples, all others carry short (8-byte)
/// tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GuardAlgorithm {
    /// CRC-16/T10-DIF over the interval's data bytes.
    T10Dif,
    /// CRC-64/NVMe over the interval's data bytes.
    Nvme64,
    /// Ones'-complement internet checksum, folded to 16 bits.
    IpChecksum,
}

impl GuardAlgorithm {
    /// The tuple layout implied by this algorithm.
    #[must_use]
    pub const fn layout(self) -> TupleLayout {
        match self {
            Self::Nvme64 => TupleLayout::Extended,
            Self::T10Dif | Self::IpChecksum => TupleLayout::Short,
        }
    }
}

/// Immutable per-operation stream configuration.
///
/// Supplied by the caller for each generate, verify, or remap call; the
/// engine never mutates it. All mutable walk state (cursors, accumulator,
/// sequence value) is call-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProtectionDescriptor {
    /// Guard checksum algorithm; also selects the tuple layout.
    pub algorithm: GuardAlgorithm,
    /// Protection interval size in bytes. Must be a non-zero power of two;
    /// validated once per call, before the interval loop.
    pub interval_size: u32,
    /// Starting sequence value for the reference tag, typically derived from
    /// the logical block address. Masked to the layout's reference-tag width.
    pub seed: u64,
    /// Whether verify compares stored reference tags against the expected
    /// sequence values.
    pub check_reference_tag: bool,
    /// Bytes of caller-private metadata preceding each tuple inside its
    /// containing metadata unit.
    pub leading_padding: usize,
    /// When set, the leading padding bytes of each metadata unit are mixed
    /// into the guard checksum after the interval's data bytes.
    pub guard_includes_padding: bool,
}

impl ProtectionDescriptor {
    /// Create a descriptor with reference-tag checking enabled and no
    /// leading padding.
    #[must_use]
    pub const fn new(algorithm: GuardAlgorithm, interval_size: u32, seed: u64) -> Self {
        Self {
            algorithm,
            interval_size,
            seed,
            check_reference_tag: true,
            leading_padding: 0,
            guard_includes_padding: false,
        }
    }

    /// The tuple layout implied by this descriptor's algorithm.
    #[must_use]
    pub const fn layout(&self) -> TupleLayout {
        self.algorithm.layout()
    }

    /// Interval size as a `usize`.
    #[must_use]
    pub const fn interval_size_usize(&self) -> usize {
        self.interval_size as usize
    }

    /// Size of one metadata unit: leading padding plus one tuple.
    #[must_use]
    pub const fn metadata_unit_size(&self) -> usize {
        self.leading_padding + self.layout().tuple_size()
    }

    /// Validate the descriptor. Called once per engine call, before the
    /// interval loop; a failure here is a caller programming error.
    pub fn validate(&self) -> Result<()> {
        if !self.interval_size.is_power_of_two() {
            return Err(TesseraError::IntervalSizeNotPowerOfTwo {
                size: self.interval_size,
            });
        }
        Ok(())
    }
}
