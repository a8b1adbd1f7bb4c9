//! Guard checksum strategies.
//!
//! One running accumulator per algorithm behind a single enum: feed it byte
//! spans with [`GuardAccumulator::update`] (possibly many times per interval
//! when the data stream's physical segmentation splits an interval), then
//! call [`GuardAccumulator::finish`] exactly once at the interval boundary.
//! All three strategies are pure data transforms with no side effects.

use crc::{CRC_16_T10_DIF, CRC_64_NVME, Crc};
use tessera_types::GuardAlgorithm;

static CRC16_T10DIF: Crc<u16> = Crc::<u16>::new(&CRC_16_T10_DIF);
static CRC64_NVME: Crc<u64> = Crc::<u64>::new(&CRC_64_NVME);

/// Running guard checksum for one protection interval.
///
/// Created fresh at each interval boundary; consumed by
/// [`finish`](Self::finish). The internet-checksum variant is the only one
/// whose finish is not a plain finalization: it folds the 32-bit
/// ones'-complement sum to 16 bits and complements it.
pub enum GuardAccumulator {
    T10Dif(crc::Digest<'static, u16>),
    Nvme64(crc::Digest<'static, u64>),
    IpChecksum(IpAccumulator),
}

impl GuardAccumulator {
    /// Start a fresh accumulator for `algorithm`.
    #[must_use]
    pub fn new(algorithm: GuardAlgorithm) -> Self {
        match algorithm {
            GuardAlgorithm::T10Dif => Self::T10Dif(CRC16_T10DIF.digest()),
            GuardAlgorithm::Nvme64 => Self::Nvme64(CRC64_NVME.digest()),
            GuardAlgorithm::IpChecksum => Self::IpChecksum(IpAccumulator::default()),
        }
    }

    /// Mix a byte span into the running checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::T10Dif(digest) => digest.update(bytes),
            Self::Nvme64(digest) => digest.update(bytes),
            Self::IpChecksum(acc) => acc.update(bytes),
        }
    }

    /// Finish the interval and return the guard value, widened to u64.
    #[must_use]
    pub fn finish(self) -> u64 {
        match self {
            Self::T10Dif(digest) => u64::from(digest.finalize()),
            Self::Nvme64(digest) => digest.finalize(),
            Self::IpChecksum(acc) => u64::from(acc.finish()),
        }
    }
}

/// Resumable ones'-complement internet checksum (RFC 1071 family).
///
/// The sum is taken over big-endian 16-bit words with end-around carry. A
/// span ending on an odd byte leaves that byte pending so the next `update`
/// pairs it with the following byte; segmentation of the input therefore
/// never changes the result.
#[derive(Debug, Default)]
pub struct IpAccumulator {
    sum: u32,
    pending: Option<u8>,
}

impl IpAccumulator {
    fn add_word(&mut self, word: u16) {
        let (sum, carry) = self.sum.overflowing_add(u32::from(word));
        self.sum = sum + u32::from(carry);
    }

    /// Mix a byte span into the running sum.
    pub fn update(&mut self, bytes: &[u8]) {
        let mut bytes = bytes;
        if let Some(high) = self.pending.take() {
            match bytes.split_first() {
                Some((&low, rest)) => {
                    self.add_word(u16::from_be_bytes([high, low]));
                    bytes = rest;
                }
                None => {
                    self.pending = Some(high);
                    return;
                }
            }
        }
        let mut words = bytes.chunks_exact(2);
        for word in &mut words {
            self.add_word(u16::from_be_bytes([word[0], word[1]]));
        }
        self.pending = words.remainder().first().copied();
    }

    /// Fold the 32-bit sum to 16 bits and complement it. A trailing odd byte
    /// is padded with a zero low byte, as if the data ended on a word
    /// boundary.
    #[must_use]
    pub fn finish(mut self) -> u16 {
        if let Some(high) = self.pending.take() {
            self.add_word(u16::from_be_bytes([high, 0]));
        }
        let mut sum = self.sum;
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !u16::try_from(sum).expect("folded sum fits in 16 bits")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straightforward whole-buffer reference for the internet checksum.
    fn ip_reference(data: &[u8]) -> u16 {
        let mut sum: u64 = 0;
        for word in data.chunks(2) {
            let high = u64::from(word[0]) << 8;
            let low = word.get(1).copied().map_or(0, u64::from);
            sum += high + low;
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !u16::try_from(sum).expect("folded sum fits in 16 bits")
    }

    #[test]
    fn crc16_t10dif_check_value() {
        // Catalog check value for the CRC-16/T10-DIF polynomial.
        let mut acc = GuardAccumulator::new(GuardAlgorithm::T10Dif);
        acc.update(b"123456789");
        assert_eq!(acc.finish(), 0xD0DB);
    }

    #[test]
    fn crc64_nvme_check_value() {
        // Catalog check value for the CRC-64/NVME polynomial.
        let mut acc = GuardAccumulator::new(GuardAlgorithm::Nvme64);
        acc.update(b"123456789");
        assert_eq!(acc.finish(), 0xAE8B_1486_0A79_9888);
    }

    #[test]
    fn ip_checksum_rfc1071_example() {
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        // Word sum is 0x2DDF0; end-around fold gives 0xDDF2.
        let mut acc = GuardAccumulator::new(GuardAlgorithm::IpChecksum);
        acc.update(&data);
        assert_eq!(acc.finish(), u64::from(!0xDDF2_u16));
    }

    #[test]
    fn crc_accumulators_are_split_invariant() {
        let data: Vec<u8> = (0_u16..512).map(|i| (i % 251) as u8).collect();
        for algorithm in [GuardAlgorithm::T10Dif, GuardAlgorithm::Nvme64] {
            let mut whole = GuardAccumulator::new(algorithm);
            whole.update(&data);
            let expected = whole.finish();

            let mut split = GuardAccumulator::new(algorithm);
            split.update(&data[..7]);
            split.update(&data[7..100]);
            split.update(&data[100..]);
            assert_eq!(split.finish(), expected, "{algorithm:?}");
        }
    }

    #[test]
    fn ip_checksum_survives_odd_splits() {
        let data: Vec<u8> = (0_u16..257).map(|i| (i.wrapping_mul(31) % 256) as u8).collect();
        let expected = ip_reference(&data);

        // Split at every possible point, including odd offsets that force
        // the pending-byte path.
        for cut in 0..data.len() {
            let mut acc = IpAccumulator::default();
            acc.update(&data[..cut]);
            acc.update(&data[cut..]);
            assert_eq!(acc.finish(), expected, "cut at {cut}");
        }

        // Byte-at-a-time feeding.
        let mut acc = IpAccumulator::default();
        for byte in &data {
            acc.update(std::slice::from_ref(byte));
        }
        assert_eq!(acc.finish(), expected);
    }

    #[test]
    fn ip_checksum_empty_update_keeps_pending() {
        let mut acc = IpAccumulator::default();
        acc.update(&[0xAB]);
        acc.update(&[]);
        acc.update(&[0xCD]);

        let mut whole = IpAccumulator::default();
        whole.update(&[0xAB, 0xCD]);
        assert_eq!(acc.finish(), whole.finish());
    }
}
