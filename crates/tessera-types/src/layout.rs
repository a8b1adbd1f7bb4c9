//! Protection-tuple layouts and wire codec.
//!
//! A tuple is the fixed-size protection record for one data interval. Two
//! on-wire layouts exist, selected per stream by the checksum algorithm and
//! never mixed within a stream. All multi-byte fields are big-endian
//! regardless of host endianness.
//!
//! Short layout (8 bytes):
//! ```text
//! Offset  Size  Description
//!   0       2   Guard checksum
//!   2       2   Application tag (0xFFFF = escape)
//!   4       4   Reference tag (0xFFFFFFFF = escape)
//! ```
//!
//! Extended layout (16 bytes):
//! ```text
//! Offset  Size  Description
//!   0       8   Guard checksum
//!   8       2   Application tag (0xFFFF = escape)
//!  10       6   Reference tag, 48-bit (all-0xFF = escape)
//! ```

use tessera_error::{Result, TesseraError};

/// Size of a short-layout tuple in bytes.
pub const SHORT_TUPLE_SIZE: usize = 8;

/// Size of an extended-layout tuple in bytes.
pub const EXTENDED_TUPLE_SIZE: usize = 16;

/// Upper bound on tuple size across layouts, used to size stack-local copy
/// buffers on the segment-straddling path.
pub const MAX_TUPLE_SIZE: usize = EXTENDED_TUPLE_SIZE;

/// Application-tag escape value: "do not check this tuple".
pub const APP_TAG_ESCAPE: u16 = 0xFFFF;

const SHORT_APP_TAG_OFFSET: usize = 2;
const SHORT_REF_TAG_OFFSET: usize = 4;
const EXTENDED_APP_TAG_OFFSET: usize = 8;
const EXTENDED_REF_TAG_OFFSET: usize = 10;

/// On-wire tuple layout, fixed for the lifetime of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TupleLayout {
    /// 8-byte tuple: 2-byte guard, 2-byte application tag, 4-byte reference
    /// tag.
    Short,
    /// 16-byte tuple: 8-byte guard, 2-byte application tag, 6-byte (48-bit)
    /// reference tag.
    Extended,
}

impl TupleLayout {
    /// Tuple size in bytes.
    #[must_use]
    pub const fn tuple_size(self) -> usize {
        match self {
            Self::Short => SHORT_TUPLE_SIZE,
            Self::Extended => EXTENDED_TUPLE_SIZE,
        }
    }

    /// Reference-tag escape value, sized to the field width.
    #[must_use]
    pub const fn ref_tag_escape(self) -> u64 {
        self.ref_tag_mask()
    }

    /// All-ones mask of the reference-tag field width. The running sequence
    /// value wraps at this width (32 bits short, 48 bits extended).
    #[must_use]
    pub const fn ref_tag_mask(self) -> u64 {
        match self {
            Self::Short => 0xFFFF_FFFF,
            Self::Extended => 0xFFFF_FFFF_FFFF,
        }
    }

    /// Byte offset of the reference-tag field within the tuple.
    #[must_use]
    pub const fn ref_tag_offset(self) -> usize {
        match self {
            Self::Short => SHORT_REF_TAG_OFFSET,
            Self::Extended => EXTENDED_REF_TAG_OFFSET,
        }
    }

    /// Byte offset of the application-tag field within the tuple.
    #[must_use]
    pub const fn app_tag_offset(self) -> usize {
        match self {
            Self::Short => SHORT_APP_TAG_OFFSET,
            Self::Extended => EXTENDED_APP_TAG_OFFSET,
        }
    }

    /// Read the reference tag from raw tuple bytes without parsing the rest
    /// of the record. `tuple` must be at least [`tuple_size`](Self::tuple_size)
    /// bytes.
    #[must_use]
    pub fn read_ref_tag(self, tuple: &[u8]) -> u64 {
        match self {
            Self::Short => u64::from(read_be_u32_at(tuple, SHORT_REF_TAG_OFFSET)),
            Self::Extended => read_be_u48_at(tuple, EXTENDED_REF_TAG_OFFSET),
        }
    }

    /// Write the reference tag into raw tuple bytes, leaving guard and
    /// application-tag bytes untouched. The value is masked to the field
    /// width.
    pub fn write_ref_tag(self, tuple: &mut [u8], value: u64) {
        match self {
            Self::Short => {
                let masked = u32::try_from(value & self.ref_tag_mask())
                    .expect("masked reference tag fits in u32");
                write_be_u32_at(tuple, SHORT_REF_TAG_OFFSET, masked);
            }
            Self::Extended => {
                write_be_u48_at(tuple, EXTENDED_REF_TAG_OFFSET, value & self.ref_tag_mask());
            }
        }
    }
}

/// Short-layout tuple fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortTuple {
    /// Guard checksum of the interval's data bytes.
    pub guard: u16,
    /// Opaque application tag.
    pub app_tag: u16,
    /// Reference tag, expected to equal the interval's sequence value.
    pub ref_tag: u32,
}

impl ShortTuple {
    /// Parse from the first 8 bytes of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        ensure_tuple_len(buf, SHORT_TUPLE_SIZE)?;
        Ok(Self {
            guard: read_be_u16_at(buf, 0),
            app_tag: read_be_u16_at(buf, SHORT_APP_TAG_OFFSET),
            ref_tag: read_be_u32_at(buf, SHORT_REF_TAG_OFFSET),
        })
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; SHORT_TUPLE_SIZE] {
        let mut out = [0_u8; SHORT_TUPLE_SIZE];
        write_be_u16_at(&mut out, 0, self.guard);
        write_be_u16_at(&mut out, SHORT_APP_TAG_OFFSET, self.app_tag);
        write_be_u32_at(&mut out, SHORT_REF_TAG_OFFSET, self.ref_tag);
        out
    }
}

/// Extended-layout tuple fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedTuple {
    /// Guard checksum of the interval's data bytes.
    pub guard: u64,
    /// Opaque application tag.
    pub app_tag: u16,
    /// 48-bit reference tag; the upper 16 bits of the field are always zero.
    pub ref_tag: u64,
}

impl ExtendedTuple {
    /// Parse from the first 16 bytes of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        ensure_tuple_len(buf, EXTENDED_TUPLE_SIZE)?;
        Ok(Self {
            guard: read_be_u64_at(buf, 0),
            app_tag: read_be_u16_at(buf, EXTENDED_APP_TAG_OFFSET),
            ref_tag: read_be_u48_at(buf, EXTENDED_REF_TAG_OFFSET),
        })
    }

    /// Serialize to wire bytes. The reference tag is masked to 48 bits.
    #[must_use]
    pub fn to_bytes(self) -> [u8; EXTENDED_TUPLE_SIZE] {
        let mut out = [0_u8; EXTENDED_TUPLE_SIZE];
        write_be_u64_at(&mut out, 0, self.guard);
        write_be_u16_at(&mut out, EXTENDED_APP_TAG_OFFSET, self.app_tag);
        write_be_u48_at(&mut out, EXTENDED_REF_TAG_OFFSET, self.ref_tag);
        out
    }
}

/// A protection tuple in either layout.
///
/// The layout is selected once per stream from the checksum algorithm;
/// representing it as a tagged variant avoids any reliance on memory-layout
/// aliasing between the two record shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tuple {
    Short(ShortTuple),
    Extended(ExtendedTuple),
}

impl Tuple {
    /// Compose a tuple for `layout` from field values. `guard` and `ref_tag`
    /// are truncated to the layout's field widths.
    #[must_use]
    pub fn compose(layout: TupleLayout, guard: u64, app_tag: u16, ref_tag: u64) -> Self {
        match layout {
            TupleLayout::Short => Self::Short(ShortTuple {
                guard: (guard & 0xFFFF) as u16,
                app_tag,
                ref_tag: (ref_tag & 0xFFFF_FFFF) as u32,
            }),
            TupleLayout::Extended => Self::Extended(ExtendedTuple {
                guard,
                app_tag,
                ref_tag: ref_tag & layout.ref_tag_mask(),
            }),
        }
    }

    /// Parse a tuple of the given layout from wire bytes.
    pub fn parse(layout: TupleLayout, buf: &[u8]) -> Result<Self> {
        match layout {
            TupleLayout::Short => ShortTuple::from_bytes(buf).map(Self::Short),
            TupleLayout::Extended => ExtendedTuple::from_bytes(buf).map(Self::Extended),
        }
    }

    /// Write this tuple's wire bytes into `out`, which must hold at least
    /// [`TupleLayout::tuple_size`] bytes for this tuple's layout.
    pub fn write_to(self, out: &mut [u8]) {
        match self {
            Self::Short(t) => out[..SHORT_TUPLE_SIZE].copy_from_slice(&t.to_bytes()),
            Self::Extended(t) => out[..EXTENDED_TUPLE_SIZE].copy_from_slice(&t.to_bytes()),
        }
    }

    /// This tuple's layout.
    #[must_use]
    pub const fn layout(self) -> TupleLayout {
        match self {
            Self::Short(_) => TupleLayout::Short,
            Self::Extended(_) => TupleLayout::Extended,
        }
    }

    /// Guard checksum, widened to u64.
    #[must_use]
    pub const fn guard(self) -> u64 {
        match self {
            Self::Short(t) => t.guard as u64,
            Self::Extended(t) => t.guard,
        }
    }

    /// Application tag.
    #[must_use]
    pub const fn app_tag(self) -> u16 {
        match self {
            Self::Short(t) => t.app_tag,
            Self::Extended(t) => t.app_tag,
        }
    }

    /// Reference tag, widened to u64.
    #[must_use]
    pub const fn ref_tag(self) -> u64 {
        match self {
            Self::Short(t) => t.ref_tag as u64,
            Self::Extended(t) => t.ref_tag,
        }
    }

    /// True when the application tag holds the escape value.
    #[must_use]
    pub const fn app_tag_escaped(self) -> bool {
        self.app_tag() == APP_TAG_ESCAPE
    }

    /// True when the reference tag holds the escape value for this layout.
    #[must_use]
    pub const fn ref_tag_escaped(self) -> bool {
        self.ref_tag() == self.layout().ref_tag_escape()
    }
}

fn ensure_tuple_len(buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() < expected {
        return Err(TesseraError::TupleBufferTooSmall {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn read_be_u16_at(bytes: &[u8], offset: usize) -> u16 {
    let mut raw = [0_u8; 2];
    raw.copy_from_slice(&bytes[offset..offset + 2]);
    u16::from_be_bytes(raw)
}

fn write_be_u16_at(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn read_be_u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0_u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(raw)
}

fn write_be_u32_at(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn read_be_u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0_u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(raw)
}

fn write_be_u64_at(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}

fn read_be_u48_at(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0_u8; 8];
    raw[2..].copy_from_slice(&bytes[offset..offset + 6]);
    u64::from_be_bytes(raw)
}

fn write_be_u48_at(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 6].copy_from_slice(&value.to_be_bytes()[2..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_tuple_wire_offsets() {
        let tuple = ShortTuple {
            guard: 0x1234,
            app_tag: 0x5678,
            ref_tag: 0x9ABC_DEF0,
        };
        let bytes = tuple.to_bytes();
        assert_eq!(bytes, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);

        let parsed = ShortTuple::from_bytes(&bytes).expect("tuple should parse");
        assert_eq!(parsed, tuple);
    }

    #[test]
    fn extended_tuple_wire_offsets() {
        let tuple = ExtendedTuple {
            guard: 0x0102_0304_0506_0708,
            app_tag: 0x1112,
            ref_tag: 0x2122_2324_2526,
        };
        let bytes = tuple.to_bytes();
        assert_eq!(
            bytes,
            [
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // guard
                0x11, 0x12, // application tag
                0x21, 0x22, 0x23, 0x24, 0x25, 0x26, // 48-bit reference tag
            ]
        );

        let parsed = ExtendedTuple::from_bytes(&bytes).expect("tuple should parse");
        assert_eq!(parsed, tuple);
    }

    #[test]
    fn extended_ref_tag_masked_to_48_bits() {
        let tuple = ExtendedTuple {
            guard: 0,
            app_tag: 0,
            ref_tag: 0xFFFF_1234_5678_9ABC,
        };
        let bytes = tuple.to_bytes();
        let parsed = ExtendedTuple::from_bytes(&bytes).expect("tuple should parse");
        assert_eq!(parsed.ref_tag, 0x1234_5678_9ABC);
    }

    #[test]
    fn compose_truncates_to_layout_widths() {
        let tuple = Tuple::compose(TupleLayout::Short, 0xABCD_1234, 7, 0x5_0000_0001);
        assert_eq!(tuple.guard(), 0x1234);
        assert_eq!(tuple.app_tag(), 7);
        assert_eq!(tuple.ref_tag(), 1);

        let tuple = Tuple::compose(TupleLayout::Extended, u64::MAX, 7, u64::MAX);
        assert_eq!(tuple.guard(), u64::MAX);
        assert_eq!(tuple.ref_tag(), 0xFFFF_FFFF_FFFF);
    }

    #[test]
    fn parse_rejects_short_buffer() {
        let err = Tuple::parse(TupleLayout::Extended, &[0_u8; 10])
            .expect_err("short buffer must be rejected");
        assert!(matches!(
            err,
            TesseraError::TupleBufferTooSmall {
                expected: 16,
                actual: 10
            }
        ));
    }

    #[test]
    fn ref_tag_subfield_rewrite_leaves_other_fields() {
        let tuple = ShortTuple {
            guard: 0xAAAA,
            app_tag: 0xBBBB,
            ref_tag: 100,
        };
        let mut bytes = tuple.to_bytes();
        TupleLayout::Short.write_ref_tag(&mut bytes, 200);

        let parsed = ShortTuple::from_bytes(&bytes).expect("tuple should parse");
        assert_eq!(parsed.guard, 0xAAAA);
        assert_eq!(parsed.app_tag, 0xBBBB);
        assert_eq!(parsed.ref_tag, 200);
        assert_eq!(TupleLayout::Short.read_ref_tag(&bytes), 200);
    }

    #[test]
    fn ref_tag_subfield_rewrite_extended() {
        let tuple = ExtendedTuple {
            guard: 0x1111_2222_3333_4444,
            app_tag: 0x5555,
            ref_tag: 0x0000_0000_0064,
        };
        let mut bytes = tuple.to_bytes();
        TupleLayout::Extended.write_ref_tag(&mut bytes, 0xFFFF_0000_0000_00C8);

        let parsed = ExtendedTuple::from_bytes(&bytes).expect("tuple should parse");
        assert_eq!(parsed.guard, 0x1111_2222_3333_4444);
        assert_eq!(parsed.app_tag, 0x5555);
        assert_eq!(parsed.ref_tag, 0xC8);
    }

    #[test]
    fn escape_values() {
        assert_eq!(TupleLayout::Short.ref_tag_escape(), 0xFFFF_FFFF);
        assert_eq!(TupleLayout::Extended.ref_tag_escape(), 0xFFFF_FFFF_FFFF);

        let escaped = Tuple::compose(
            TupleLayout::Short,
            0,
            APP_TAG_ESCAPE,
            TupleLayout::Short.ref_tag_escape(),
        );
        assert!(escaped.app_tag_escaped());
        assert!(escaped.ref_tag_escaped());

        let real = Tuple::compose(TupleLayout::Short, 0, 0, 42);
        assert!(!real.app_tag_escaped());
        assert!(!real.ref_tag_escaped());
    }

    #[test]
    fn sequence_masks() {
        assert_eq!(TupleLayout::Short.ref_tag_mask(), 0xFFFF_FFFF);
        assert_eq!(TupleLayout::Extended.ref_tag_mask(), 0xFFFF_FFFF_FFFF);
        assert_eq!(TupleLayout::Short.tuple_size(), 8);
        assert_eq!(TupleLayout::Extended.tuple_size(), 16);
    }
}
