//! Core value types: element fields, their packed form and read sections

use crate::constants::{MAX_POSITION, READ_ID_BITS};

/// Sort and grouping key of a sketch element
pub type Representation = u64;

/// Read identifier, global across a sequence source
pub type ReadId = u32;

/// Position of a sketch element's k-mer within its read
pub type PositionInRead = u32;

/// Strand a sketch element was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Direction {
    /// The k-mer as it appears in the read
    #[default]
    Forward = 0,
    /// The reverse complement of the k-mer was the smaller one
    ReverseComplement = 1,
}

impl Direction {
    /// Decode from the low bit of a packed element
    #[inline]
    pub const fn from_bit(bit: u64) -> Self {
        if bit & 1 == 0 {
            Direction::Forward
        } else {
            Direction::ReverseComplement
        }
    }

    /// Encode as a single bit
    #[inline]
    pub const fn bit(self) -> u64 {
        self as u64
    }
}

/// Read id, position and direction packed into one `u64`
///
/// Layout: `read_id << 32 | position << 1 | direction`. Packing keeps the
/// auxiliary fields together while elements are sorted by representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PackedRest(pub u64);

impl PackedRest {
    /// Pack the auxiliary fields. `position_in_read` must fit 31 bits.
    #[inline]
    pub const fn pack(read_id: ReadId, position_in_read: PositionInRead, direction: Direction) -> Self {
        debug_assert!(position_in_read as u64 <= MAX_POSITION);
        Self(((read_id as u64) << READ_ID_BITS) | ((position_in_read as u64) << 1) | direction.bit())
    }

    /// Read id field
    #[inline]
    pub const fn read_id(self) -> ReadId {
        (self.0 >> READ_ID_BITS) as ReadId
    }

    /// Position field
    #[inline]
    pub const fn position_in_read(self) -> PositionInRead {
        ((self.0 & 0xffff_ffff) >> 1) as PositionInRead
    }

    /// Direction field
    #[inline]
    pub const fn direction(self) -> Direction {
        Direction::from_bit(self.0)
    }
}

/// Location of one read inside the merged basepair buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSection {
    /// Global id of the read
    pub read_id: ReadId,
    /// Offset of the first basepair in the merged buffer
    pub offset: usize,
    /// Number of basepairs
    pub length: usize,
}

impl ReadSection {
    /// Byte range of this read inside the merged buffer
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.length
    }
}
