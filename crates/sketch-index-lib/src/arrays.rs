//! The six co-indexed arrays an index owns
//!
//! Four parallel element arrays sorted by representation, plus the
//! unique-representation table pointing into them.

use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::memory::{MemoryPool, WorkingBuffer};
use crate::types::{Direction, PositionInRead, ReadId, Representation};

/// Structure-of-arrays storage of a sorted, grouped sketch
#[derive(Debug)]
pub struct SketchArrays {
    /// Sort key of every element, ascending
    pub representations: WorkingBuffer<Representation>,
    /// Read of every element
    pub read_ids: WorkingBuffer<ReadId>,
    /// Position in read of every element
    pub positions_in_reads: WorkingBuffer<PositionInRead>,
    /// Strand of every element
    pub directions: WorkingBuffer<Direction>,
    /// Distinct representations, strictly ascending
    pub unique_representations: WorkingBuffer<Representation>,
    /// First element of each distinct representation, plus trailing sentinel
    pub first_occurrence: WorkingBuffer<u64>,
}

impl SketchArrays {
    /// An array set with no elements; all six arrays are empty
    pub fn empty(allocator: &Arc<MemoryPool>) -> Result<Self> {
        Ok(Self {
            representations: allocator.adopt(Vec::new())?,
            read_ids: allocator.adopt(Vec::new())?,
            positions_in_reads: allocator.adopt(Vec::new())?,
            directions: allocator.adopt(Vec::new())?,
            unique_representations: allocator.adopt(Vec::new())?,
            first_occurrence: allocator.adopt(Vec::new())?,
        })
    }

    /// Number of sketch elements
    pub fn len(&self) -> usize {
        self.representations.len()
    }

    /// Whether the set holds no sketch elements
    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    /// Verify the ordering and consistency invariants between the arrays
    ///
    /// - the four element arrays have equal length
    /// - representations ascend, and inside an equal run read ids ascend,
    ///   with positions ascending inside equal read ids
    /// - `first_occurrence` starts at 0, strictly increases, ends at the
    ///   element count and points at the matching unique representation
    ///
    /// A set without reads may leave `first_occurrence` empty instead of
    /// holding the lone sentinel 0.
    pub fn check_invariants(&self) -> Result<()> {
        let n = self.representations.len();
        if self.read_ids.len() != n || self.positions_in_reads.len() != n || self.directions.len() != n {
            return Err(IndexError::inconsistent(format!(
                "element arrays differ in length: {} / {} / {} / {}",
                n,
                self.read_ids.len(),
                self.positions_in_reads.len(),
                self.directions.len()
            )));
        }

        for i in 1..n {
            let (prev, cur) = (self.representations[i - 1], self.representations[i]);
            if prev > cur {
                return Err(IndexError::inconsistent(format!("representations descend at index {i}")));
            }
            if prev == cur {
                let prev_key = (self.read_ids[i - 1], self.positions_in_reads[i - 1]);
                let cur_key = (self.read_ids[i], self.positions_in_reads[i]);
                if prev_key > cur_key {
                    return Err(IndexError::inconsistent(format!(
                        "read order broken inside representation {cur} at index {i}"
                    )));
                }
            }
        }

        let m = self.unique_representations.len();
        if n == 0 && m == 0 && self.first_occurrence.is_empty() {
            return Ok(());
        }
        if self.first_occurrence.len() != m + 1 {
            return Err(IndexError::inconsistent(format!(
                "first_occurrence has {} entries for {} unique representations",
                self.first_occurrence.len(),
                m
            )));
        }
        if self.first_occurrence[0] != 0 || self.first_occurrence[m] != n as u64 {
            return Err(IndexError::inconsistent("first_occurrence does not span the element arrays"));
        }
        if self.first_occurrence.windows(2).any(|w| w[0] >= w[1]) {
            return Err(IndexError::inconsistent("first_occurrence is not strictly increasing"));
        }
        if self.unique_representations.windows(2).any(|w| w[0] >= w[1]) {
            return Err(IndexError::inconsistent("unique_representations is not strictly increasing"));
        }
        for (i, &start) in self.first_occurrence[..m].iter().enumerate() {
            if self.representations[start as usize] != self.unique_representations[i] {
                return Err(IndexError::inconsistent(format!(
                    "unique representation {i} does not match its first element"
                )));
            }
        }
        Ok(())
    }
}
