//! Index descriptors: which contiguous read range an index covers
//!
//! Large read sets are indexed in pieces. [`group_reads_into_descriptors`]
//! walks a source once and cuts it into consecutive ranges whose basepair
//! totals stay within a budget.

use tracing::debug;

use crate::error::{IndexError, Result};
use crate::sequence::SequenceSource;
use crate::types::ReadId;

/// Contiguous range of reads `[first_read_id, first_read_id + number_of_reads)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexDescriptor {
    /// First read of the range
    pub first_read_id: ReadId,
    /// Number of reads in the range
    pub number_of_reads: u32,
    /// Sum of the read lengths in the range, if known
    pub number_of_basepairs: u64,
}

impl IndexDescriptor {
    /// Descriptor of a read range; basepairs are left at 0
    pub fn new(first_read_id: ReadId, number_of_reads: u32) -> Self {
        Self { first_read_id, number_of_reads, number_of_basepairs: 0 }
    }

    /// Descriptor covering every read of a source
    pub fn whole_source(source: &dyn SequenceSource) -> Self {
        Self::new(0, source.number_of_reads())
    }

    /// Read ids covered, in order
    ///
    /// Ids saturate at `ReadId::MAX` for a range that does not fit; such a
    /// descriptor is rejected by [`IndexDescriptor::check_against`].
    pub fn read_ids(&self) -> impl Iterator<Item = ReadId> {
        let first = self.first_read_id;
        (0..self.number_of_reads).map(move |offset| first.saturating_add(offset))
    }

    /// One past the last read id; may be `ReadId::MAX + 1`
    pub fn past_the_last_read_id(&self) -> u64 {
        u64::from(self.first_read_id) + u64::from(self.number_of_reads)
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.number_of_reads == 0
    }

    /// Fail if the range reaches past the end of `source`
    pub fn check_against(&self, source: &dyn SequenceSource) -> Result<()> {
        let available = source.number_of_reads();
        let end = self.past_the_last_read_id();
        if self.number_of_reads > 0 && end > u64::from(available) {
            return Err(IndexError::ReadOutOfRange {
                read_id: (end - 1).min(u64::from(u32::MAX)) as u32,
                number_of_reads: available,
            });
        }
        Ok(())
    }
}

/// Split all reads of `source` into consecutive descriptors of at most
/// `max_basepairs_per_index` basepairs each
///
/// A read longer than the budget gets a descriptor of its own.
pub fn group_reads_into_descriptors(
    source: &dyn SequenceSource,
    max_basepairs_per_index: u64,
) -> Result<Vec<IndexDescriptor>> {
    if max_basepairs_per_index == 0 {
        return Err(IndexError::config("max_basepairs_per_index must be positive"));
    }

    let mut descriptors = Vec::new();
    let mut current = IndexDescriptor::new(0, 0);
    for read_id in 0..source.number_of_reads() {
        let length = source.get_sequence(read_id)?.basepairs.len() as u64;
        if current.number_of_reads > 0 && current.number_of_basepairs + length > max_basepairs_per_index {
            descriptors.push(current);
            current = IndexDescriptor::new(read_id, 0);
        }
        current.number_of_reads += 1;
        current.number_of_basepairs += length;
    }
    if current.number_of_reads > 0 {
        descriptors.push(current);
    }

    debug!(
        "grouped {} reads into {} descriptors (budget {} bp)",
        source.number_of_reads(),
        descriptors.len(),
        max_basepairs_per_index
    );
    Ok(descriptors)
}
