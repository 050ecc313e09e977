//! Read selection and merging
//!
//! Reads shorter than one window cannot produce a sketch element and are
//! skipped with a warning. The rest are concatenated into a single working
//! buffer with a section table recording where each read landed.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::window_span;
use crate::descriptor::IndexDescriptor;
use crate::error::Result;
use crate::memory::{MemoryPool, WorkingBuffer};
use crate::sequence::SequenceSource;
use crate::types::ReadSection;

/// Qualifying reads of one descriptor, back to back
#[derive(Debug)]
pub struct MergedReads {
    /// All qualifying reads concatenated
    pub basepairs: WorkingBuffer<u8>,
    /// Where each qualifying read lives in `basepairs`
    pub sections: Vec<ReadSection>,
    /// Length of the longest qualifying read
    pub longest_read: u32,
}

impl MergedReads {
    /// Number of qualifying reads
    pub fn number_of_reads(&self) -> usize {
        self.sections.len()
    }
}

/// Select the reads of `descriptor` that cover at least one window and
/// merge them into one buffer charged to `allocator`
///
/// Returns `None` when no read qualifies.
pub fn merge_reads(
    source: &dyn SequenceSource,
    descriptor: &IndexDescriptor,
    kmer_size: usize,
    window_size: usize,
    allocator: &Arc<MemoryPool>,
) -> Result<Option<MergedReads>> {
    descriptor.check_against(source)?;
    let min_length = window_span(kmer_size, window_size);

    let mut selected: Vec<(u32, &[u8])> = Vec::with_capacity(descriptor.number_of_reads as usize);
    for read_id in descriptor.read_ids() {
        let read = source.get_sequence(read_id)?;
        if read.basepairs.len() >= min_length {
            selected.push((read_id, read.basepairs));
        } else {
            warn!(
                "Skipping read {} ({}): it has {} basepairs, one window covers {} basepairs",
                read_id,
                read.name,
                read.basepairs.len(),
                min_length
            );
        }
    }

    if selected.is_empty() {
        return Ok(None);
    }

    let total_basepairs: usize = selected.iter().map(|(_, bp)| bp.len()).sum();
    let mut basepairs = allocator.allocate::<u8>(total_basepairs)?;
    let mut sections = Vec::with_capacity(selected.len());
    let mut offset = 0;
    let mut longest_read = 0;
    {
        let buffer = basepairs.as_mut_slice();
        for (read_id, read) in selected {
            buffer[offset..offset + read.len()].copy_from_slice(read);
            sections.push(ReadSection { read_id, offset, length: read.len() });
            offset += read.len();
            longest_read = longest_read.max(read.len() as u32);
        }
    }
    debug!(
        "merged {} reads, {} basepairs, longest read {}",
        sections.len(),
        total_basepairs,
        longest_read
    );

    Ok(Some(MergedReads { basepairs, sections, longest_read }))
}
