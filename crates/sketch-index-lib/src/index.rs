//! The sketch index and its read-side API
//!
//! A [`SketchIndex`] is created by [`IndexBuilder::build`] or
//! [`SketchIndex::from_host_snapshot`]; both return immediately while the
//! heavy lifting runs on the context's queues. All array accessors fail
//! with [`IndexError::NotReady`] until [`SketchIndex::wait_until_ready`]
//! (or a successful [`SketchIndex::is_ready`] poll) has observed that the
//! work is done. From then on the arrays are immutable and can be read
//! from any number of threads.
//!
//! [`IndexBuilder::build`]: crate::builder::IndexBuilder::build

use crate::arrays::SketchArrays;
use crate::builder::filter::FilterStatistics;
use crate::error::{IndexError, Result};
use crate::execution::Completion;
use crate::readiness::{ReadinessGate, ReadinessState};
use crate::types::{Direction, PositionInRead, ReadId, Representation};

/// Parameters an index was built with, readable at any time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexMetadata {
    /// K-mer length
    pub kmer_size: usize,
    /// K-mers per window
    pub window_size: usize,
    /// Whether representations are hashed encodings
    pub hash_representations: bool,
    /// Filtering parameter the arrays were filtered with (1.0 = unfiltered)
    pub filtering_parameter: f64,
    /// First read id of the index's descriptor
    pub first_read_id: ReadId,
}

/// What the construction job produces
#[derive(Debug)]
pub(crate) struct IndexContents {
    pub(crate) arrays: SketchArrays,
    pub(crate) number_of_reads: u32,
    pub(crate) longest_read: u32,
    pub(crate) filter_statistics: Option<FilterStatistics>,
}

/// An immutable, asynchronously constructed index of sketch elements
#[derive(Debug)]
pub struct SketchIndex {
    metadata: IndexMetadata,
    gate: ReadinessGate<IndexContents>,
}

impl SketchIndex {
    pub(crate) fn from_parts(metadata: IndexMetadata, gate: ReadinessGate<IndexContents>) -> Self {
        Self { metadata, gate }
    }

    /// Construction parameters
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// K-mer length
    pub fn kmer_size(&self) -> usize {
        self.metadata.kmer_size
    }

    /// K-mers per window
    pub fn window_size(&self) -> usize {
        self.metadata.window_size
    }

    /// First read id of the descriptor this index was built from
    pub fn first_read_id(&self) -> ReadId {
        self.metadata.first_read_id
    }

    /// Non-blocking readiness poll
    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Building or Ready
    pub fn state(&self) -> ReadinessState {
        self.gate.state()
    }

    /// Block until all construction or transfer work has finished
    ///
    /// Returns the construction error if the work failed; repeat calls are
    /// cheap.
    pub fn wait_until_ready(&self) -> Result<()> {
        self.gate.wait_until_ready()
    }

    fn contents(&self) -> Result<&IndexContents> {
        self.gate.get()
    }

    /// Shareable handle to the contents of a Ready index, for jobs that
    /// read the arrays from another thread
    pub(crate) fn ready_contents(&self) -> Result<Completion<IndexContents>> {
        self.gate.get()?;
        Ok(self.gate.work().clone())
    }

    /// Sort key of every sketch element, ascending
    pub fn representations(&self) -> Result<&[Representation]> {
        Ok(self.contents()?.arrays.representations.as_slice())
    }

    /// Read id of every sketch element
    pub fn read_ids(&self) -> Result<&[ReadId]> {
        Ok(self.contents()?.arrays.read_ids.as_slice())
    }

    /// Position in read of every sketch element
    pub fn positions_in_reads(&self) -> Result<&[PositionInRead]> {
        Ok(self.contents()?.arrays.positions_in_reads.as_slice())
    }

    /// Strand of every sketch element
    pub fn directions(&self) -> Result<&[Direction]> {
        Ok(self.contents()?.arrays.directions.as_slice())
    }

    /// Distinct representations, strictly ascending
    pub fn unique_representations(&self) -> Result<&[Representation]> {
        Ok(self.contents()?.arrays.unique_representations.as_slice())
    }

    /// Index of the first element of each distinct representation, plus
    /// a trailing sentinel equal to the number of elements
    pub fn first_occurrence_of_representations(&self) -> Result<&[u64]> {
        Ok(self.contents()?.arrays.first_occurrence.as_slice())
    }

    /// All six arrays at once
    pub fn arrays(&self) -> Result<&SketchArrays> {
        Ok(&self.contents()?.arrays)
    }

    /// Reads covered: the descriptor's count, or 0 if no read qualified
    pub fn number_of_reads(&self) -> Result<u32> {
        Ok(self.contents()?.number_of_reads)
    }

    /// Smallest read id covered, 0 for an empty index
    pub fn smallest_read_id(&self) -> Result<ReadId> {
        let contents = self.contents()?;
        Ok(if contents.number_of_reads == 0 { 0 } else { self.metadata.first_read_id })
    }

    /// Largest read id covered, 0 for an empty index
    pub fn largest_read_id(&self) -> Result<ReadId> {
        let contents = self.contents()?;
        Ok(if contents.number_of_reads == 0 {
            0
        } else {
            self.metadata.first_read_id + (contents.number_of_reads - 1)
        })
    }

    /// Length of the longest read that contributed sketch elements
    pub fn number_of_basepairs_in_longest_read(&self) -> Result<u32> {
        Ok(self.contents()?.longest_read)
    }

    /// What the frequency filter removed, `None` if it did not run
    pub fn filter_statistics(&self) -> Result<Option<FilterStatistics>> {
        Ok(self.contents()?.filter_statistics)
    }

    /// Verify the ordering and consistency invariants of a ready index
    pub fn check_invariants(&self) -> Result<()> {
        let contents = self.contents()?;
        contents.arrays.check_invariants()?;
        if contents.number_of_reads == 0 && !contents.arrays.is_empty() {
            return Err(IndexError::inconsistent("index without reads holds sketch elements"));
        }
        Ok(())
    }
}

impl Drop for SketchIndex {
    fn drop(&mut self) {
        // Queued jobs may still be writing buffers this index will own.
        self.gate.drain();
    }
}
