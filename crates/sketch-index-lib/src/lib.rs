// Sketch index: in-memory indices of minimizer sketches over read sets
//
// Builds, filters and transfers the sorted sketch-element arrays that
// overlap detection between sequencing reads is driven from.

//! Asynchronously constructed sketch indices over read ranges.
//!
//! An index covers a contiguous range of reads ([`IndexDescriptor`]). For
//! every window of `window_size` consecutive k-mers in every read it holds
//! one sketch element (representation, read id, position, direction). The
//! elements are stored as four parallel arrays sorted by representation,
//! plus a table of the distinct representations and where each run starts.
//!
//! Construction runs on the queues of an [`ExecutionContext`]:
//!
//! ```no_run
//! use sketch_index_lib::{ExecutionContext, IndexBuilder, IndexConfiguration, IndexDescriptor};
//! use sketch_index_lib::sequence::InMemorySequenceSource;
//!
//! # fn main() -> Result<(), sketch_index_lib::IndexError> {
//! let source = InMemorySequenceSource::from_reads(["ACGTTGCAAGGT", "GGATCCATTACA"]);
//! let config = IndexConfiguration::new(5, 3)?.with_filtering_parameter(0.9)?;
//! let ctx = ExecutionContext::new(0)?;
//!
//! let index = IndexBuilder::new(config)?.build(&source, &IndexDescriptor::whole_source(&source), &ctx)?;
//! index.wait_until_ready()?;
//! println!("{} sketch elements", index.representations()?.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod arrays;
pub mod builder;
pub mod constants;
pub mod descriptor;
pub mod encoding;
pub mod error;
pub mod execution;
pub mod hasher;
pub mod index;
pub mod memory;
pub mod readiness;
pub mod sequence;
pub mod sketch;
pub mod snapshot;
pub mod statistics;
pub mod types;

// Re-export common types at crate root
pub use arrays::SketchArrays;
pub use builder::{FilterStatistics, IndexBuilder, IndexConfiguration};
pub use descriptor::{IndexDescriptor, group_reads_into_descriptors};
pub use error::{IndexError, Result};
pub use execution::{Completion, ExecutionContext, ExecutionQueue};
pub use index::{IndexMetadata, SketchIndex};
pub use memory::{MemoryPool, WorkingBuffer};
pub use readiness::ReadinessState;
pub use sequence::{InMemorySequenceSource, ReadSequence, SequenceSource};
pub use sketch::{GenerationRequest, RawSketch, SketchGenerator, WindowMinimizers};
pub use snapshot::{HostIndexSnapshot, SnapshotArrays};
pub use statistics::IndexStatistics;
pub use types::Direction;

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}
