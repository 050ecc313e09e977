//! Index builder orchestration
//!
//! Coordinates the pipeline that turns a read range into a ready index:
//! 1. Select reads covering at least one window and merge them (issuing thread)
//! 2. Generate raw sketch elements with the configured strategy
//! 3. Stable-sort by representation
//! 4. Split the packed remainder into read id, position and direction arrays
//! 5. Group equal representations
//! 6. Filter over-represented representations (unless the parameter is 1.0)
//!
//! Steps 2-6 run as a single job on the context's compute queue, inside
//! the context's rayon pool; `build` returns as soon as the job is queued.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use super::config::IndexConfiguration;
use super::filter::filter_out_most_common;
use super::grouping::find_first_occurrences;
use super::merge::{MergedReads, merge_reads};
use crate::arrays::SketchArrays;
use crate::descriptor::IndexDescriptor;
use crate::error::{IndexError, Result};
use crate::execution::ExecutionContext;
use crate::index::{IndexContents, IndexMetadata, SketchIndex};
use crate::memory::MemoryPool;
use crate::readiness::ReadinessGate;
use crate::sequence::SequenceSource;
use crate::sketch::{GenerationRequest, SketchGenerator, WindowMinimizers};

/// Builder for sketch indices, generic over the generation strategy
pub struct IndexBuilder<G: SketchGenerator + 'static = WindowMinimizers> {
    config: IndexConfiguration,
    generator: Arc<G>,
}

impl IndexBuilder<WindowMinimizers> {
    /// Builder using windowed minimizers seeded from the configuration
    pub fn new(config: IndexConfiguration) -> Result<Self> {
        let generator = WindowMinimizers::new(config.seed);
        Self::with_generator(config, generator)
    }
}

impl<G: SketchGenerator + 'static> IndexBuilder<G> {
    /// Builder using a custom generation strategy
    pub fn with_generator(config: IndexConfiguration, generator: G) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, generator: Arc::new(generator) })
    }

    /// Configuration in use
    pub fn config(&self) -> &IndexConfiguration {
        &self.config
    }

    /// Start building the index of `descriptor`'s reads
    ///
    /// Read selection and merging happen on the calling thread, so a bad
    /// descriptor or an allocation failure for the merged reads is reported
    /// here. Everything after that runs on `ctx`'s compute queue and its
    /// failures surface from [`SketchIndex::wait_until_ready`].
    pub fn build(
        &self,
        source: &dyn SequenceSource,
        descriptor: &IndexDescriptor,
        ctx: &ExecutionContext,
    ) -> Result<SketchIndex> {
        let metadata = IndexMetadata {
            kmer_size: self.config.kmer_size,
            window_size: self.config.window_size,
            hash_representations: self.config.hash_representations,
            filtering_parameter: self.config.filtering_parameter,
            first_read_id: descriptor.first_read_id,
        };
        info!(
            "Building index for reads {}..{}",
            descriptor.first_read_id,
            descriptor.past_the_last_read_id()
        );

        let allocator = ctx.allocator();
        let merged = merge_reads(
            source,
            descriptor,
            self.config.kmer_size,
            self.config.window_size,
            allocator,
        )?;

        let Some(merged) = merged else {
            info!("  No read in range covers a window, index is empty");
            let contents = IndexContents {
                arrays: SketchArrays::empty(allocator)?,
                number_of_reads: 0,
                longest_read: 0,
                filter_statistics: None,
            };
            return Ok(SketchIndex::from_parts(metadata, ReadinessGate::ready(contents)));
        };

        let job = BuildJob {
            config: self.config.clone(),
            generator: Arc::clone(&self.generator),
            allocator: Arc::clone(allocator),
            first_read_id: descriptor.first_read_id,
            number_of_reads: descriptor.number_of_reads,
            merged,
        };
        let pool = Arc::clone(ctx.thread_pool());
        let work = ctx.compute_queue().submit(move || pool.install(|| job.run()));

        Ok(SketchIndex::from_parts(metadata, ReadinessGate::new(work)))
    }
}

/// Everything the asynchronous part of construction owns
struct BuildJob<G> {
    config: IndexConfiguration,
    generator: Arc<G>,
    allocator: Arc<MemoryPool>,
    first_read_id: u32,
    number_of_reads: u32,
    merged: MergedReads,
}

impl<G: SketchGenerator> BuildJob<G> {
    fn run(self) -> Result<IndexContents> {
        let start = Instant::now();
        let BuildJob { config, generator, allocator, first_read_id, number_of_reads, merged } = self;

        // Step 2: generate
        let request = GenerationRequest {
            number_of_reads: merged.number_of_reads(),
            kmer_size: config.kmer_size,
            window_size: config.window_size,
            first_read_id,
            merged_basepairs: &merged.basepairs,
            read_sections: &merged.sections,
            hash_representations: config.hash_representations,
        };
        let raw = generator.generate(&request)?;
        if raw.representations.len() != raw.packed_rest.len() {
            return Err(IndexError::Generation(format!(
                "strategy returned {} representations but {} packed elements",
                raw.representations.len(),
                raw.packed_rest.len()
            )));
        }
        let longest_read = merged.longest_read;
        // The basepairs are not needed past generation.
        drop(merged);
        info!("  Generated {} sketch elements", raw.len());

        // Step 3: stable sort, so equal representations stay in read/position order
        let mut pairs = allocator.adopt(
            raw.representations
                .into_iter()
                .zip(raw.packed_rest)
                .collect::<Vec<_>>(),
        )?;
        pairs.as_mut_slice().par_sort_by_key(|&(representation, _)| representation);
        debug!("  Sorted sketch elements ({:.2?})", start.elapsed());

        // Step 4: split into parallel arrays
        let representations: Vec<u64> = pairs.par_iter().map(|&(r, _)| r).collect();
        let read_ids: Vec<u32> = pairs.par_iter().map(|&(_, rest)| rest.read_id()).collect();
        let positions_in_reads: Vec<u32> =
            pairs.par_iter().map(|&(_, rest)| rest.position_in_read()).collect();
        let directions: Vec<_> = pairs.par_iter().map(|&(_, rest)| rest.direction()).collect();
        drop(pairs);

        // Step 5: group
        let groups = find_first_occurrences(&representations);
        info!("  Found {} unique representations", groups.len());

        let mut arrays = SketchArrays {
            representations: allocator.adopt(representations)?,
            read_ids: allocator.adopt(read_ids)?,
            positions_in_reads: allocator.adopt(positions_in_reads)?,
            directions: allocator.adopt(directions)?,
            unique_representations: allocator.adopt(groups.unique_representations)?,
            first_occurrence: allocator.adopt(groups.first_occurrence)?,
        };

        // Step 6: filter
        let mut filter_statistics = None;
        if config.filtering_enabled() {
            let (filtered, stats) = filter_out_most_common(arrays, config.filtering_parameter, &allocator)?;
            arrays = filtered;
            filter_statistics = Some(stats);
        }

        info!(
            "  Index for reads {}..{} ready to publish: {} elements, {} unique ({:.2?})",
            first_read_id,
            u64::from(first_read_id) + u64::from(number_of_reads),
            arrays.len(),
            arrays.unique_representations.len(),
            start.elapsed()
        );
        Ok(IndexContents { arrays, number_of_reads, longest_read, filter_statistics })
    }
}
