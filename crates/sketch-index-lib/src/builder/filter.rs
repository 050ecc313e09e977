//! Frequency filter: drop over-represented representations
//!
//! Repetitive regions produce representations that occur far more often
//! than anything informative for overlap detection. A representation is
//! removed iff its occurrence count is at least
//!
//! ```text
//! threshold = floor(total_elements * filtering_parameter + 0.001)
//! ```
//!
//! and all six arrays are compacted consistently:
//! 1. per-group counts from `first_occurrence` differences (plus a 0 sentinel)
//! 2. counts of removed groups are zeroed
//! 3. exclusive scan of the counts gives every survivor its new element offset
//! 4. exclusive scan of `count > 0` maps old group index to new group index
//! 5. survivors move to their mapped slot in the unique-representation table
//! 6. each survivor's contiguous run of elements is copied to its new offset
//!
//! Each step runs in the current rayon pool. The result is a brand-new
//! array set; the input set is consumed and released.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use super::scan::exclusive_scan;
use crate::arrays::SketchArrays;
use crate::constants::FILTERING_EPSILON;
use crate::error::Result;
use crate::memory::MemoryPool;

/// Outcome of one filtering pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterStatistics {
    /// Count at or above which a representation was removed
    pub threshold: u64,
    /// Sketch elements before filtering
    pub elements_before: u64,
    /// Sketch elements kept
    pub elements_after: u64,
    /// Distinct representations before filtering
    pub representations_before: u64,
    /// Distinct representations kept
    pub representations_after: u64,
}

impl FilterStatistics {
    /// Number of distinct representations removed
    pub fn representations_removed(&self) -> u64 {
        self.representations_before - self.representations_after
    }

    /// Number of sketch elements removed
    pub fn elements_removed(&self) -> u64 {
        self.elements_before - self.elements_after
    }
}

/// `floor(total * filtering_parameter + 0.001)`
pub fn filtering_threshold(total_elements: u64, filtering_parameter: f64) -> u64 {
    (total_elements as f64 * filtering_parameter + FILTERING_EPSILON).floor() as u64
}

/// Per-group counts with removed groups zeroed, plus the trailing 0 sentinel
pub fn surviving_counts(first_occurrence: &[u64], threshold: u64) -> Vec<u64> {
    let number_of_unique = first_occurrence.len().saturating_sub(1);
    let mut counts: Vec<u64> = (0..number_of_unique)
        .into_par_iter()
        .map(|i| first_occurrence[i + 1] - first_occurrence[i])
        .collect();
    counts.push(0);
    counts[..number_of_unique].par_iter_mut().for_each(|count| {
        if *count >= threshold {
            *count = 0;
        }
    });
    counts
}

/// Old-group-index to new-group-index map of length `unique + 1`
///
/// Entry `i` is the number of surviving groups before `i`; the last entry
/// is the new number of groups. Removed groups collapse onto the slot of
/// the next survivor, which is harmless as they contribute no elements.
pub fn new_group_indices(counts: &[u64]) -> Vec<u64> {
    let keep: Vec<u64> = counts.par_iter().map(|&c| u64::from(c > 0)).collect();
    // The sentinel's flag is 0, so its scanned value is the survivor total.
    exclusive_scan(&keep).0
}

/// Remove every representation occurring at least `threshold` times
///
/// `filtering_parameter` must be below 1.0; callers skip this function
/// entirely to disable filtering.
pub fn filter_out_most_common(
    arrays: SketchArrays,
    filtering_parameter: f64,
    allocator: &Arc<MemoryPool>,
) -> Result<(SketchArrays, FilterStatistics)> {
    let total_elements = arrays.representations.len() as u64;
    let threshold = filtering_threshold(total_elements, filtering_parameter);
    let number_of_unique = arrays.unique_representations.len();
    debug!(
        "filtering {} elements in {} groups, threshold {}",
        total_elements, number_of_unique, threshold
    );

    let counts = surviving_counts(&arrays.first_occurrence, threshold);
    let (new_offsets, new_total) = exclusive_scan(&counts);
    let group_map = new_group_indices(&counts);
    let new_unique_count = group_map[number_of_unique] as usize;

    let survivors: Vec<usize> = (0..number_of_unique)
        .into_par_iter()
        .filter(|&g| counts[g] > 0)
        .collect();
    debug_assert_eq!(survivors.len(), new_unique_count);
    debug_assert!(survivors.iter().enumerate().all(|(slot, &g)| group_map[g] as usize == slot));

    // Survivors are in ascending order, so collecting them in order places
    // group g at slot group_map[g].
    let unique_representations: Vec<u64> = survivors
        .par_iter()
        .map(|&g| arrays.unique_representations[g])
        .collect();
    let mut first_occurrence: Vec<u64> = Vec::with_capacity(new_unique_count + 1);
    first_occurrence.par_extend(survivors.par_iter().map(|&g| new_offsets[g]));
    first_occurrence.push(new_offsets[number_of_unique]);
    debug_assert_eq!(new_offsets[number_of_unique], new_total);

    // One task per surviving group copies its run from the old offset; the
    // ordered gather lands it exactly at new_offsets[g].
    let old_first = &arrays.first_occurrence;
    let run = |g: usize| {
        let begin = old_first[g] as usize;
        begin..begin + counts[g] as usize
    };
    let representations = gather_runs(&arrays.representations, &survivors, &run);
    let read_ids = gather_runs(&arrays.read_ids, &survivors, &run);
    let positions_in_reads = gather_runs(&arrays.positions_in_reads, &survivors, &run);
    let directions = gather_runs(&arrays.directions, &survivors, &run);

    let filtered = SketchArrays {
        representations: allocator.adopt(representations)?,
        read_ids: allocator.adopt(read_ids)?,
        positions_in_reads: allocator.adopt(positions_in_reads)?,
        directions: allocator.adopt(directions)?,
        unique_representations: allocator.adopt(unique_representations)?,
        first_occurrence: allocator.adopt(first_occurrence)?,
    };
    // The old set is released here, after the new one is fully built.
    drop(arrays);

    let stats = FilterStatistics {
        threshold,
        elements_before: total_elements,
        elements_after: new_total,
        representations_before: number_of_unique as u64,
        representations_after: new_unique_count as u64,
    };
    info!(
        "  Filtered out {} of {} representations ({} of {} sketch elements)",
        stats.representations_removed(),
        stats.representations_before,
        stats.elements_removed(),
        stats.elements_before
    );
    Ok((filtered, stats))
}

fn gather_runs<T, F>(source: &[T], survivors: &[usize], run: &F) -> Vec<T>
where
    T: Copy + Send + Sync,
    F: Fn(usize) -> std::ops::Range<usize> + Sync,
{
    survivors
        .par_iter()
        .flat_map_iter(|&g| source[run(g)].iter().copied())
        .collect()
}
