//! Group-size statistics of a ready index
//!
//! Groups (runs of equal representation) are classified by size into
//! singleton, small and large, the way repetitive content shows up in the
//! distribution.

use tracing::info;

use crate::error::Result;
use crate::index::SketchIndex;

/// Group size above which a group counts as large
pub const LARGE_GROUP_SIZE: u64 = 64;

/// Statistics about group sizes and their distribution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStatistics {
    /// Reads covered
    pub num_reads: u32,

    /// Total sketch elements
    pub num_elements: u64,

    /// Distinct representations
    pub num_groups: u64,

    /// Groups with exactly one element
    pub num_singleton_groups: u64,

    /// Groups with 2..=LARGE_GROUP_SIZE elements
    pub num_small_groups: u64,

    /// Groups with more than LARGE_GROUP_SIZE elements
    pub num_large_groups: u64,

    /// Elements in large groups
    pub num_elements_in_large: u64,

    /// Largest group
    pub max_group_size: u64,
}

impl IndexStatistics {
    /// Collect statistics from a ready index
    pub fn from_index(index: &SketchIndex) -> Result<Self> {
        let mut stats = Self { num_reads: index.number_of_reads()?, ..Self::default() };
        for bounds in index.first_occurrence_of_representations()?.windows(2) {
            stats.add_group(bounds[1] - bounds[0]);
        }
        Ok(stats)
    }

    /// Record one group of `size` elements
    pub fn add_group(&mut self, size: u64) {
        self.num_groups += 1;
        self.num_elements += size;
        self.max_group_size = self.max_group_size.max(size);
        match size {
            0 => {}
            1 => self.num_singleton_groups += 1,
            2..=LARGE_GROUP_SIZE => self.num_small_groups += 1,
            _ => {
                self.num_large_groups += 1;
                self.num_elements_in_large += size;
            }
        }
    }

    /// Mean elements per group, 0 for an empty index
    pub fn mean_group_size(&self) -> f64 {
        if self.num_groups == 0 {
            0.0
        } else {
            self.num_elements as f64 / self.num_groups as f64
        }
    }

    /// Log statistics summary via tracing
    pub fn print_summary(&self) {
        let percent = |part: u64, whole: u64| {
            if whole == 0 { 0.0 } else { part as f64 * 100.0 / whole as f64 }
        };
        info!("Index Statistics:");
        info!("  Reads: {}", self.num_reads);
        info!("  Sketch elements: {}", self.num_elements);
        info!("  Distinct representations: {}", self.num_groups);
        info!(
            "  Singleton groups: {} ({:.2}%)",
            self.num_singleton_groups,
            percent(self.num_singleton_groups, self.num_groups)
        );
        info!(
            "  Small groups (2-{}): {} ({:.2}%)",
            LARGE_GROUP_SIZE,
            self.num_small_groups,
            percent(self.num_small_groups, self.num_groups)
        );
        info!(
            "  Large groups (>{}): {} ({:.2}%)",
            LARGE_GROUP_SIZE,
            self.num_large_groups,
            percent(self.num_large_groups, self.num_groups)
        );
        info!("  Max group size: {}", self.max_group_size);
        info!("  Mean group size: {:.2}", self.mean_group_size());
        info!(
            "  Elements in large groups: {} ({:.2}%)",
            self.num_elements_in_large,
            percent(self.num_elements_in_large, self.num_elements)
        );
    }
}
