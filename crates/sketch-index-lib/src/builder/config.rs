//! Configuration for sketch index construction
//!
//! Groups the sketching parameters (k-mer and window size, hashing) and the
//! frequency filter setting in one validated struct. Threads and working
//! memory belong to the [`ExecutionContext`] an index is built on.
//!
//! [`ExecutionContext`]: crate::execution::ExecutionContext

use crate::constants::{DEFAULT_SEED, MAX_KMER_SIZE, NO_FILTERING, is_valid_kmer_size};
use crate::error::{IndexError, Result};

/// Configuration parameters for building a sketch index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfiguration {
    /// K-mer length (1 to 32)
    pub kmer_size: usize,

    /// Number of consecutive k-mers per window (at least 1)
    pub window_size: usize,

    /// Order k-mers by a seeded hash of their encoding instead of the encoding itself
    pub hash_representations: bool,

    /// Fraction of all sketch elements at or above which a representation
    /// is dropped as repetitive. `1.0` disables filtering.
    pub filtering_parameter: f64,

    /// Seed for the representation hasher
    pub seed: u64,
}

impl Default for IndexConfiguration {
    fn default() -> Self {
        Self {
            kmer_size: 15,
            window_size: 10,
            hash_representations: true,
            filtering_parameter: NO_FILTERING,
            seed: DEFAULT_SEED,
        }
    }
}

impl IndexConfiguration {
    /// Create a configuration with the given k-mer and window sizes
    pub fn new(kmer_size: usize, window_size: usize) -> Result<Self> {
        let config = Self { kmer_size, window_size, ..Self::default() };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style setter for the filtering parameter
    pub fn with_filtering_parameter(mut self, filtering_parameter: f64) -> Result<Self> {
        self.filtering_parameter = filtering_parameter;
        self.validate()?;
        Ok(self)
    }

    /// Builder-style setter for representation hashing
    pub fn with_hash_representations(mut self, hash_representations: bool) -> Self {
        self.hash_representations = hash_representations;
        self
    }

    /// Whether the frequency filter runs at all
    pub fn filtering_enabled(&self) -> bool {
        self.filtering_parameter < NO_FILTERING
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !is_valid_kmer_size(self.kmer_size) {
            return Err(IndexError::config(format!(
                "kmer_size must be in range [1, {}], got {}",
                MAX_KMER_SIZE, self.kmer_size
            )));
        }
        if self.window_size == 0 {
            return Err(IndexError::config("window_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.filtering_parameter) {
            return Err(IndexError::config(format!(
                "filtering_parameter must be in range [0.0, 1.0], got {}",
                self.filtering_parameter
            )));
        }
        Ok(())
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Index Configuration:");
        tracing::info!("  kmer_size = {}", self.kmer_size);
        tracing::info!("  window_size = {}", self.window_size);
        tracing::info!("  hash_representations = {}", self.hash_representations);
        if self.filtering_enabled() {
            tracing::info!("  filtering_parameter = {}", self.filtering_parameter);
        } else {
            tracing::info!("  filtering_parameter = {} (disabled)", self.filtering_parameter);
        }
        tracing::debug!("  seed = {}", self.seed);
    }
}
