//! Builder module for constructing sketch indices
//!
//! This module implements the construction pipeline:
//! 1. Select and merge the reads of a descriptor
//! 2. Generate raw sketch elements
//! 3. Stable-sort them by representation
//! 4. Group equal representations (first occurrences)
//! 5. Filter over-represented representations
//!
//! The parallel kernels (scans, grouping, filtering) live in their own
//! modules and run in whatever rayon pool is current.

pub mod config;
pub mod filter;
pub mod grouping;
pub mod index_builder;
pub mod merge;
pub mod scan;

pub use config::IndexConfiguration;
pub use filter::FilterStatistics;
pub use grouping::UniqueRepresentations;
pub use index_builder::IndexBuilder;
