//! Constants shared by the construction pipeline
//!
//! Bit layouts for packed sketch elements, parameter limits and the
//! floating-point guard used by the frequency filter.

/// Default seed for the representation hasher
pub const DEFAULT_SEED: u64 = 1;

/// Largest supported k-mer size (2 bits per base in a `u64`)
pub const MAX_KMER_SIZE: usize = 32;

/// Smallest supported k-mer size
pub const MIN_KMER_SIZE: usize = 1;

/// Number of bits reserved for the read id inside a packed element
pub const READ_ID_BITS: u32 = 32;

/// Number of bits reserved for the position inside a packed element
pub const POSITION_BITS: u32 = 31;

/// Largest position in a read that still fits the packed layout
pub const MAX_POSITION: u64 = (1u64 << POSITION_BITS) - 1;

/// Guard added to `total * filtering_parameter` before flooring, so that
/// products like `90 * 0.7 = 62.99999999999999` land on the intended integer.
pub const FILTERING_EPSILON: f64 = 0.001;

/// Filtering parameter that disables the frequency filter entirely
pub const NO_FILTERING: f64 = 1.0;

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Check if a k-mer size fits a `u64` representation
#[inline]
pub const fn is_valid_kmer_size(kmer_size: usize) -> bool {
    kmer_size >= MIN_KMER_SIZE && kmer_size <= MAX_KMER_SIZE
}

/// Number of basepairs one window covers
#[inline]
pub const fn window_span(kmer_size: usize, window_size: usize) -> usize {
    window_size + kmer_size - 1
}
