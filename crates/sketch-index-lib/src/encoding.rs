//! DNA nucleotide encoding for k-mer representations
//!
//! Bases are packed 2 bits each, most significant base first, so that the
//! numeric order of an encoded k-mer equals its lexicographic order:
//! - A -> 00
//! - C -> 01
//! - G -> 10
//! - T -> 11
//!
//! With this layout the complement of a base is `3 - b`, i.e. `b ^ 0b11`.

/// Encode a single DNA nucleotide to 2 bits, `None` for anything but A/C/G/T
#[inline]
pub const fn encode_base(base: u8) -> Option<u64> {
    match base {
        b'A' | b'a' => Some(0b00),
        b'C' | b'c' => Some(0b01),
        b'G' | b'g' => Some(0b10),
        b'T' | b't' => Some(0b11),
        _ => None,
    }
}

/// Complement of an encoded base
#[inline]
pub const fn complement_base(bits: u64) -> u64 {
    bits ^ 0b11
}

/// Mask selecting the low `2 * kmer_size` bits
#[inline]
pub const fn kmer_mask(kmer_size: usize) -> u64 {
    if kmer_size >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * kmer_size)) - 1
    }
}

/// Rolling encoder producing the forward and reverse-complement encodings
/// of consecutive k-mers of one read.
///
/// The forward k-mer shifts new bases in at the low end; the reverse
/// complement shifts complemented bases in at the high end.
#[derive(Debug, Clone)]
pub struct RollingKmer {
    kmer_size: usize,
    mask: u64,
    high_shift: u32,
    forward: u64,
    reverse: u64,
    filled: usize,
}

impl RollingKmer {
    /// Create an empty rolling encoder for k-mers of `kmer_size` bases
    pub fn new(kmer_size: usize) -> Self {
        Self {
            kmer_size,
            mask: kmer_mask(kmer_size),
            high_shift: (2 * (kmer_size - 1)) as u32,
            forward: 0,
            reverse: 0,
            filled: 0,
        }
    }

    /// Push one encoded base. Returns `(forward, reverse_complement)` once
    /// at least `kmer_size` bases have been pushed.
    #[inline]
    pub fn push(&mut self, bits: u64) -> Option<(u64, u64)> {
        self.forward = ((self.forward << 2) | bits) & self.mask;
        self.reverse = (self.reverse >> 2) | (complement_base(bits) << self.high_shift);
        self.filled += 1;
        (self.filled >= self.kmer_size).then_some((self.forward, self.reverse))
    }
}

/// Encode a whole k-mer given as bytes (forward strand)
pub fn encode_kmer(kmer: &[u8]) -> Option<u64> {
    kmer.iter()
        .try_fold(0u64, |acc, &b| encode_base(b).map(|bits| (acc << 2) | bits))
}

/// Reverse complement of an encoded k-mer
pub fn reverse_complement(value: u64, kmer_size: usize) -> u64 {
    let mut rc = 0u64;
    let mut v = value;
    for _ in 0..kmer_size {
        rc = (rc << 2) | complement_base(v & 0b11);
        v >>= 2;
    }
    rc
}
