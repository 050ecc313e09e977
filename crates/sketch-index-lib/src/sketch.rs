//! Sketch generation: reads -> unsorted sketch elements
//!
//! The builder is generic over a [`SketchGenerator`]. The contract is small:
//! emit exactly one element per (read, window) pair, in read order and then
//! window order, with read id, position and direction packed into a
//! [`PackedRest`] so a single-key sort keeps them together.
//!
//! [`WindowMinimizers`] is the shipped strategy: for every window of
//! `window_size` consecutive k-mers it emits the k-mer with the smallest
//! canonical representation (the smaller of the forward and
//! reverse-complement encodings, optionally hashed).
//!
//! ## Parallelism
//!
//! Reads are independent, so extraction runs per read in the current rayon
//! pool and the per-read results are concatenated in read order.

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::constants::MAX_POSITION;
use crate::encoding::{RollingKmer, encode_base};
use crate::error::{IndexError, Result};
use crate::hasher::RepresentationHasher;
use crate::types::{Direction, PackedRest, ReadId, ReadSection, Representation};

/// Everything a strategy gets to see about the reads of one index
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Number of reads in the merged buffer
    pub number_of_reads: usize,
    /// K-mer length
    pub kmer_size: usize,
    /// K-mers per window
    pub window_size: usize,
    /// Id of the first read of the index
    pub first_read_id: ReadId,
    /// All reads back to back
    pub merged_basepairs: &'a [u8],
    /// Where each read lives in `merged_basepairs`
    pub read_sections: &'a [ReadSection],
    /// Order by hashed encodings
    pub hash_representations: bool,
}

/// Unsorted output of a strategy: two parallel arrays
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSketch {
    /// Sort key per element
    pub representations: Vec<Representation>,
    /// Read id, position and direction per element
    pub packed_rest: Vec<PackedRest>,
}

impl RawSketch {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.representations.len()
    }

    /// Whether no element was produced
    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }
}

/// A minimizer-selection algorithm
pub trait SketchGenerator: Send + Sync {
    /// Turn the reads of one index into unsorted sketch elements
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<RawSketch>;
}

/// Windowed canonical minimizers
#[derive(Debug, Clone)]
pub struct WindowMinimizers {
    hasher: RepresentationHasher,
}

impl WindowMinimizers {
    /// Create the strategy; `seed` only matters when hashing is requested
    pub fn new(seed: u64) -> Self {
        Self { hasher: RepresentationHasher::new(seed) }
    }

    /// Canonical representation of every k-mer in one read
    fn kmer_representations(
        &self,
        read: &[u8],
        read_id: ReadId,
        kmer_size: usize,
        hash_representations: bool,
    ) -> Result<Vec<(Representation, Direction)>> {
        let mut rolling = RollingKmer::new(kmer_size);
        let mut kmers = Vec::with_capacity(read.len().saturating_sub(kmer_size) + 1);
        for (position, &base) in read.iter().enumerate() {
            let bits = encode_base(base).ok_or(IndexError::InvalidBase {
                read_id,
                position,
                base: base as char,
            })?;
            if let Some((forward, reverse)) = rolling.push(bits) {
                let (forward, reverse) = if hash_representations {
                    (self.hasher.key_of(forward), self.hasher.key_of(reverse))
                } else {
                    (forward, reverse)
                };
                // Palindromes count as forward.
                kmers.push(if reverse < forward {
                    (reverse, Direction::ReverseComplement)
                } else {
                    (forward, Direction::Forward)
                });
            }
        }
        Ok(kmers)
    }

    /// One minimizer per window of one read, leftmost on ties
    fn read_minimizers(
        &self,
        read: &[u8],
        read_id: ReadId,
        request: &GenerationRequest<'_>,
    ) -> Result<Vec<(Representation, PackedRest)>> {
        let kmers = self.kmer_representations(read, read_id, request.kmer_size, request.hash_representations)?;
        let window_size = request.window_size;
        if kmers.len() < window_size {
            return Ok(Vec::new());
        }
        if kmers.len() as u64 > MAX_POSITION {
            return Err(IndexError::Generation(format!(
                "read {} has {} basepairs, positions are limited to {}",
                read_id,
                read.len(),
                MAX_POSITION
            )));
        }

        let number_of_windows = kmers.len() - window_size + 1;
        let mut minimizers = Vec::with_capacity(number_of_windows);
        // Indices of candidate k-mers, keys ascending front to back
        let mut candidates: VecDeque<usize> = VecDeque::with_capacity(window_size);
        for (i, &(key, _)) in kmers.iter().enumerate() {
            while candidates.back().is_some_and(|&b| kmers[b].0 > key) {
                candidates.pop_back();
            }
            candidates.push_back(i);

            if i + 1 < window_size {
                continue;
            }
            let window_start = i + 1 - window_size;
            while candidates.front().is_some_and(|&f| f < window_start) {
                candidates.pop_front();
            }
            if let Some(&best) = candidates.front() {
                let (representation, direction) = kmers[best];
                minimizers.push((representation, PackedRest::pack(read_id, best as u32, direction)));
            }
        }
        debug_assert_eq!(minimizers.len(), number_of_windows);
        Ok(minimizers)
    }
}

impl Default for WindowMinimizers {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_SEED)
    }
}

impl SketchGenerator for WindowMinimizers {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<RawSketch> {
        debug_assert_eq!(request.number_of_reads, request.read_sections.len());
        let per_read: Vec<Vec<(Representation, PackedRest)>> = request
            .read_sections
            .par_iter()
            .map(|section| {
                let read = &request.merged_basepairs[section.range()];
                self.read_minimizers(read, section.read_id, request)
            })
            .collect::<Result<_>>()?;

        let total: usize = per_read.iter().map(Vec::len).sum();
        let mut sketch = RawSketch {
            representations: Vec::with_capacity(total),
            packed_rest: Vec::with_capacity(total),
        };
        for (representation, rest) in per_read.into_iter().flatten() {
            sketch.representations.push(representation);
            sketch.packed_rest.push(rest);
        }
        Ok(sketch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{encode_kmer, reverse_complement};

    fn request<'a>(
        basepairs: &'a [u8],
        sections: &'a [ReadSection],
        kmer_size: usize,
        window_size: usize,
        hash_representations: bool,
    ) -> GenerationRequest<'a> {
        GenerationRequest {
            number_of_reads: sections.len(),
            kmer_size,
            window_size,
            first_read_id: sections.first().map_or(0, |s| s.read_id),
            merged_basepairs: basepairs,
            read_sections: sections,
            hash_representations,
        }
    }

    #[test]
    fn test_window_of_one_keeps_every_kmer() {
        let read = b"AACGTTGA";
        let sections = [ReadSection { read_id: 0, offset: 0, length: read.len() }];
        let sketch = WindowMinimizers::default()
            .generate(&request(read, &sections, 4, 1, false))
            .unwrap();

        assert_eq!(sketch.len(), read.len() - 4 + 1);
        for (i, (&repr, rest)) in sketch.representations.iter().zip(&sketch.packed_rest).enumerate() {
            let forward = encode_kmer(&read[i..i + 4]).unwrap();
            let reverse = reverse_complement(forward, 4);
            assert_eq!(repr, forward.min(reverse));
            assert_eq!(rest.read_id(), 0);
            assert_eq!(rest.position_in_read(), i as u32);
            let expected = if reverse < forward { Direction::ReverseComplement } else { Direction::Forward };
            assert_eq!(rest.direction(), expected);
        }
    }

    #[test]
    fn test_one_element_per_window() {
        let read = b"GATTACAGATTACACCGT";
        let sections = [ReadSection { read_id: 3, offset: 0, length: read.len() }];
        let (k, w) = (5, 4);
        let sketch = WindowMinimizers::default()
            .generate(&request(read, &sections, k, w, false))
            .unwrap();

        let number_of_kmers = read.len() - k + 1;
        assert_eq!(sketch.len(), number_of_kmers - w + 1);

        // Brute force: leftmost minimum of each window
        for (j, (&repr, rest)) in sketch.representations.iter().zip(&sketch.packed_rest).enumerate() {
            let best = (j..j + w)
                .map(|i| {
                    let f = encode_kmer(&read[i..i + k]).unwrap();
                    (f.min(reverse_complement(f, k)), i)
                })
                .min()
                .unwrap();
            assert_eq!(repr, best.0);
            assert_eq!(rest.position_in_read(), best.1 as u32);
            assert_eq!(rest.read_id(), 3);
        }
    }

    #[test]
    fn test_reads_are_emitted_in_order() {
        let merged = b"ACGTACGTTTTTGGGGCC";
        let sections = [
            ReadSection { read_id: 10, offset: 0, length: 8 },
            ReadSection { read_id: 12, offset: 8, length: 10 },
        ];
        let sketch = WindowMinimizers::default()
            .generate(&request(merged, &sections, 3, 2, true))
            .unwrap();

        assert_eq!(sketch.len(), (8 - 3 + 1 - 1) + (10 - 3 + 1 - 1));
        let reads: Vec<u32> = sketch.packed_rest.iter().map(|r| r.read_id()).collect();
        assert!(reads.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reads.first(), Some(&10));
        assert_eq!(reads.last(), Some(&12));
    }

    #[test]
    fn test_hashing_changes_representations() {
        let read = b"ACGTTGCAAGGT";
        let sections = [ReadSection { read_id: 0, offset: 0, length: read.len() }];
        let generator = WindowMinimizers::new(7);
        let plain = generator.generate(&request(read, &sections, 4, 1, false)).unwrap();
        let hashed = generator.generate(&request(read, &sections, 4, 1, true)).unwrap();
        assert_eq!(plain.len(), hashed.len());
        assert_ne!(plain.representations, hashed.representations);
    }

    #[test]
    fn test_invalid_base_is_reported() {
        let read = b"ACGNACGT";
        let sections = [ReadSection { read_id: 4, offset: 0, length: read.len() }];
        let err = WindowMinimizers::default()
            .generate(&request(read, &sections, 3, 1, false))
            .unwrap_err();
        assert_eq!(err, IndexError::InvalidBase { read_id: 4, position: 3, base: 'N' });
    }
}
