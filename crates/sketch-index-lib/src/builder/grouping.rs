//! Run-length grouping of sorted representations
//!
//! Turns a sorted key array into the unique-representation table:
//! `unique_representations[i]` is the i-th distinct key and
//! `first_occurrence[i]` the index of its first element; a trailing
//! sentinel equal to the array length closes the last group, so group `i`
//! spans `first_occurrence[i]..first_occurrence[i + 1]`.

use rayon::prelude::*;

use super::scan::inclusive_scan_in_place;
use crate::types::Representation;

/// Distinct representations and where each one's run starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueRepresentations {
    /// Distinct keys, strictly ascending
    pub unique_representations: Vec<Representation>,
    /// Run starts plus a trailing sentinel (length `unique + 1`)
    pub first_occurrence: Vec<u64>,
}

impl UniqueRepresentations {
    /// Number of distinct representations
    pub fn len(&self) -> usize {
        self.unique_representations.len()
    }

    /// Whether there are no representations at all
    pub fn is_empty(&self) -> bool {
        self.unique_representations.is_empty()
    }
}

/// Group a sorted representation array
///
/// A position starts a group when it is the first element or differs from
/// its predecessor. An inclusive scan over those flags numbers the groups;
/// each group start then writes its key and index to slot `ordinal - 1`.
pub fn find_first_occurrences(representations: &[Representation]) -> UniqueRepresentations {
    let n = representations.len();
    if n == 0 {
        return UniqueRepresentations { unique_representations: Vec::new(), first_occurrence: vec![0] };
    }

    let mut ordinals: Vec<u64> = (0..n)
        .into_par_iter()
        .map(|i| u64::from(i == 0 || representations[i] != representations[i - 1]))
        .collect();
    inclusive_scan_in_place(&mut ordinals);
    let number_of_unique = ordinals[n - 1] as usize;

    // Group starts are visited in index order, so collecting them in order
    // is the scatter to slot `ordinal - 1`.
    let starts: Vec<usize> = (0..n)
        .into_par_iter()
        .filter(|&i| i == 0 || ordinals[i] != ordinals[i - 1])
        .collect();
    debug_assert_eq!(starts.len(), number_of_unique);

    let unique_representations: Vec<Representation> =
        starts.par_iter().map(|&i| representations[i]).collect();
    let mut first_occurrence: Vec<u64> = Vec::with_capacity(number_of_unique + 1);
    first_occurrence.par_extend(starts.par_iter().map(|&i| i as u64));
    first_occurrence.push(n as u64);

    UniqueRepresentations { unique_representations, first_occurrence }
}
