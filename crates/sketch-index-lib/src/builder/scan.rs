//! Parallel prefix sums
//!
//! Two-pass chunked scan: every chunk is summed in parallel, the chunk
//! totals are scanned sequentially, then every chunk is scanned in parallel
//! starting from its carried-in offset. Small inputs take the sequential path.

use rayon::prelude::*;

/// Inputs shorter than this are scanned sequentially
const PARALLEL_SCAN_MIN_LEN: usize = 1 << 14;

fn chunk_len(len: usize) -> usize {
    let chunks = rayon::current_num_threads().max(1) * 4;
    len.div_ceil(chunks).max(PARALLEL_SCAN_MIN_LEN / 4)
}

/// In-place inclusive scan: `values[i] = values[0] + ... + values[i]`
pub fn inclusive_scan_in_place(values: &mut [u64]) {
    if values.len() < PARALLEL_SCAN_MIN_LEN {
        let mut acc = 0u64;
        for v in values.iter_mut() {
            acc += *v;
            *v = acc;
        }
        return;
    }

    let chunk = chunk_len(values.len());
    let totals: Vec<u64> = values.par_chunks(chunk).map(|c| c.iter().sum()).collect();
    let carries = exclusive_scan(&totals).0;

    values
        .par_chunks_mut(chunk)
        .zip(carries.par_iter())
        .for_each(|(c, &carry)| {
            let mut acc = carry;
            for v in c.iter_mut() {
                acc += *v;
                *v = acc;
            }
        });
}

/// Exclusive scan into a new vector: `out[i] = values[0] + ... + values[i - 1]`
///
/// Returns the scanned vector and the grand total.
pub fn exclusive_scan(values: &[u64]) -> (Vec<u64>, u64) {
    let mut out = values.to_vec();
    let total = exclusive_scan_in_place(&mut out);
    (out, total)
}

/// In-place exclusive scan, returning the grand total
pub fn exclusive_scan_in_place(values: &mut [u64]) -> u64 {
    if values.len() < PARALLEL_SCAN_MIN_LEN {
        let mut acc = 0u64;
        for v in values.iter_mut() {
            let x = *v;
            *v = acc;
            acc += x;
        }
        return acc;
    }

    let chunk = chunk_len(values.len());
    let totals: Vec<u64> = values.par_chunks(chunk).map(|c| c.iter().sum()).collect();
    let (carries, grand_total) = exclusive_scan(&totals);

    values
        .par_chunks_mut(chunk)
        .zip(carries.par_iter())
        .for_each(|(c, &carry)| {
            let mut acc = carry;
            for v in c.iter_mut() {
                let x = *v;
                *v = acc;
                acc += x;
            }
        });
    grand_total
}
