//! Integration tests for index construction
//!
//! These tests drive the public API end to end: sources, descriptors,
//! builder, readiness, filtering and host snapshots.

use std::io::Write;
use std::sync::Arc;

use sketch_index_lib::builder::filter::filtering_threshold;
use sketch_index_lib::encoding::{encode_kmer, reverse_complement};
use sketch_index_lib::{
    Completion, Direction, ExecutionContext, GenerationRequest, HostIndexSnapshot, IndexBuilder,
    IndexConfiguration, IndexDescriptor, IndexError, IndexStatistics, InMemorySequenceSource, MemoryPool,
    RawSketch, ReadinessState, SketchGenerator, SketchIndex, WindowMinimizers, group_reads_into_descriptors,
};
use tempfile::NamedTempFile;

/// Plain-encoding configuration with the given filtering parameter
fn plain_config(k: usize, w: usize, filtering_parameter: f64) -> IndexConfiguration {
    IndexConfiguration::new(k, w)
        .unwrap()
        .with_hash_representations(false)
        .with_filtering_parameter(filtering_parameter)
        .unwrap()
}

fn build_and_wait(
    source: &InMemorySequenceSource,
    descriptor: &IndexDescriptor,
    config: IndexConfiguration,
    ctx: &ExecutionContext,
) -> SketchIndex {
    let index = IndexBuilder::new(config).unwrap().build(source, descriptor, ctx).unwrap();
    index.wait_until_ready().unwrap();
    index
}

/// (representation, read id, position, direction) of every k-mer, window size 1
fn brute_force_kmers(reads: &[&str], k: usize) -> Vec<(u64, u32, u32, Direction)> {
    let mut elements = Vec::new();
    for (read_id, read) in reads.iter().enumerate() {
        let read = read.as_bytes();
        for position in 0..=read.len() - k {
            let forward = encode_kmer(&read[position..position + k]).unwrap();
            let reverse = reverse_complement(forward, k);
            let (representation, direction) = if reverse < forward {
                (reverse, Direction::ReverseComplement)
            } else {
                (forward, Direction::Forward)
            };
            elements.push((representation, read_id as u32, position as u32, direction));
        }
    }
    // Stable: equal representations keep read/position order.
    elements.sort_by_key(|e| e.0);
    elements
}

fn elements_of(index: &SketchIndex) -> Vec<(u64, u32, u32, Direction)> {
    let representations = index.representations().unwrap();
    let read_ids = index.read_ids().unwrap();
    let positions = index.positions_in_reads().unwrap();
    let directions = index.directions().unwrap();
    (0..representations.len())
        .map(|i| (representations[i], read_ids[i], positions[i], directions[i]))
        .collect()
}

#[test]
fn test_two_short_reads_every_kmer() {
    let reads = ["ACGTTGCA", "GGATCCAT"];
    let source = InMemorySequenceSource::from_reads(reads);
    let ctx = ExecutionContext::new(2).unwrap();
    let index = build_and_wait(&source, &IndexDescriptor::new(0, 2), plain_config(4, 1, 1.0), &ctx);

    // 8 - 4 + 1 = 5 windows per read
    assert_eq!(index.representations().unwrap().len(), 10);
    assert_eq!(elements_of(&index), brute_force_kmers(&reads, 4));

    // Unique table matches the run lengths
    let representations = index.representations().unwrap();
    let unique = index.unique_representations().unwrap();
    let first = index.first_occurrence_of_representations().unwrap();
    assert_eq!(first.len(), unique.len() + 1);
    assert_eq!(first[unique.len()], 10);
    for (g, &representation) in unique.iter().enumerate() {
        let run = &representations[first[g] as usize..first[g + 1] as usize];
        assert!(!run.is_empty());
        assert!(run.iter().all(|&r| r == representation));
    }

    assert_eq!(index.number_of_reads().unwrap(), 2);
    assert_eq!(index.smallest_read_id().unwrap(), 0);
    assert_eq!(index.largest_read_id().unwrap(), 1);
    assert_eq!(index.number_of_basepairs_in_longest_read().unwrap(), 8);
    assert_eq!(index.filter_statistics().unwrap(), None);
    assert!(index.check_invariants().is_ok());
}

#[test]
fn test_sorted_and_stable_with_windows() {
    let reads = ["GATTACAGATTACACCGTAGGCT", "TTTTGATTACAGGGCCCAAAT", "GATTACAGATTACA"];
    let source = InMemorySequenceSource::from_reads(reads);
    let ctx = ExecutionContext::new(3).unwrap();
    let config = IndexConfiguration::new(5, 4).unwrap();
    let index = build_and_wait(&source, &IndexDescriptor::new(0, 3), config, &ctx);

    let expected_windows: usize = reads.iter().map(|r| r.len() - 5 + 1 - 4 + 1).sum();
    let elements = elements_of(&index);
    assert_eq!(elements.len(), expected_windows);

    // Representations ascend; inside a run, (read, position) never descends.
    for pair in elements.windows(2) {
        assert!(pair[0].0 <= pair[1].0);
        if pair[0].0 == pair[1].0 {
            assert!((pair[0].1, pair[0].2) <= (pair[1].1, pair[1].2));
        }
    }
    assert!(index.check_invariants().is_ok());
}

#[test]
fn test_filter_removes_frequent_representations() {
    let reads = ["AAAAAAAAAAAAAAAA", "ACGTTGCAAGGTCCAT", "AAAAAAAACCGTAGCA", "TTTTTTTTGGATCCAT"];
    let source = InMemorySequenceSource::from_reads(reads);
    let descriptor = IndexDescriptor::new(0, 4);
    let ctx = ExecutionContext::new(2).unwrap();

    let unfiltered = build_and_wait(&source, &descriptor, plain_config(4, 1, 1.0), &ctx);
    let filtered = build_and_wait(&source, &descriptor, plain_config(4, 1, 0.2), &ctx);

    let all = elements_of(&unfiltered);
    let threshold = filtering_threshold(all.len() as u64, 0.2);
    assert_eq!(threshold, (all.len() as f64 * 0.2 + 0.001).floor() as u64);

    let count_of = |representation: u64| all.iter().filter(|e| e.0 == representation).count() as u64;
    let expected: Vec<_> = all.iter().copied().filter(|e| count_of(e.0) < threshold).collect();
    // AAAA (and its reverse complement TTTT) is far above the threshold.
    assert!(expected.len() < all.len());
    assert_eq!(elements_of(&filtered), expected);

    let statistics = filtered.filter_statistics().unwrap().unwrap();
    assert_eq!(statistics.threshold, threshold);
    assert_eq!(statistics.elements_before, all.len() as u64);
    assert_eq!(statistics.elements_after, expected.len() as u64);
    assert_eq!(statistics.representations_before, unfiltered.unique_representations().unwrap().len() as u64);
    assert_eq!(statistics.representations_after, filtered.unique_representations().unwrap().len() as u64);
    assert!(filtered.check_invariants().is_ok());
    // Reads still count even if all their elements were filtered
    assert_eq!(filtered.number_of_reads().unwrap(), 4);
}

#[test]
fn test_parameter_one_is_identical_to_unfiltered() {
    let reads = ["AAAAAAAAAAAA", "AAAAAAAAAAAA", "CCGTAGCAATTG"];
    let source = InMemorySequenceSource::from_reads(reads);
    let descriptor = IndexDescriptor::new(0, 3);
    let ctx = ExecutionContext::new(2).unwrap();

    let index = build_and_wait(&source, &descriptor, plain_config(4, 2, 1.0), &ctx);
    assert_eq!(index.filter_statistics().unwrap(), None);

    let generator = WindowMinimizers::default();
    let merged: Vec<u8> = reads.concat().into_bytes();
    let sections: Vec<_> = (0..3)
        .map(|i| sketch_index_lib::types::ReadSection { read_id: i, offset: 12 * i as usize, length: 12 })
        .collect();
    let raw = generator
        .generate(&GenerationRequest {
            number_of_reads: 3,
            kmer_size: 4,
            window_size: 2,
            first_read_id: 0,
            merged_basepairs: &merged,
            read_sections: &sections,
            hash_representations: false,
        })
        .unwrap();
    assert_eq!(index.representations().unwrap().len(), raw.len());
}

#[test]
fn test_parameter_one_keeps_a_group_holding_every_element() {
    let source = InMemorySequenceSource::from_reads(["AAAAAAAA"]);
    let descriptor = IndexDescriptor::new(0, 1);
    let ctx = ExecutionContext::new(1).unwrap();

    let index = build_and_wait(&source, &descriptor, plain_config(4, 1, 1.0), &ctx);
    assert_eq!(index.representations().unwrap(), &[0; 5]);
    assert_eq!(index.read_ids().unwrap(), &[0; 5]);
    assert_eq!(index.positions_in_reads().unwrap(), &[0, 1, 2, 3, 4]);
    assert!(index.directions().unwrap().iter().all(|&d| d == Direction::Forward));
    assert_eq!(index.unique_representations().unwrap(), &[0]);
    assert_eq!(index.first_occurrence_of_representations().unwrap(), &[0, 5]);
    assert_eq!(index.filter_statistics().unwrap(), None);

    // Just below 1.0 the filter runs: floor(5 * 0.999 + 0.001) = 4 <= 5.
    let filtered = build_and_wait(&source, &descriptor, plain_config(4, 1, 0.999), &ctx);
    assert!(filtered.representations().unwrap().is_empty());
    assert!(filtered.unique_representations().unwrap().is_empty());
    assert_eq!(filtered.first_occurrence_of_representations().unwrap(), &[0]);
    let statistics = filtered.filter_statistics().unwrap().unwrap();
    assert_eq!(statistics.threshold, 4);
    assert_eq!(statistics.elements_after, 0);
}

#[test]
fn test_snapshot_round_trip() {
    let reads = ["GATTACAGATTACACCGTAGGCT", "TTTTGATTACAGGGCCCAAAT", "AAAAAAAAAAAAAAAACCCC"];
    let source = InMemorySequenceSource::from_reads(reads);
    let ctx = ExecutionContext::new(2).unwrap();
    let config = IndexConfiguration::new(5, 3).unwrap().with_filtering_parameter(0.5).unwrap();
    let original = build_and_wait(&source, &IndexDescriptor::new(0, 3), config, &ctx);

    let snapshot = HostIndexSnapshot::from_index(&original, &ctx).unwrap();
    let restored = SketchIndex::from_host_snapshot(Arc::clone(&snapshot), &ctx).unwrap();
    restored.wait_until_ready().unwrap();

    assert_eq!(elements_of(&restored), elements_of(&original));
    assert_eq!(restored.unique_representations().unwrap(), original.unique_representations().unwrap());
    assert_eq!(
        restored.first_occurrence_of_representations().unwrap(),
        original.first_occurrence_of_representations().unwrap()
    );
    assert_eq!(restored.number_of_reads().unwrap(), 3);
    assert_eq!(restored.largest_read_id().unwrap(), 2);
    assert_eq!(
        restored.number_of_basepairs_in_longest_read().unwrap(),
        original.number_of_basepairs_in_longest_read().unwrap()
    );
    assert_eq!(restored.metadata(), original.metadata());
    assert!(restored.check_invariants().is_ok());

    // Into a second context with its own allocator
    let other = ExecutionContext::new(1).unwrap();
    let again = SketchIndex::from_host_snapshot(snapshot, &other).unwrap();
    again.wait_until_ready().unwrap();
    assert_eq!(elements_of(&again), elements_of(&original));
}

#[test]
fn test_empty_range_is_ready() {
    let source = InMemorySequenceSource::from_reads(["ACGTACGT", "ACGTACGT"]);
    let ctx = ExecutionContext::new(1).unwrap();
    let builder = IndexBuilder::new(plain_config(4, 1, 1.0)).unwrap();

    let index = builder.build(&source, &IndexDescriptor::new(1, 0), &ctx).unwrap();
    assert_eq!(index.state(), ReadinessState::Ready);
    assert_eq!(index.number_of_reads().unwrap(), 0);
    assert!(index.representations().unwrap().is_empty());
    assert!(index.read_ids().unwrap().is_empty());
    assert!(index.positions_in_reads().unwrap().is_empty());
    assert!(index.directions().unwrap().is_empty());
    assert!(index.unique_representations().unwrap().is_empty());
    assert!(index.first_occurrence_of_representations().unwrap().is_empty());
    assert_eq!(index.smallest_read_id().unwrap(), 0);
    assert_eq!(index.largest_read_id().unwrap(), 0);
    index.wait_until_ready().unwrap();
    assert!(index.check_invariants().is_ok());

    // An empty index survives a snapshot round trip
    let snapshot = HostIndexSnapshot::from_index(&index, &ctx).unwrap();
    let restored = SketchIndex::from_host_snapshot(snapshot, &ctx).unwrap();
    restored.wait_until_ready().unwrap();
    assert!(restored.first_occurrence_of_representations().unwrap().is_empty());
}

#[test]
fn test_all_reads_too_short() {
    let source = InMemorySequenceSource::from_reads(["ACG", "ACGTA", "TT"]);
    let ctx = ExecutionContext::new(1).unwrap();
    // A window of 3 four-mers covers 6 basepairs.
    let index = IndexBuilder::new(plain_config(4, 3, 1.0))
        .unwrap()
        .build(&source, &IndexDescriptor::new(0, 3), &ctx)
        .unwrap();
    assert!(index.is_ready());
    assert_eq!(index.number_of_reads().unwrap(), 0);
    assert!(index.representations().unwrap().is_empty());
}

#[test]
fn test_short_reads_are_skipped() {
    let reads = ["ACGTTGCA", "ACG", "GGATCCAT"];
    let source = InMemorySequenceSource::from_reads(reads);
    let ctx = ExecutionContext::new(2).unwrap();
    let index = build_and_wait(&source, &IndexDescriptor::new(0, 3), plain_config(4, 1, 1.0), &ctx);

    let read_ids = index.read_ids().unwrap();
    assert_eq!(read_ids.len(), 10);
    assert!(!read_ids.contains(&1));
    assert_eq!(read_ids.iter().filter(|&&r| r == 2).count(), 5);

    // The descriptor's count is reported, skipped reads included
    assert_eq!(index.number_of_reads().unwrap(), 3);
    assert_eq!(index.smallest_read_id().unwrap(), 0);
    assert_eq!(index.largest_read_id().unwrap(), 2);
}

/// Holds generation until released
struct GatedSketch {
    release: Completion<()>,
    inner: WindowMinimizers,
}

impl SketchGenerator for GatedSketch {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<RawSketch, IndexError> {
        if let Err(e) = self.release.wait() {
            return Err(e.clone());
        }
        self.inner.generate(request)
    }
}

#[test]
fn test_accessors_fail_while_building() {
    let source = InMemorySequenceSource::from_reads(["ACGTTGCAAGGT", "GGATCCATTACA"]);
    let ctx = ExecutionContext::new(2).unwrap();
    let release = Completion::pending();
    let builder = IndexBuilder::with_generator(
        plain_config(4, 2, 1.0),
        GatedSketch { release: release.clone(), inner: WindowMinimizers::default() },
    )
    .unwrap();

    let index = builder.build(&source, &IndexDescriptor::new(0, 2), &ctx).unwrap();
    assert_eq!(index.state(), ReadinessState::Building);
    assert!(!index.is_ready());
    assert_eq!(index.representations(), Err(IndexError::NotReady));
    assert_eq!(index.number_of_reads(), Err(IndexError::NotReady));
    assert_eq!(index.largest_read_id(), Err(IndexError::NotReady));
    assert_eq!(index.number_of_basepairs_in_longest_read(), Err(IndexError::NotReady));
    // Metadata is available right away
    assert_eq!(index.kmer_size(), 4);
    assert_eq!(index.window_size(), 2);

    release.fulfil(Ok(()));
    index.wait_until_ready().unwrap();
    index.wait_until_ready().unwrap();
    assert_eq!(index.state(), ReadinessState::Ready);
    assert_eq!(index.representations().unwrap().len(), 2 * (12 - 4 + 1 - 2 + 1));
}

#[test]
fn test_concurrent_builds_share_a_context() {
    let reads: Vec<String> = (0..24)
        .map(|i| {
            let unit = ["ACGTTGCA", "GGATCCAT", "TTAGGCAC", "CATGCATG"][i % 4];
            unit.repeat(2 + i % 3)
        })
        .collect();
    let source = InMemorySequenceSource::from_reads(&reads);
    let descriptors = group_reads_into_descriptors(&source, 100).unwrap();
    assert!(descriptors.len() > 1);

    let config = IndexConfiguration::new(6, 3).unwrap().with_filtering_parameter(0.3).unwrap();
    let shared = ExecutionContext::new(4).unwrap();
    let builder = IndexBuilder::new(config.clone()).unwrap();
    let indices: Vec<_> = descriptors
        .iter()
        .map(|d| builder.build(&source, d, &shared).unwrap())
        .collect();

    for (descriptor, index) in descriptors.iter().zip(&indices) {
        index.wait_until_ready().unwrap();
        let alone = build_and_wait(&source, descriptor, config.clone(), &ExecutionContext::new(1).unwrap());
        assert_eq!(elements_of(index), elements_of(&alone));
        assert_eq!(index.smallest_read_id().unwrap(), descriptor.first_read_id);
        assert_eq!(u64::from(index.largest_read_id().unwrap()), descriptor.past_the_last_read_id() - 1);
        assert!(index.check_invariants().is_ok());
    }
}

#[test]
fn test_memory_limit() {
    let source = InMemorySequenceSource::from_reads(["ACGTTGCAAGGTCCAT"; 4]);
    let descriptor = IndexDescriptor::new(0, 4);
    let builder = IndexBuilder::new(plain_config(4, 1, 1.0)).unwrap();

    // Merging 64 basepairs already fails: reported by build itself.
    let tiny = ExecutionContext::with_allocator(MemoryPool::with_capacity(32), 1).unwrap();
    assert_eq!(
        builder.build(&source, &descriptor, &tiny).unwrap_err(),
        IndexError::ResourceExhausted { requested: 64, available: 32 }
    );

    // Merging fits, the sketch does not: reported when waiting.
    let small = ExecutionContext::with_allocator(MemoryPool::with_capacity(128), 1).unwrap();
    let index = builder.build(&source, &descriptor, &small).unwrap();
    assert!(matches!(index.wait_until_ready(), Err(IndexError::ResourceExhausted { .. })));
    assert!(matches!(index.representations(), Err(IndexError::ResourceExhausted { .. })));
    drop(index);
    assert_eq!(small.allocator().in_use(), 0);

    // Everything is released when the index goes away.
    let pool = MemoryPool::unbounded();
    let ctx = ExecutionContext::with_allocator(Arc::clone(&pool), 2).unwrap();
    let index = build_and_wait(&source, &descriptor, plain_config(4, 1, 1.0), &ctx);
    assert!(pool.in_use() > 0);
    drop(index);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn test_hashing_is_deterministic() {
    let source = InMemorySequenceSource::from_reads(["GATTACAGATTACACCGTAGGCT", "TTTTGATTACAGGGCCCAAAT"]);
    let descriptor = IndexDescriptor::new(0, 2);
    let ctx = ExecutionContext::new(2).unwrap();
    let config = IndexConfiguration::new(7, 3).unwrap();
    assert!(config.hash_representations);

    let first = build_and_wait(&source, &descriptor, config.clone(), &ctx);
    let second = build_and_wait(&source, &descriptor, config, &ctx);
    assert_eq!(elements_of(&first), elements_of(&second));

    let stats = IndexStatistics::from_index(&first).unwrap();
    assert_eq!(stats.num_elements, first.representations().unwrap().len() as u64);
    assert_eq!(stats.num_groups, first.unique_representations().unwrap().len() as u64);
    assert_eq!(stats.num_reads, 2);
}

#[test]
fn test_build_from_fasta_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, ">r0\nACGTTGCA\n>r1\nGGATCCAT").unwrap();
    file.flush().unwrap();

    let source = InMemorySequenceSource::from_fastx(file.path()).unwrap();
    let ctx = ExecutionContext::new(1).unwrap();
    let index = build_and_wait(&source, &IndexDescriptor::whole_source(&source), plain_config(4, 1, 1.0), &ctx);
    assert_eq!(elements_of(&index), brute_force_kmers(&["ACGTTGCA", "GGATCCAT"], 4));
}
