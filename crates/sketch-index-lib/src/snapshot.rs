//! Host-resident snapshots of an index
//!
//! A [`HostIndexSnapshot`] holds the six arrays of an index in plain host
//! vectors, outside any [`MemoryPool`], together with the metadata needed
//! to rebuild it. The arrays are published through a [`Completion`] so a
//! snapshot can be handed around while it is still being filled.
//!
//! - [`HostIndexSnapshot::from_index`] copies a Ready index out on the
//!   context's copy queue.
//! - [`SketchIndex::from_host_snapshot`] creates an index from a snapshot.
//!   Once the snapshot is filled, one transfer per array is queued on the
//!   compute queue, followed by the job assembling them.
//!
//! There is no wire or file format here; the snapshot lives in memory.
//!
//! [`MemoryPool`]: crate::memory::MemoryPool

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::arrays::SketchArrays;
use crate::error::{IndexError, Result};
use crate::execution::{Completion, ExecutionContext, ExecutionQueue};
use crate::index::{IndexContents, IndexMetadata, SketchIndex};
use crate::memory::{MemoryPool, WorkingBuffer};
use crate::readiness::ReadinessGate;
use crate::types::{Direction, PositionInRead, ReadId, Representation};

/// The six arrays of an index, in host memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotArrays {
    /// Sort key of every element
    pub representations: Vec<Representation>,
    /// Read of every element
    pub read_ids: Vec<ReadId>,
    /// Position in read of every element
    pub positions_in_reads: Vec<PositionInRead>,
    /// Strand of every element
    pub directions: Vec<Direction>,
    /// Distinct representations
    pub unique_representations: Vec<Representation>,
    /// First element of each distinct representation, plus trailing sentinel
    pub first_occurrence: Vec<u64>,
}

impl SnapshotArrays {
    /// Copy the arrays out of a working set
    pub fn from_arrays(arrays: &SketchArrays) -> Self {
        Self {
            representations: arrays.representations.to_vec(),
            read_ids: arrays.read_ids.to_vec(),
            positions_in_reads: arrays.positions_in_reads.to_vec(),
            directions: arrays.directions.to_vec(),
            unique_representations: arrays.unique_representations.to_vec(),
            first_occurrence: arrays.first_occurrence.to_vec(),
        }
    }

    /// Check that the array lengths agree with each other and with the
    /// number of reads the snapshot claims to cover
    pub fn check_shape(&self, number_of_reads: u32) -> Result<()> {
        let n = self.representations.len();
        if self.read_ids.len() != n || self.positions_in_reads.len() != n || self.directions.len() != n {
            return Err(IndexError::snapshot(format!(
                "element arrays differ in length: {} / {} / {} / {}",
                n,
                self.read_ids.len(),
                self.positions_in_reads.len(),
                self.directions.len()
            )));
        }
        if number_of_reads == 0 && n > 0 {
            return Err(IndexError::snapshot("snapshot without reads holds sketch elements"));
        }
        check_table_shape(n, self.unique_representations.len(), &self.first_occurrence)
    }
}

/// `first_occurrence` must hold one entry per unique representation plus
/// the sentinel `n`; an array set with nothing in it may omit the sentinel.
fn check_table_shape(n: usize, number_of_unique: usize, first_occurrence: &[u64]) -> Result<()> {
    if n == 0 && number_of_unique == 0 && first_occurrence.is_empty() {
        return Ok(());
    }
    if first_occurrence.len() != number_of_unique + 1 {
        return Err(IndexError::snapshot(format!(
            "{} first occurrences for {} unique representations",
            first_occurrence.len(),
            number_of_unique
        )));
    }
    if first_occurrence.last() != Some(&(n as u64)) {
        return Err(IndexError::snapshot("first_occurrence sentinel does not match element count"));
    }
    Ok(())
}

/// An index's contents and metadata in host memory
#[derive(Debug)]
pub struct HostIndexSnapshot {
    metadata: IndexMetadata,
    number_of_reads: u32,
    longest_read: u32,
    arrays: Completion<Arc<SnapshotArrays>>,
}

impl HostIndexSnapshot {
    /// Snapshot of already materialized arrays
    pub fn from_arrays(
        metadata: IndexMetadata,
        number_of_reads: u32,
        longest_read: u32,
        arrays: SnapshotArrays,
    ) -> Result<Arc<Self>> {
        arrays.check_shape(number_of_reads)?;
        Ok(Arc::new(Self {
            metadata,
            number_of_reads,
            longest_read,
            arrays: Completion::ready(Ok(Arc::new(arrays))),
        }))
    }

    /// Snapshot whose arrays arrive through `arrays` later on
    pub fn from_completion(
        metadata: IndexMetadata,
        number_of_reads: u32,
        longest_read: u32,
        arrays: Completion<Arc<SnapshotArrays>>,
    ) -> Arc<Self> {
        Arc::new(Self { metadata, number_of_reads, longest_read, arrays })
    }

    /// Start copying a Ready index to host memory on `ctx`'s copy queue
    ///
    /// Fails with [`IndexError::NotReady`] if the index is still building.
    pub fn from_index(index: &SketchIndex, ctx: &ExecutionContext) -> Result<Arc<Self>> {
        let contents = index.ready_contents()?;
        let number_of_reads = index.number_of_reads()?;
        let longest_read = index.number_of_basepairs_in_longest_read()?;
        let first_read_id = index.first_read_id();

        let arrays = ctx.copy_queue().submit(move || {
            let contents = contents.wait().as_ref().map_err(Clone::clone)?;
            let arrays = SnapshotArrays::from_arrays(&contents.arrays);
            debug!(
                "copied index of reads starting at {} to host: {} elements",
                first_read_id,
                arrays.representations.len()
            );
            Ok(Arc::new(arrays))
        });

        Ok(Arc::new(Self { metadata: *index.metadata(), number_of_reads, longest_read, arrays }))
    }

    /// Construction parameters of the snapshotted index
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// Reads covered by the snapshotted index
    pub fn number_of_reads(&self) -> u32 {
        self.number_of_reads
    }

    /// Longest contributing read of the snapshotted index
    pub fn number_of_basepairs_in_longest_read(&self) -> u32 {
        self.longest_read
    }

    /// Whether the arrays have arrived
    pub fn is_copied(&self) -> bool {
        self.arrays.is_complete()
    }

    /// Block until the arrays have arrived
    pub fn wait_until_copied(&self) -> Result<()> {
        self.arrays().map(|_| ())
    }

    /// The arrays, blocking until they have arrived
    pub fn arrays(&self) -> Result<&SnapshotArrays> {
        self.arrays.wait().as_ref().map(|a| a.as_ref()).map_err(Clone::clone)
    }

    fn completion(&self) -> &Completion<Arc<SnapshotArrays>> {
        &self.arrays
    }
}

/// Buffers filled by the per-array transfer jobs
#[derive(Default)]
struct TransferSlots {
    representations: Option<WorkingBuffer<Representation>>,
    read_ids: Option<WorkingBuffer<ReadId>>,
    positions_in_reads: Option<WorkingBuffer<PositionInRead>>,
    directions: Option<WorkingBuffer<Direction>>,
    unique_representations: Option<WorkingBuffer<Representation>>,
    first_occurrence: Option<WorkingBuffer<u64>>,
}

impl TransferSlots {
    fn into_arrays(self) -> Result<SketchArrays> {
        let missing = || IndexError::snapshot("a transfer job did not deliver its array");
        Ok(SketchArrays {
            representations: self.representations.ok_or_else(missing)?,
            read_ids: self.read_ids.ok_or_else(missing)?,
            positions_in_reads: self.positions_in_reads.ok_or_else(missing)?,
            directions: self.directions.ok_or_else(missing)?,
            unique_representations: self.unique_representations.ok_or_else(missing)?,
            first_occurrence: self.first_occurrence.ok_or_else(missing)?,
        })
    }
}

/// Queue the copy of one snapshot array into a working buffer
fn submit_transfer<T, Select, Store>(
    queue: &ExecutionQueue,
    arrays: &Arc<SnapshotArrays>,
    allocator: &Arc<MemoryPool>,
    slots: &Arc<Mutex<TransferSlots>>,
    select: Select,
    store: Store,
) -> Completion<()>
where
    T: Clone + Send + Sync + 'static,
    Select: FnOnce(&SnapshotArrays) -> &[T] + Send + 'static,
    Store: FnOnce(&mut TransferSlots, WorkingBuffer<T>) + Send + 'static,
{
    let arrays = Arc::clone(arrays);
    let allocator = Arc::clone(allocator);
    let slots = Arc::clone(slots);
    queue.submit(move || {
        let buffer = allocator.copy_from(select(&arrays))?;
        store(&mut slots.lock(), buffer);
        Ok(())
    })
}

/// Queue the six transfers of a filled snapshot followed by the job that
/// assembles them; the assembled contents are published through `assembled`
fn submit_transfers(
    queue: &ExecutionQueue,
    arrays: &Arc<SnapshotArrays>,
    allocator: &Arc<MemoryPool>,
    number_of_reads: u32,
    longest_read: u32,
    assembled: Completion<IndexContents>,
) {
    let slots = Arc::new(Mutex::new(TransferSlots::default()));
    let transfers = vec![
        submit_transfer(queue, arrays, allocator, &slots, |a| &a.representations[..], |s, b| {
            s.representations = Some(b)
        }),
        submit_transfer(queue, arrays, allocator, &slots, |a| &a.read_ids[..], |s, b| s.read_ids = Some(b)),
        submit_transfer(queue, arrays, allocator, &slots, |a| &a.positions_in_reads[..], |s, b| {
            s.positions_in_reads = Some(b)
        }),
        submit_transfer(queue, arrays, allocator, &slots, |a| &a.directions[..], |s, b| s.directions = Some(b)),
        submit_transfer(queue, arrays, allocator, &slots, |a| &a.unique_representations[..], |s, b| {
            s.unique_representations = Some(b)
        }),
        submit_transfer(queue, arrays, allocator, &slots, |a| &a.first_occurrence[..], |s, b| {
            s.first_occurrence = Some(b)
        }),
    ];

    // Runs after the six transfers on the same queue.
    let publish = assembled.clone();
    let finished = queue.submit(move || {
        for transfer in &transfers {
            transfer.wait().clone()?;
        }
        let arrays = std::mem::take(&mut *slots.lock()).into_arrays()?;
        if arrays.read_ids.len() != arrays.len()
            || arrays.positions_in_reads.len() != arrays.len()
            || arrays.directions.len() != arrays.len()
        {
            return Err(IndexError::snapshot("transferred element arrays differ in length"));
        }
        check_table_shape(arrays.len(), arrays.unique_representations.len(), &arrays.first_occurrence)?;
        debug!("transferred {} sketch elements from host snapshot", arrays.len());
        publish.fulfil(Ok(IndexContents { arrays, number_of_reads, longest_read, filter_statistics: None }));
        Ok(())
    });
    finished.on_complete(move |result| {
        if let Err(e) = result {
            assembled.fulfil(Err(e.clone()));
        }
    });
}

impl SketchIndex {
    /// Create an index by transferring a host snapshot into `ctx`'s working
    /// memory
    ///
    /// Returns immediately. Nothing is queued until the snapshot has been
    /// filled, so a pending snapshot never holds up other work on `ctx`.
    /// The index becomes Ready once the six transfers have completed.
    pub fn from_host_snapshot(snapshot: Arc<HostIndexSnapshot>, ctx: &ExecutionContext) -> Result<SketchIndex> {
        let metadata = *snapshot.metadata();
        let number_of_reads = snapshot.number_of_reads();
        let longest_read = snapshot.number_of_basepairs_in_longest_read();
        info!(
            "Transferring host snapshot of reads starting at {} ({} reads)",
            metadata.first_read_id, number_of_reads
        );

        let assembled = Completion::pending();
        let publish = assembled.clone();
        let queue = Arc::downgrade(ctx.compute_queue());
        let allocator = Arc::clone(ctx.allocator());
        snapshot.completion().on_complete(move |filled| {
            let arrays = match filled {
                Ok(arrays) => arrays,
                Err(e) => return publish.fulfil(Err(e.clone())),
            };
            match queue.upgrade() {
                Some(queue) => {
                    submit_transfers(&queue, arrays, &allocator, number_of_reads, longest_read, publish)
                }
                None => publish.fulfil(Err(IndexError::ExecutionFailed(
                    "compute queue shut down before the host snapshot was filled".to_string(),
                ))),
            }
        });

        let gate = ReadinessGate::new(assembled).with_dependency(Box::new(snapshot.completion().clone()));
        Ok(SketchIndex::from_parts(metadata, gate))
    }
}
