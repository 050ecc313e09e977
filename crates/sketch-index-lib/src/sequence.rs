//! Sequence sources: where the builder gets read basepairs from
//!
//! The builder only needs sequential, read-only access by read id. The
//! shipped implementation keeps every read in memory and can be filled
//! from a FASTA/FASTQ file (gzip handled transparently by needletail).

use anyhow::{Context, Result};
use needletail::parse_fastx_file;
use std::path::Path;
use tracing::debug;

use crate::error::IndexError;
use crate::types::ReadId;

/// One read as handed out by a [`SequenceSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSequence<'a> {
    /// Read name (FASTA/FASTQ id line)
    pub name: &'a str,
    /// Raw basepairs
    pub basepairs: &'a [u8],
}

/// Read-only access to reads by id
pub trait SequenceSource {
    /// Number of reads available; valid ids are `0..number_of_reads()`
    fn number_of_reads(&self) -> u32;

    /// Fetch one read
    fn get_sequence(&self, read_id: ReadId) -> crate::error::Result<ReadSequence<'_>>;
}

/// A sequence source holding every read in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySequenceSource {
    names: Vec<String>,
    reads: Vec<Vec<u8>>,
}

impl InMemorySequenceSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a read; its id is the number of reads added before it
    pub fn push(&mut self, name: impl Into<String>, basepairs: impl Into<Vec<u8>>) -> ReadId {
        let read_id = self.reads.len() as ReadId;
        self.names.push(name.into());
        self.reads.push(basepairs.into());
        read_id
    }

    /// Build a source from basepair strings, naming reads `read_<id>`
    pub fn from_reads<I, S>(reads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut source = Self::new();
        for seq in reads {
            let name = format!("read_{}", source.reads.len());
            source.push(name, seq.as_ref().to_vec());
        }
        source
    }

    /// Load every record of a FASTA/FASTQ file
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or parsed, or if a record
    /// contains bases other than A, C, G, T.
    pub fn from_fastx<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut source = Self::new();
        let loaded = parse_sequences(path, |name, basepairs| {
            source.push(String::from_utf8_lossy(name).into_owned(), basepairs.to_vec());
            Ok(())
        })?;
        debug!("loaded {} reads from {}", loaded, path.display());
        Ok(source)
    }

    /// Total basepairs over all reads
    pub fn total_basepairs(&self) -> usize {
        self.reads.iter().map(Vec::len).sum()
    }
}

impl SequenceSource for InMemorySequenceSource {
    fn number_of_reads(&self) -> u32 {
        self.reads.len() as u32
    }

    fn get_sequence(&self, read_id: ReadId) -> crate::error::Result<ReadSequence<'_>> {
        let idx = read_id as usize;
        match (self.names.get(idx), self.reads.get(idx)) {
            (Some(name), Some(basepairs)) => Ok(ReadSequence { name, basepairs }),
            _ => Err(IndexError::ReadOutOfRange {
                read_id,
                number_of_reads: self.number_of_reads(),
            }),
        }
    }
}

/// Stream the records of a FASTA/FASTQ file, plain or gzipped, into
/// `on_record(name, basepairs)`
///
/// Each record is checked against the ACGT alphabet before it is handed
/// over; the first bad record ends the walk with an error naming it.
/// Returns the number of records delivered.
pub fn parse_sequences<P, F>(path: P, mut on_record: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(&[u8], &[u8]) -> Result<()>,
{
    let path = path.as_ref();
    let mut reader =
        parse_fastx_file(path).with_context(|| format!("Cannot open read file {}", path.display()))?;

    let mut delivered = 0;
    while let Some(record) = reader.next() {
        let record = record
            .with_context(|| format!("Malformed record #{} in {}", delivered + 1, path.display()))?;
        let basepairs = record.seq();
        validate_dna_sequence(&basepairs).with_context(|| {
            format!("Read {} in {}", String::from_utf8_lossy(record.id()), path.display())
        })?;
        on_record(record.id(), &basepairs)?;
        delivered += 1;
    }
    Ok(delivered)
}

/// Validate that a sequence contains only valid DNA bases (A, C, G, T)
pub fn validate_dna_sequence(seq: &[u8]) -> Result<()> {
    if let Some(i) = seq.iter().position(|b| crate::encoding::encode_base(*b).is_none()) {
        anyhow::bail!(
            "Invalid DNA base '{}' at position {}. Only A, C, G, T are allowed.",
            seq[i] as char,
            i
        );
    }
    Ok(())
}
