//! Working-memory accounting for index construction
//!
//! Every array an index owns is a [`WorkingBuffer`] charged against a shared
//! [`MemoryPool`]. The pool optionally enforces a capacity; a request that
//! would exceed it fails with [`IndexError::ResourceExhausted`] instead of
//! being retried, and the bytes are returned when the buffer is dropped.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::error::{IndexError, Result};

/// Byte-counting allocator shared by all indices built on one context
#[derive(Debug)]
pub struct MemoryPool {
    capacity: Option<usize>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryPool {
    /// Pool without a capacity limit
    pub fn unbounded() -> Arc<Self> {
        Arc::new(Self { capacity: None, in_use: AtomicUsize::new(0), peak: AtomicUsize::new(0) })
    }

    /// Pool refusing to hand out more than `capacity_bytes` at once
    pub fn with_capacity(capacity_bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: Some(capacity_bytes),
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Bytes currently charged to live buffers
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Largest value `in_use` has reached
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Configured capacity, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn reserve(self: &Arc<Self>, bytes: usize) -> Result<Reservation> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            let next = current.checked_add(bytes).ok_or(IndexError::ResourceExhausted {
                requested: bytes,
                available: self.available(current),
            })?;
            if let Some(capacity) = self.capacity {
                if next > capacity {
                    return Err(IndexError::ResourceExhausted {
                        requested: bytes,
                        available: capacity - current,
                    });
                }
            }
            match self.in_use.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::AcqRel);
                    return Ok(Reservation { pool: Arc::clone(self), bytes });
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn available(&self, in_use: usize) -> usize {
        self.capacity.map_or(usize::MAX - in_use, |c| c.saturating_sub(in_use))
    }

    /// Charge an existing vector to the pool
    pub fn adopt<T>(self: &Arc<Self>, data: Vec<T>) -> Result<WorkingBuffer<T>> {
        let reservation = self.reserve(data.len() * std::mem::size_of::<T>())?;
        Ok(WorkingBuffer { data, _reservation: reservation })
    }

    /// Allocate a buffer of `len` default values
    pub fn allocate<T: Default + Clone>(self: &Arc<Self>, len: usize) -> Result<WorkingBuffer<T>> {
        let reservation = self.reserve(len.saturating_mul(std::mem::size_of::<T>()))?;
        Ok(WorkingBuffer { data: vec![T::default(); len], _reservation: reservation })
    }

    /// Allocate a buffer holding a copy of `src`
    pub fn copy_from<T: Clone>(self: &Arc<Self>, src: &[T]) -> Result<WorkingBuffer<T>> {
        let reservation = self.reserve(std::mem::size_of_val(src))?;
        Ok(WorkingBuffer { data: src.to_vec(), _reservation: reservation })
    }
}

struct Reservation {
    pool: Arc<MemoryPool>,
    bytes: usize,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
        if self.bytes > 0 {
            debug!("released {} bytes of working memory", self.bytes);
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation").field("bytes", &self.bytes).finish()
    }
}

/// An owned array whose bytes are charged to a [`MemoryPool`]
#[derive(Debug)]
pub struct WorkingBuffer<T> {
    data: Vec<T>,
    _reservation: Reservation,
}

impl<T> WorkingBuffer<T> {
    /// View as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable view, for filling a freshly allocated buffer
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Deref for WorkingBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}
