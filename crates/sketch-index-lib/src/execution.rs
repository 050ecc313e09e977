//! Ordered asynchronous execution
//!
//! An [`ExecutionQueue`] owns one worker thread fed through a channel. Jobs
//! run strictly in submission order, and submitting never blocks the caller.
//! Each submission hands back a [`Completion`] that can be polled or waited
//! on. An [`ExecutionContext`] bundles the two queues an index uses (compute
//! and copy), the [`MemoryPool`] its buffers are charged to, and the rayon
//! pool its parallel kernels run in.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::error::{IndexError, Result};
use crate::memory::MemoryPool;

type Continuation<T> = Box<dyn FnOnce(&Result<T>) + Send + 'static>;

struct CompletionInner<T> {
    value: OnceLock<Result<T>>,
    continuations: Mutex<Vec<Continuation<T>>>,
    cond: Condvar,
}

/// Handle to the eventual result of an asynchronous job
pub struct Completion<T> {
    inner: Arc<CompletionInner<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Completion<T> {
    /// A completion nobody has fulfilled yet
    pub fn pending() -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                value: OnceLock::new(),
                continuations: Mutex::new(Vec::new()),
                cond: Condvar::new(),
            }),
        }
    }

    /// A completion that is already done
    pub fn ready(result: Result<T>) -> Self {
        let completion = Self::pending();
        completion.fulfil(result);
        completion
    }

    /// Store the result, wake all waiters and run the registered
    /// continuations on the calling thread. Later calls are ignored.
    pub fn fulfil(&self, result: Result<T>) {
        let continuations = {
            let mut continuations = self.inner.continuations.lock();
            if self.inner.value.set(result).is_err() {
                return;
            }
            self.inner.cond.notify_all();
            std::mem::take(&mut *continuations)
        };
        if let Some(value) = self.inner.value.get() {
            for continuation in continuations {
                continuation(value);
            }
        }
    }

    /// Run `continuation` with the result once it is stored
    ///
    /// Runs immediately on the calling thread if the result is already
    /// there, otherwise on whichever thread calls [`Completion::fulfil`].
    /// Continuations must not block.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        let mut continuations = self.inner.continuations.lock();
        match self.inner.value.get() {
            Some(value) => {
                drop(continuations);
                continuation(value);
            }
            None => continuations.push(Box::new(continuation)),
        }
    }

    /// Non-blocking check
    pub fn is_complete(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// The result if the job has finished
    pub fn try_get(&self) -> Option<&Result<T>> {
        self.inner.value.get()
    }

    /// Block until the job has finished
    pub fn wait(&self) -> &Result<T> {
        if let Some(value) = self.inner.value.get() {
            return value;
        }
        let mut guard = self.inner.continuations.lock();
        loop {
            if let Some(value) = self.inner.value.get() {
                return value;
            }
            self.inner.cond.wait(&mut guard);
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").field("complete", &self.is_complete()).finish()
    }
}

/// Type-erased completion used where only "done, and did it succeed" matters
pub trait Signal: Send + Sync {
    /// Non-blocking check
    fn is_complete(&self) -> bool;

    /// Block until done, returning the job's error if it failed
    fn wait_done(&self) -> Result<()>;

    /// `Some` once done
    fn poll_done(&self) -> Option<Result<()>>;
}

impl<T: Send + Sync> Signal for Completion<T> {
    fn is_complete(&self) -> bool {
        Completion::is_complete(self)
    }

    fn wait_done(&self) -> Result<()> {
        match self.wait() {
            Ok(_) => Ok(()),
            Err(e) => Err(e.clone()),
        }
    }

    fn poll_done(&self) -> Option<Result<()>> {
        self.try_get().map(|r| r.as_ref().map(|_| ()).map_err(Clone::clone))
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single-worker FIFO queue of jobs
pub struct ExecutionQueue {
    name: String,
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl ExecutionQueue {
    /// Spawn a queue whose worker thread is called `name`
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Job>();
        let worker = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .map_err(|e| IndexError::ExecutionFailed(format!("failed to spawn queue worker: {e}")))?;
        debug!("started execution queue {}", name);
        Ok(Self { name, sender: Some(sender), worker: Some(worker) })
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a job. It runs after every job submitted before it.
    ///
    /// A panic inside the job is caught and reported through the returned
    /// completion as [`IndexError::ExecutionFailed`].
    pub fn submit<T, F>(&self, job: F) -> Completion<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let completion = Completion::pending();
        let handle = completion.clone();
        let queue_name = self.name.clone();
        let wrapped: Job = Box::new(move || {
            let result = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "job panicked".to_string());
                    error!("job on queue {} panicked: {}", queue_name, message);
                    Err(IndexError::ExecutionFailed(message))
                }
            };
            handle.fulfil(result);
        });

        let sent = self.sender.as_ref().map(|s| s.send(wrapped));
        if !matches!(sent, Some(Ok(()))) {
            completion.fulfil(Err(IndexError::ExecutionFailed(format!(
                "execution queue {} is shut down",
                self.name
            ))));
        }
        completion
    }

    /// Block until every job submitted so far has run
    pub fn synchronize(&self) -> Result<()> {
        self.submit(|| Ok(())).wait_done()
    }
}

impl Drop for ExecutionQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is left and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            // Dropped from one of our own jobs: the worker exits on its own.
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("execution queue {} worker terminated abnormally", self.name);
            }
        }
    }
}

impl std::fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionQueue").field("name", &self.name).finish()
    }
}

/// Allocator, queues and thread pool shared by indices built together
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    allocator: Arc<MemoryPool>,
    compute: Arc<ExecutionQueue>,
    copy: Arc<ExecutionQueue>,
    pool: Arc<rayon::ThreadPool>,
}

impl ExecutionContext {
    /// Create a context with an unbounded allocator
    ///
    /// `num_threads == 0` sizes the rayon pool to all available cores.
    pub fn new(num_threads: usize) -> Result<Self> {
        Self::with_allocator(MemoryPool::unbounded(), num_threads)
    }

    /// Create a context charging buffers to `allocator`
    pub fn with_allocator(allocator: Arc<MemoryPool>, num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("sketch-index-worker-{i}"))
            .build()
            .map_err(|e| IndexError::ExecutionFailed(format!("Failed to create thread pool: {e}")))?;
        Ok(Self {
            allocator,
            compute: Arc::new(ExecutionQueue::new("sketch-index-compute")?),
            copy: Arc::new(ExecutionQueue::new("sketch-index-copy")?),
            pool: Arc::new(pool),
        })
    }

    /// Working-memory allocator
    pub fn allocator(&self) -> &Arc<MemoryPool> {
        &self.allocator
    }

    /// Queue for construction and host-to-index transfers
    pub fn compute_queue(&self) -> &Arc<ExecutionQueue> {
        &self.compute
    }

    /// Queue for index-to-host copies
    pub fn copy_queue(&self) -> &Arc<ExecutionQueue> {
        &self.copy
    }

    /// Rayon pool for the parallel kernels
    pub fn thread_pool(&self) -> &Arc<rayon::ThreadPool> {
        &self.pool
    }

    /// Block until both queues have drained
    pub fn synchronize(&self) -> Result<()> {
        self.compute.synchronize()?;
        self.copy.synchronize()
    }
}
