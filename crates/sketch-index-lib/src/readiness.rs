//! Readiness gate: Building -> Ready, one way
//!
//! The gate owns the completion of the job producing a value plus any
//! extra signals that must also fire (a host snapshot still being filled,
//! for instance). Until all of them have completed successfully the value
//! is unreachable; afterwards it is handed out by shared reference.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{IndexError, Result};
use crate::execution::{Completion, Signal};

/// Observable construction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// Asynchronous work is still outstanding (or has failed)
    Building,
    /// All work completed; the value is immutable from now on
    Ready,
}

/// Gate guarding a value produced asynchronously
pub struct ReadinessGate<T> {
    work: Completion<T>,
    dependencies: Vec<Box<dyn Signal>>,
    ready: AtomicBool,
}

impl<T: Send + Sync + 'static> ReadinessGate<T> {
    /// Gate on the completion of `work`
    pub fn new(work: Completion<T>) -> Self {
        Self { work, dependencies: Vec::new(), ready: AtomicBool::new(false) }
    }

    /// Gate that is Ready from the start
    pub fn ready(value: T) -> Self {
        Self { work: Completion::ready(Ok(value)), dependencies: Vec::new(), ready: AtomicBool::new(true) }
    }

    /// Also require `signal` before becoming Ready
    pub fn with_dependency(mut self, signal: Box<dyn Signal>) -> Self {
        self.dependencies.push(signal);
        self
    }

    /// Current state, without blocking
    pub fn state(&self) -> ReadinessState {
        if self.is_ready() {
            ReadinessState::Ready
        } else {
            ReadinessState::Building
        }
    }

    /// Non-blocking poll. Completes the transition if every piece of work
    /// has already finished successfully.
    pub fn is_ready(&self) -> bool {
        if self.ready.load(Ordering::Acquire) {
            return true;
        }
        let dependencies_done = self
            .dependencies
            .iter()
            .all(|d| matches!(d.poll_done(), Some(Ok(()))));
        if dependencies_done && matches!(self.work.try_get(), Some(Ok(_))) {
            self.ready.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Block until all outstanding work has completed, then become Ready.
    ///
    /// Repeat calls return immediately. If any piece of work failed, its
    /// error is returned every time and the gate stays closed.
    pub fn wait_until_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        for dependency in &self.dependencies {
            dependency.wait_done()?;
        }
        match self.work.wait() {
            Ok(_) => {
                self.ready.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => Err(e.clone()),
        }
    }

    /// The gated value, or `NotReady` while Building
    ///
    /// Once construction is known to have failed the construction error is
    /// returned instead.
    pub fn get(&self) -> Result<&T> {
        if !self.ready.load(Ordering::Acquire) {
            return match self.work.try_get() {
                Some(Err(e)) => Err(e.clone()),
                _ => Err(IndexError::NotReady),
            };
        }
        match self.work.try_get() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(e.clone()),
            None => Err(IndexError::NotReady),
        }
    }

    /// Completion of the producing job
    pub(crate) fn work(&self) -> &Completion<T> {
        &self.work
    }

    /// Block until the producing job has finished, successfully or not.
    /// Used before releasing buffers the jobs touch.
    ///
    /// Work is only started once every dependency has fired, so a gate
    /// whose dependencies are still pending has nothing in flight and
    /// returns at once.
    pub fn drain(&self) {
        if self.dependencies.iter().any(|d| !d.is_complete()) {
            return;
        }
        let _ = self.work.wait();
    }
}

impl<T> std::fmt::Debug for ReadinessGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("ready", &self.ready.load(Ordering::Acquire))
            .field("dependencies", &self.dependencies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_fail_while_building() {
        let work = Completion::<u32>::pending();
        let gate = ReadinessGate::new(work.clone());
        assert_eq!(gate.state(), ReadinessState::Building);
        assert_eq!(gate.get(), Err(IndexError::NotReady));

        work.fulfil(Ok(11));
        // Polling alone completes the transition once the job is done.
        assert!(gate.is_ready());
        assert_eq!(gate.get(), Ok(&11));
    }

    #[test]
    fn test_wait_is_idempotent() {
        let gate = ReadinessGate::new(Completion::ready(Ok(vec![1u8, 2])));
        gate.wait_until_ready().unwrap();
        gate.wait_until_ready().unwrap();
        assert_eq!(gate.state(), ReadinessState::Ready);
        assert_eq!(gate.get().unwrap().len(), 2);
    }

    #[test]
    fn test_dependency_holds_the_gate() {
        let snapshot_done = Completion::<()>::pending();
        let gate = ReadinessGate::new(Completion::ready(Ok(5u8)))
            .with_dependency(Box::new(snapshot_done.clone()));

        assert!(!gate.is_ready());
        assert_eq!(gate.get(), Err(IndexError::NotReady));

        snapshot_done.fulfil(Ok(()));
        gate.wait_until_ready().unwrap();
        assert_eq!(gate.get(), Ok(&5));
    }

    #[test]
    fn test_failed_work_is_reported() {
        let err = IndexError::ResourceExhausted { requested: 8, available: 0 };
        let gate = ReadinessGate::<u8>::new(Completion::ready(Err(err.clone())));
        assert!(!gate.is_ready());
        assert_eq!(gate.wait_until_ready(), Err(err.clone()));
        assert_eq!(gate.wait_until_ready(), Err(err.clone()));
        assert_eq!(gate.get(), Err(err));
    }

    #[test]
    fn test_drain_skips_work_behind_pending_dependency() {
        let snapshot_done = Completion::<()>::pending();
        let gate = ReadinessGate::new(Completion::<u8>::pending())
            .with_dependency(Box::new(snapshot_done.clone()));
        // Would block forever if it waited on the unstarted work.
        gate.drain();
        assert_eq!(gate.state(), ReadinessState::Building);
    }

    #[test]
    fn test_ready_gate() {
        let gate = ReadinessGate::ready("done");
        assert!(gate.is_ready());
        assert_eq!(gate.get(), Ok(&"done"));
    }
}
