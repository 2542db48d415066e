//! Cooperative mutual exclusion through work deferral.
//!
//! An [`AsyncLock`] never blocks a caller on another caller's work for long:
//! work is pushed onto a FIFO queue, and whichever thread finds the lock idle
//! becomes the drainer and runs the queue to empty. A caller that is already
//! inside the lock has its follow-up work queued rather than run re-entrantly,
//! which bounds stack depth and keeps delivery fair.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex};

type Deferred = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct LockState {
  queue: VecDeque<Deferred>,
  is_acquired: bool,
  has_faulted: bool,
}

/// FIFO queue of deferred actions plus a busy flag.
///
/// Invariant: exactly one action runs at a time. Enqueuing while idle
/// transitions the lock to busy, and the enqueuing thread drains the queue;
/// enqueuing while busy returns immediately. Clones share the same queue.
#[derive(Clone, Default)]
pub struct AsyncLock {
  state: Arc<Mutex<LockState>>,
}

impl AsyncLock {
  pub fn new() -> Self { Self::default() }

  /// Queue `work` and run it once its turn comes.
  ///
  /// If the lock is idle, the current thread runs `work` (and anything queued
  /// behind it) before returning. If a queued item panics the lock becomes
  /// faulted: the rest of the queue is dropped and later `wait` calls are
  /// silently ignored.
  pub fn wait(&self, work: impl FnOnce() + Send + 'static) {
    {
      let mut state = self.state.lock().unwrap();
      if state.has_faulted {
        return;
      }
      state.queue.push_back(Box::new(work));
      if state.is_acquired {
        return;
      }
      state.is_acquired = true;
    }
    self.drain();
  }

  /// Whether a queued item panicked, dropping the queue.
  ///
  /// A faulted lock ignores further `wait` calls, so callers can treat it
  /// as permanently stopped.
  pub fn is_faulted(&self) -> bool {
    self.state.lock().map(|state| state.has_faulted).unwrap_or(true)
  }

  fn drain(&self) {
    loop {
      let next = {
        let mut state = self.state.lock().unwrap();
        match state.queue.pop_front() {
          Some(work) => work,
          None => {
            state.is_acquired = false;
            return;
          }
        }
      };
      // The state lock is released while the item runs, so the item may
      // re-enter `wait` and extend the queue.
      let fault = FaultGuard(self);
      next();
      mem::forget(fault);
    }
  }
}

/// Marks the lock faulted if a queued item unwinds.
struct FaultGuard<'a>(&'a AsyncLock);

impl Drop for FaultGuard<'_> {
  fn drop(&mut self) {
    if let Ok(mut state) = self.0.state.lock() {
      state.queue.clear();
      state.is_acquired = false;
      state.has_faulted = true;
    }
  }
}
