//! Shared cells for cross-thread mutable state.
//!
//! Two flavors, picked by the shape of the state:
//!
//! | Type | Wraps | Use case |
//! |------|-------|----------|
//! | `MutArc<T>` | `Arc<Mutex<T>>` | Structured mutable state |
//! | `CellArc<T>` | `Arc<AtomicCell<T>>` | Copy flags and small state machines |

use std::sync::{Mutex, MutexGuard};

use crossbeam_utils::atomic::AtomicCell;
use rclite::Arc;

/// Arc-based mutable sharing behind a mutex.
///
/// Guards returned by `rc_deref`/`rc_deref_mut` must stay short-lived: no
/// user callback is ever invoked while one is held. Prefer `synchronize`
/// when the critical section is a single expression.
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> Clone for MutArc<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> From<T> for MutArc<T> {
  fn from(v: T) -> Self { Self(Arc::new(Mutex::new(v))) }
}

impl<T: Default> Default for MutArc<T> {
  fn default() -> Self { T::default().into() }
}

impl<T> MutArc<T> {
  pub fn rc_deref(&self) -> MutexGuard<'_, T> { self.0.lock().unwrap() }

  pub fn rc_deref_mut(&self) -> MutexGuard<'_, T> { self.0.lock().unwrap() }

  /// Run `f` with exclusive access to the contents and return its result.
  pub fn synchronize<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.0.lock().unwrap())
  }
}

/// Arc-based atomic cell for Copy types.
///
/// Uses crossbeam's `AtomicCell`, so get/set/compare_exchange are lock-free
/// for the small types stored here.
pub struct CellArc<T>(Arc<AtomicCell<T>>);

impl<T: Copy> Clone for CellArc<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: Copy> From<T> for CellArc<T> {
  fn from(v: T) -> Self { Self(Arc::new(AtomicCell::new(v))) }
}

impl<T: Copy + Default> Default for CellArc<T> {
  fn default() -> Self { T::default().into() }
}

impl<T: Copy + Eq> CellArc<T> {
  pub fn get(&self) -> T { self.0.load() }

  pub fn set(&self, value: T) { self.0.store(value) }

  pub fn compare_exchange(&self, current: T, new: T) -> Result<T, T> {
    self.0.compare_exchange(current, new)
  }
}
