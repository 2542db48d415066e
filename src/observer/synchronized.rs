use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::async_lock::AsyncLock;
use crate::cell::MutArc;
use crate::observer::{BaseObserver, Observer};

/// Serializes notifications under a re-entrant lock.
///
/// Each of the three notifications acquires the lock before delegating, so
/// notifications from distinct threads mutually exclude for the whole
/// delivery. The lock is re-entrant because downstream operators
/// legitimately re-enter from the same thread (e.g. a subject emitting
/// synchronously from inside `next`): the re-entrant acquisition succeeds
/// and the nested notification delivers immediately, inside the in-progress
/// callback, growing the stack with the re-entry depth.
///
/// Delegation runs on a clone of the observer taken under the guard — that
/// clone is what makes the nested mutable delivery expressible — so the
/// wrapped observer must be a handle whose clones share the underlying
/// sink: a closure observer over `Arc` state, a [`MutArc`]-shared observer,
/// a subject handle. An observer carrying by-value state should be wrapped
/// in [`MutArc`] before synchronizing.
///
/// Contrast with [`AsyncLockObserver`], which queues every notification —
/// re-entrant ones included — and keeps depth bounded instead.
pub struct SynchronizedObserver<O> {
  state: Arc<ReentrantMutex<O>>,
}

impl<O> Clone for SynchronizedObserver<O> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<O> SynchronizedObserver<O> {
  pub fn new(observer: O) -> Self {
    Self { state: Arc::new(ReentrantMutex::new(observer)) }
  }
}

impl<O: Observer + Clone> Observer for SynchronizedObserver<O> {
  type Item = O::Item;
  type Err = O::Err;

  fn next(&mut self, value: Self::Item) {
    let guard = self.state.lock();
    let mut observer = (*guard).clone();
    observer.next(value);
  }

  fn error(&mut self, err: Self::Err) {
    let guard = self.state.lock();
    let mut observer = (*guard).clone();
    observer.error(err);
  }

  fn complete(&mut self) {
    let guard = self.state.lock();
    let mut observer = (*guard).clone();
    observer.complete();
  }

  fn is_stopped(&self) -> bool { self.state.lock().is_stopped() }
}

/// Serializes notifications by deferring each onto an [`AsyncLock`].
///
/// Delivery runs through a shared [`BaseObserver`], so termination finality
/// holds across producers. Unlike [`SynchronizedObserver`], a producer that
/// is already inside the lock has its further notifications queued rather
/// than run re-entrantly — depth stays bounded and producers take fair
/// turns.
pub struct AsyncLockObserver<O: Observer> {
  inner: MutArc<BaseObserver<O>>,
  gate: AsyncLock,
}

impl<O: Observer> Clone for AsyncLockObserver<O> {
  fn clone(&self) -> Self {
    Self { inner: self.inner.clone(), gate: self.gate.clone() }
  }
}

impl<O: Observer> AsyncLockObserver<O> {
  pub fn new(observer: O) -> Self {
    Self { inner: MutArc::from(BaseObserver::new(observer)), gate: AsyncLock::new() }
  }
}

impl<O> Observer for AsyncLockObserver<O>
where
  O: Observer + Send + 'static,
  O::Item: Send + 'static,
  O::Err: Send + 'static,
{
  type Item = O::Item;
  type Err = O::Err;

  fn next(&mut self, value: Self::Item) {
    let mut inner = self.inner.clone();
    self.gate.wait(move || inner.next(value));
  }

  fn error(&mut self, err: Self::Err) {
    let mut inner = self.inner.clone();
    self.gate.wait(move || inner.error(err));
  }

  fn complete(&mut self) {
    let mut inner = self.inner.clone();
    self.gate.wait(move || inner.complete());
  }

  fn is_stopped(&self) -> bool {
    // A faulted gate delivers nothing further; report the chain stopped
    // without touching the inner lock, which the fault left poisoned.
    self.gate.is_faulted() || self.inner.rc_deref().is_stopped()
  }
}
