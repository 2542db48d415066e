//! The observer protocol.
//!
//! An observer is a bundle of three notification capabilities: `next`,
//! `error`, and `complete`. The trait carries no enforcement of its own; the
//! adapters layered on top supply the observer contract — at most one
//! terminal notification, nothing after a terminal, and no two notifications
//! running concurrently:
//!
//! - [`BaseObserver`] makes termination final (extra notifications are
//!   silently dropped).
//! - [`CheckedObserver`] turns re-entrancy and use-after-terminal into
//!   [`ProtocolViolation`](crate::error::ProtocolViolation) failures.
//! - [`SynchronizedObserver`] and [`AsyncLockObserver`] serialize
//!   notifications arriving from multiple producers.
//!
//! Every adapter takes an observer and returns one of the same shape, so
//! they compose freely.

use std::fmt;
use std::marker::PhantomData;

use crate::cell::MutArc;

mod base;
mod checked;
mod synchronized;

pub use base::BaseObserver;
pub use checked::CheckedObserver;
pub use synchronized::{AsyncLockObserver, SynchronizedObserver};

/// A consumer of values delivered by a producer, one method per notification
/// kind.
///
/// `Item` is the type of the elements being emitted, `Err` the type of the
/// error that may propagate.
pub trait Observer {
  type Item;
  type Err;
  fn next(&mut self, value: Self::Item);
  fn error(&mut self, err: Self::Err);
  fn complete(&mut self);
  fn is_stopped(&self) -> bool;
}

/// An observer assembled from three closures. See [`create`].
#[derive(Clone)]
pub struct AnonymousObserver<N, E, C, Item, Err> {
  next: N,
  error: E,
  complete: C,
  _marker: PhantomData<fn(Item, Err)>,
}

impl<N, E, C, Item, Err> Observer for AnonymousObserver<N, E, C, Item, Err>
where
  N: FnMut(Item),
  E: FnMut(Err),
  C: FnMut(),
{
  type Item = Item;
  type Err = Err;

  fn next(&mut self, value: Item) { (self.next)(value) }

  fn error(&mut self, err: Err) { (self.error)(err) }

  fn complete(&mut self) { (self.complete)() }

  #[inline]
  fn is_stopped(&self) -> bool { false }
}

/// Build a raw observer from the full notification triple.
///
/// The result enforces nothing; wrap it (e.g. via [`ObserverExt::base`]) to
/// get the observer contract.
pub fn create<Item, Err, N, E, C>(
  next: N, error: E, complete: C,
) -> AnonymousObserver<N, E, C, Item, Err>
where
  N: FnMut(Item),
  E: FnMut(Err),
  C: FnMut(),
{
  AnonymousObserver { next, error, complete, _marker: PhantomData }
}

/// Build an observer from a `next` handler alone.
///
/// `complete` is a no-op and an incoming error panics at the delivery site,
/// so this form suits leaf observers whose invoker can handle the panic.
pub fn from_next<Item, Err, N>(
  next: N,
) -> AnonymousObserver<N, impl FnMut(Err), impl FnMut(), Item, Err>
where
  N: FnMut(Item),
  Err: fmt::Debug,
{
  create(next, |err: Err| panic!("uncaught stream error: {err:?}"), || {})
}

impl<O: Observer + ?Sized> Observer for Box<O> {
  type Item = O::Item;
  type Err = O::Err;

  #[inline]
  fn next(&mut self, value: Self::Item) { (**self).next(value) }

  #[inline]
  fn error(&mut self, err: Self::Err) { (**self).error(err) }

  #[inline]
  fn complete(&mut self) { (**self).complete() }

  #[inline]
  fn is_stopped(&self) -> bool { (**self).is_stopped() }
}

/// A shared observer observes like an owned one; delivery goes through the
/// lock, one notification at a time per handle.
impl<O: Observer> Observer for MutArc<O> {
  type Item = O::Item;
  type Err = O::Err;

  fn next(&mut self, value: Self::Item) { self.rc_deref_mut().next(value) }

  fn error(&mut self, err: Self::Err) { self.rc_deref_mut().error(err) }

  fn complete(&mut self) { self.rc_deref_mut().complete() }

  fn is_stopped(&self) -> bool { self.rc_deref().is_stopped() }
}

/// Wrapping adapters, available on any observer.
pub trait ObserverExt: Observer + Sized {
  /// Enforce termination finality by silently dropping notifications after
  /// the first terminal.
  fn base(self) -> BaseObserver<Self> { BaseObserver::new(self) }

  /// Reject re-entrant and post-terminal notifications as
  /// [`ProtocolViolation`](crate::error::ProtocolViolation)s.
  fn checked(self) -> CheckedObserver<Self> { CheckedObserver::new(self) }

  /// Serialize notifications under a re-entrant lock; same-thread re-entry
  /// nests. Delivery requires the observer to be a handle whose clones
  /// share its sink — see [`SynchronizedObserver`].
  fn synchronize(self) -> SynchronizedObserver<Self> { SynchronizedObserver::new(self) }

  /// Serialize notifications by deferring them onto an
  /// [`AsyncLock`](crate::async_lock::AsyncLock) queue.
  fn synchronize_async(self) -> AsyncLockObserver<Self> { AsyncLockObserver::new(self) }
}

impl<O: Observer + Sized> ObserverExt for O {}
