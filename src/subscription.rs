//! Cancelable handles for work in flight.
//!
//! Every scheduling operation and observer chain hands back something that
//! implements [`SubscriptionLike`]. Unsubscribing is idempotent and safe from
//! any thread; once closed a handle is inert.

use std::mem::replace;
use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

/// A cancelable handle to release work before it finishes on its own.
pub trait SubscriptionLike {
  /// Release the work this handle represents. Calling it again is a no-op.
  fn unsubscribe(&mut self);

  fn is_closed(&self) -> bool;
}

/// Type-erased subscription, the common currency of the scheduler layer.
pub type BoxSubscription = Box<dyn SubscriptionLike + Send>;

/// The empty subscription: nothing to release, always closed.
impl SubscriptionLike for () {
  #[inline]
  fn unsubscribe(&mut self) {}

  #[inline]
  fn is_closed(&self) -> bool { true }
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Box<T> {
  #[inline]
  fn unsubscribe(&mut self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// The empty subscription, boxed.
#[inline]
pub fn empty() -> BoxSubscription { Box::new(()) }

#[derive(Default)]
struct CompositeInner {
  closed: bool,
  children: SmallVec<[BoxSubscription; 2]>,
}

/// Aggregates child subscriptions under one handle.
///
/// Unsubscribing the composite unsubscribes every current child; a child
/// added afterwards is unsubscribed on the spot, so cancellation covers
/// future children too. Clones share the same set.
#[derive(Clone, Default)]
pub struct CompositeSubscription(Arc<Mutex<CompositeInner>>);

impl CompositeSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, mut subscription: BoxSubscription) {
    let mut inner = self.0.lock().unwrap();
    if inner.closed {
      drop(inner);
      subscription.unsubscribe();
    } else {
      inner.children.push(subscription);
    }
  }
}

impl SubscriptionLike for CompositeSubscription {
  fn unsubscribe(&mut self) {
    // Children are released outside the lock so no teardown callback runs
    // while the composite is held.
    let children = {
      let mut inner = self.0.lock().unwrap();
      if inner.closed {
        return;
      }
      inner.closed = true;
      replace(&mut inner.children, SmallVec::new())
    };
    for mut child in children {
      child.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap().closed }
}

#[derive(Default)]
struct MultiAssignInner {
  closed: bool,
  current: Option<BoxSubscription>,
}

/// Holds at most one child subscription, replaceable over time.
///
/// Assigning a new child unsubscribes the previous one; assigning to a
/// closed slot unsubscribes the incoming child immediately. Clones share the
/// same slot.
#[derive(Clone, Default)]
pub struct MultiAssignSubscription(Arc<Mutex<MultiAssignInner>>);

impl MultiAssignSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn set(&mut self, mut subscription: BoxSubscription) {
    let prev = {
      let mut inner = self.0.lock().unwrap();
      if inner.closed {
        drop(inner);
        subscription.unsubscribe();
        return;
      }
      inner.current.replace(subscription)
    };
    if let Some(mut prev) = prev {
      prev.unsubscribe();
    }
  }
}

impl SubscriptionLike for MultiAssignSubscription {
  fn unsubscribe(&mut self) {
    let current = {
      let mut inner = self.0.lock().unwrap();
      if inner.closed {
        return;
      }
      inner.closed = true;
      inner.current.take()
    };
    if let Some(mut current) = current {
      current.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap().closed }
}
