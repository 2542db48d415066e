//! Rivulet is a push-based reactive core: the observer protocol and its
//! enforcement adapters, and a scheduler framework that executes actions at
//! points in time, cancelably.
//!
//! The two halves meet in the contract the rest of a dataflow library builds
//! on: observers receive at most one terminal notification and never two
//! notifications at once, and every piece of scheduled work can be canceled
//! idempotently through the subscription it returned.

pub mod async_lock;
pub mod cell;
pub mod error;
pub mod observer;
pub mod scheduler;
pub mod subscription;

pub mod prelude {
  pub use crate::async_lock::AsyncLock;
  pub use crate::cell::{CellArc, MutArc};
  pub use crate::error::ProtocolViolation;
  pub use crate::observer;
  pub use crate::observer::{
    AsyncLockObserver, BaseObserver, CheckedObserver, Observer, ObserverExt,
    SynchronizedObserver,
  };
  pub use crate::scheduler::{
    CurrentThreadScheduler, DiscardableAction, EventLoopScheduler, ImmediateScheduler,
    NewThreadScheduler, Scheduler, TestScheduler,
  };
  pub use crate::subscription;
  pub use crate::subscription::{
    BoxSubscription, CompositeSubscription, MultiAssignSubscription, SubscriptionLike,
  };
}
