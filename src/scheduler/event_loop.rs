use std::sync::Arc;
use std::time::Instant;

use futures::executor::ThreadPool;
use futures::future::RemoteHandle;
use futures::task::SpawnExt;
use futures::FutureExt;
use futures_timer::Delay;
use tracing::trace;

use crate::subscription::{BoxSubscription, CompositeSubscription, SubscriptionLike};

use super::action::DiscardableAction;
use super::Scheduler;

/// Handle to a task pending on the event loop.
///
/// Unsubscribing drops the inner [`RemoteHandle`], which removes the task
/// from the loop. A `SpawnHandle` dropped without unsubscribing forgets the
/// task instead, so the work still runs.
pub struct SpawnHandle(Option<RemoteHandle<()>>);

impl SpawnHandle {
  #[inline]
  pub fn new(handle: RemoteHandle<()>) -> Self { Self(Some(handle)) }
}

impl SubscriptionLike for SpawnHandle {
  #[inline]
  fn unsubscribe(&mut self) { self.0.take(); }

  #[inline]
  fn is_closed(&self) -> bool { self.0.is_none() }
}

impl Drop for SpawnHandle {
  fn drop(&mut self) {
    if let Some(handle) = self.0.take() {
      handle.forget();
    }
  }
}

/// Cooperative scheduler over one shared loop thread.
///
/// Actions run on a single-threaded executor; a future due time becomes a
/// cooperative timer on the loop, so a pending delay never blocks other
/// scheduled work from running. Clones share the loop.
#[derive(Clone)]
pub struct EventLoopScheduler {
  pool: Arc<ThreadPool>,
}

impl EventLoopScheduler {
  /// Start the loop's thread.
  pub fn new() -> Self {
    let pool = ThreadPool::builder()
      .pool_size(1)
      .name_prefix("rivulet-event-loop-")
      .create()
      .expect("failed to start event loop thread");
    Self { pool: Arc::new(pool) }
  }
}

impl Default for EventLoopScheduler {
  fn default() -> Self { Self::new() }
}

impl Scheduler for EventLoopScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule_absolute<F>(&self, due: Option<Instant>, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    let action = DiscardableAction::new(action);
    let delay = due
      .map(|due| due.saturating_duration_since(Instant::now()))
      .unwrap_or_default();

    let run = action.clone();
    let task = Delay::new(delay).map(move |_| {
      trace!("event loop dispatch");
      run.run();
    });
    let remote = self
      .pool
      .spawn_with_handle(task)
      .expect("failed to spawn task onto event loop");

    let mut subscription = CompositeSubscription::new();
    subscription.add(Box::new(action));
    subscription.add(Box::new(SpawnHandle::new(remote)));
    Box::new(subscription)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;
  use std::sync::{Arc, Mutex};
  use std::thread;
  use std::time::Duration;

  use super::*;
  use crate::subscription;

  #[test]
  fn delayed_actions_fire_in_time_order() {
    let scheduler = EventLoopScheduler::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (sender, receiver) = channel();

    for (delay, label) in [(60u64, "slow"), (20, "fast")] {
      let seen = seen.clone();
      let sender = sender.clone();
      scheduler.schedule_relative(Duration::from_millis(delay), move || {
        seen.lock().unwrap().push(label);
        sender.send(()).unwrap();
        subscription::empty()
      });
    }

    receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["fast", "slow"]);
  }

  #[test]
  fn pending_delays_do_not_block_the_loop() {
    let scheduler = EventLoopScheduler::new();
    let (sender, receiver) = channel();

    scheduler.schedule_relative(Duration::from_secs(30), subscription::empty);
    scheduler.schedule(move || {
      sender.send(()).unwrap();
      subscription::empty()
    });

    // The long delay above is cooperative, so this resolves promptly.
    receiver.recv_timeout(Duration::from_secs(5)).unwrap();
  }

  #[test]
  fn unsubscribe_removes_the_pending_task() {
    let scheduler = EventLoopScheduler::new();
    let runs = Arc::new(Mutex::new(0));

    let c_runs = runs.clone();
    let mut handle = scheduler.schedule_relative(Duration::from_millis(50), move || {
      *c_runs.lock().unwrap() += 1;
      subscription::empty()
    });
    handle.unsubscribe();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(*runs.lock().unwrap(), 0);
  }
}
