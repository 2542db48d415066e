use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::subscription::BoxSubscription;

use super::action::{wait_until, DiscardableAction};
use super::Scheduler;

/// Spawns a fresh worker thread for every scheduled action.
///
/// The worker sleeps until the due time, then runs the action. Cancellation
/// through the returned handle flips the action unready; the worker still
/// wakes but dispatches nothing.
#[derive(Clone, Copy, Default)]
pub struct NewThreadScheduler;

impl NewThreadScheduler {
  pub fn new() -> Self { Self }
}

impl Scheduler for NewThreadScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule_absolute<F>(&self, due: Option<Instant>, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    let action = DiscardableAction::new(action);
    let handle = action.clone();
    debug!("spawning worker thread");
    thread::Builder::new()
      .name("rivulet-worker".into())
      .spawn(move || {
        if let Some(due) = due {
          wait_until(due);
        }
        action.run();
      })
      .expect("failed to spawn scheduler worker thread");
    Box::new(handle)
  }
}
