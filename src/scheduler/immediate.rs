use std::time::Instant;

use crate::subscription::BoxSubscription;

use super::action::{wait_until, DiscardableAction};
use super::Scheduler;

/// Executes work inline on the calling thread.
///
/// A future due time blocks the caller until it arrives; there is no queue.
/// Recursive scheduling therefore runs on the caller's stack — use
/// [`CurrentThreadScheduler`](super::CurrentThreadScheduler) when depth
/// matters.
#[derive(Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
  pub fn new() -> Self { Self }
}

impl Scheduler for ImmediateScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule_absolute<F>(&self, due: Option<Instant>, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    let action = DiscardableAction::new(action);
    let handle = action.clone();
    if let Some(due) = due {
      wait_until(due);
    }
    action.run();
    Box::new(handle)
  }
}
