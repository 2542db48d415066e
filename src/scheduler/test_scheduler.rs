use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::subscription::BoxSubscription;

use super::action::DiscardableAction;
use super::timed_queue::TimedQueue;
use super::Scheduler;

struct TestCore {
  queue: TimedQueue,
  offset: Duration,
}

/// Virtual-time scheduler for deterministic tests.
///
/// Scheduling only enqueues; nothing runs until the test advances time.
/// `now` reports the scheduler's epoch (fixed at construction) plus the
/// virtual offset, so virtual time neither reads nor leaks into the wall
/// clock. Actions due at the same instant run in scheduling order, which
/// makes repeated runs of the same program execute identically.
///
/// Clones share the queue and the clock.
#[derive(Clone)]
pub struct TestScheduler {
  epoch: Instant,
  core: Arc<Mutex<TestCore>>,
}

impl Default for TestScheduler {
  fn default() -> Self { Self::new() }
}

impl TestScheduler {
  pub fn new() -> Self {
    Self {
      epoch: Instant::now(),
      core: Arc::new(Mutex::new(TestCore { queue: TimedQueue::new(), offset: Duration::ZERO })),
    }
  }

  /// Current virtual time, as the offset from the scheduler's epoch.
  pub fn elapsed(&self) -> Duration { self.core.lock().unwrap().offset }

  pub fn is_empty(&self) -> bool { self.core.lock().unwrap().queue.is_empty() }

  pub fn pending_count(&self) -> usize { self.core.lock().unwrap().queue.len() }

  /// Advance virtual time to `t`, running every action due on the way in
  /// `(due, insertion)` order.
  ///
  /// The clock reads each action's due time while that action runs, and `t`
  /// once the drain has finished. Work an action schedules within the bound
  /// is drained in the same call.
  pub fn advance_time_to(&self, t: Duration) {
    let limit = self.epoch + t;
    loop {
      let due_action = {
        let mut core = self.core.lock().unwrap();
        match core.queue.peek_due() {
          Some(due) if due <= limit => {
            // The clock moves before the action observes it; it never moves
            // backwards for work that was scheduled in the past.
            let due_offset = due.saturating_duration_since(self.epoch);
            core.offset = core.offset.max(due_offset);
            core.queue.pop()
          }
          _ => None,
        }
      };
      // The lock is released while the action runs so it can schedule more.
      match due_action {
        Some(timed) => {
          trace!("virtual dispatch");
          timed.action.run();
        }
        None => break,
      }
    }
    let mut core = self.core.lock().unwrap();
    core.offset = core.offset.max(t);
  }

  /// Advance virtual time by `delta`. See [`advance_time_to`].
  ///
  /// [`advance_time_to`]: TestScheduler::advance_time_to
  pub fn advance_time_by(&self, delta: Duration) {
    let target = self.elapsed() + delta;
    self.advance_time_to(target);
  }

  /// Run actions due at or before `until` without otherwise moving the
  /// clock.
  pub fn trigger_actions(&self, until: Duration) {
    let limit = self.epoch + until;
    loop {
      let due_action = {
        let mut core = self.core.lock().unwrap();
        match core.queue.peek_due() {
          Some(due) if due <= limit => core.queue.pop(),
          _ => None,
        }
      };
      match due_action {
        Some(timed) => timed.action.run(),
        None => break,
      }
    }
  }

  /// Drain everything already due at the current virtual time.
  pub fn trigger_actions_until_now(&self) { self.trigger_actions(self.elapsed()) }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Instant { self.epoch + self.elapsed() }

  fn schedule_absolute<F>(&self, due: Option<Instant>, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    let action = DiscardableAction::new(action);
    let handle = action.clone();
    let mut core = self.core.lock().unwrap();
    let due = due.unwrap_or(self.epoch + core.offset);
    core.queue.push(due, action);
    Box::new(handle)
  }
}
