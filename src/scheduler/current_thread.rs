use std::cell::RefCell;
use std::time::Instant;

use tracing::{debug, trace};

use crate::subscription::BoxSubscription;

use super::action::{wait_until, DiscardableAction};
use super::timed_queue::TimedQueue;
use super::Scheduler;

thread_local! {
  /// The calling thread's trampoline queue; `Some` while a drainer is active.
  static TRAMPOLINE: RefCell<Option<TimedQueue>> = RefCell::new(None);
}

/// Trampoline scheduler over the calling thread.
///
/// The first schedule on a thread installs a queue and drains it to empty —
/// popping the earliest action, sleeping until its due time, running it —
/// before returning. A schedule issued from inside a running action (the
/// nested case) only enqueues and returns; the active drainer picks it up.
/// Recursive scheduling thus flattens into a loop instead of growing the
/// stack.
#[derive(Clone, Copy, Default)]
pub struct CurrentThreadScheduler;

impl CurrentThreadScheduler {
  pub fn new() -> Self { Self }

  /// True when no drain is active on the calling thread, i.e. the next
  /// schedule here would install the trampoline itself.
  pub fn is_scheduling_required() -> bool {
    TRAMPOLINE.with(|slot| slot.borrow().is_none())
  }
}

/// Clears the thread's queue slot on every exit path, so an action panic
/// cannot poison later schedules on this thread.
struct SlotReset;

impl Drop for SlotReset {
  fn drop(&mut self) {
    TRAMPOLINE.with(|slot| slot.borrow_mut().take());
    debug!("current-thread drain ended");
  }
}

fn drain() {
  let _reset = SlotReset;
  loop {
    // The slot is only borrowed around the pop; actions run with it free so
    // they can enqueue more work.
    let next = TRAMPOLINE.with(|slot| slot.borrow_mut().as_mut().and_then(TimedQueue::pop));
    let Some(timed) = next else { break };
    wait_until(timed.due);
    trace!("current-thread dispatch");
    timed.action.run();
  }
}

impl Scheduler for CurrentThreadScheduler {
  fn now(&self) -> Instant { Instant::now() }

  fn schedule_absolute<F>(&self, due: Option<Instant>, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    let action = DiscardableAction::new(action);
    let handle = action.clone();
    let due = due.unwrap_or_else(Instant::now);

    let nested = TRAMPOLINE.with(|slot| {
      let mut slot = slot.borrow_mut();
      match slot.as_mut() {
        Some(queue) => {
          queue.push(due, action);
          true
        }
        None => {
          let mut queue = TimedQueue::new();
          queue.push(due, action);
          *slot = Some(queue);
          false
        }
      }
    });

    if !nested {
      debug!("current-thread drain started");
      drain();
    }
    Box::new(handle)
  }
}
