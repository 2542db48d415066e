//! Execute an action at a point in time, cancelably.
//!
//! A scheduler supplies two primitives — its reading of the clock and
//! absolute-time scheduling — and this module derives the rest: relative
//! delays, recursive rescheduling, and periodic execution. Five flavors
//! cover the execution models:
//!
//! - [`ImmediateScheduler`]: inline on the caller, blocking sleeps.
//! - [`CurrentThreadScheduler`]: per-thread trampoline queue.
//! - [`NewThreadScheduler`]: one worker thread per action.
//! - [`EventLoopScheduler`]: shared single-threaded loop, cooperative sleeps.
//! - [`TestScheduler`]: virtual time under explicit test control.
//!
//! Every scheduling operation returns a [`BoxSubscription`]; canceling it
//! prevents dispatch when the action has not started and releases the
//! action's inner work when it has.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cell::CellArc;
use crate::subscription::{
  self, BoxSubscription, CompositeSubscription, MultiAssignSubscription, SubscriptionLike,
};

mod action;
mod current_thread;
mod event_loop;
mod immediate;
mod new_thread;
mod test_scheduler;
mod timed_queue;

pub use action::DiscardableAction;
pub use current_thread::CurrentThreadScheduler;
pub use event_loop::{EventLoopScheduler, SpawnHandle};
pub use immediate::ImmediateScheduler;
pub use new_thread::NewThreadScheduler;
pub use test_scheduler::TestScheduler;
pub use timed_queue::{TimedAction, TimedQueue};

/// An execution context that runs actions at points in time.
///
/// Implementors provide `now` and `schedule_absolute`; everything else is
/// derived. Schedulers are cheap handles — clones address the same
/// underlying queue, loop, or clock.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// This scheduler's reading of the clock.
  ///
  /// The reading is per-scheduler: a [`TestScheduler`] reports virtual time
  /// here without consulting the wall clock.
  fn now(&self) -> Instant;

  /// Schedule `action` to run at `due`, or immediately when `due` is absent.
  ///
  /// The action returns the subscription for whatever work it starts, which
  /// the returned handle cancels after dispatch.
  fn schedule_absolute<F>(&self, due: Option<Instant>, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static;

  /// Schedule `action` to run as soon as the scheduler is able.
  fn schedule<F>(&self, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    self.schedule_absolute(None, action)
  }

  /// Schedule `action` to run `delay` from now.
  fn schedule_relative<F>(&self, delay: Duration, action: F) -> BoxSubscription
  where
    F: FnOnce() -> BoxSubscription + Send + 'static,
  {
    self.schedule_absolute(Some(self.now() + delay), action)
  }

  /// Schedule `cont`, handing it a thunk that requests one more run.
  ///
  /// At most one instance of the continuation is scheduled at a time, and
  /// canceling the returned subscription halts the recursion within one
  /// step. On a trampoline scheduler the re-runs flatten into the active
  /// drain, so recursion depth stays bounded.
  fn schedule_recursive<F>(&self, cont: F) -> BoxSubscription
  where
    F: FnMut(&mut dyn FnMut()) + Send + 'static,
    Self: Sized,
  {
    schedule_recursive(self, cont)
  }

  /// Run `action` every `period`, starting after `initial_delay` (or
  /// immediately).
  ///
  /// The period is measured from each iteration's start: an iteration that
  /// overruns schedules the next one immediately, but iterations are never
  /// doubled up to catch up. The returned subscription cancels the latest
  /// scheduled iteration and prevents any future ones.
  fn schedule_periodically<F>(
    &self, initial_delay: Option<Duration>, period: Duration, action: F,
  ) -> BoxSubscription
  where
    F: FnMut() + Send + 'static,
    Self: Sized,
  {
    schedule_periodically(self, initial_delay, period, action)
  }
}

struct RecursiveState<S, F> {
  scheduler: S,
  cont: Mutex<F>,
  parent: CompositeSubscription,
  child: MultiAssignSubscription,
}

fn schedule_recursive<S, F>(scheduler: &S, cont: F) -> BoxSubscription
where
  S: Scheduler,
  F: FnMut(&mut dyn FnMut()) + Send + 'static,
{
  let mut parent = CompositeSubscription::new();
  let child = MultiAssignSubscription::new();
  parent.add(Box::new(child.clone()));

  let state = Arc::new(RecursiveState {
    scheduler: scheduler.clone(),
    cont: Mutex::new(cont),
    parent: parent.clone(),
    child,
  });
  let step_state = state.clone();
  let first = scheduler.schedule(move || recursive_step(step_state));
  parent.add(first);
  Box::new(parent)
}

fn recursive_step<S, F>(state: Arc<RecursiveState<S, F>>) -> BoxSubscription
where
  S: Scheduler,
  F: FnMut(&mut dyn FnMut()) + Send + 'static,
{
  if state.parent.is_closed() {
    return subscription::empty();
  }
  let mut again = false;
  (*state.cont.lock().unwrap())(&mut || again = true);
  if again && !state.parent.is_closed() {
    // Pre-register the next step in the child slot before handing it to the
    // scheduler, so a cancel can never slip between scheduling and tracking.
    let step_state = state.clone();
    let next = DiscardableAction::new(move || recursive_step(step_state));
    state.child.clone().set(Box::new(next.clone()));
    state.scheduler.schedule(move || {
      next.run();
      subscription::empty()
    });
  }
  subscription::empty()
}

struct PeriodicState<S, F> {
  scheduler: S,
  period: Duration,
  action: Mutex<F>,
  completed: CellArc<bool>,
  child: MultiAssignSubscription,
}

/// Cancels the latest scheduled iteration and bars future ones.
struct PeriodicHandle {
  completed: CellArc<bool>,
  child: MultiAssignSubscription,
}

impl SubscriptionLike for PeriodicHandle {
  fn unsubscribe(&mut self) {
    self.completed.set(true);
    self.child.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.completed.get() }
}

fn schedule_periodically<S, F>(
  scheduler: &S, initial_delay: Option<Duration>, period: Duration, action: F,
) -> BoxSubscription
where
  S: Scheduler,
  F: FnMut() + Send + 'static,
{
  let completed = CellArc::from(false);
  let child = MultiAssignSubscription::new();
  let state = Arc::new(PeriodicState {
    scheduler: scheduler.clone(),
    period,
    action: Mutex::new(action),
    completed: completed.clone(),
    child: child.clone(),
  });

  let tick_state = state.clone();
  let first = DiscardableAction::new(move || periodic_tick(tick_state));
  child.clone().set(Box::new(first.clone()));
  scheduler.schedule_relative(initial_delay.unwrap_or(Duration::ZERO), move || {
    first.run();
    subscription::empty()
  });
  Box::new(PeriodicHandle { completed, child })
}

fn periodic_tick<S, F>(state: Arc<PeriodicState<S, F>>) -> BoxSubscription
where
  S: Scheduler,
  F: FnMut() + Send + 'static,
{
  if state.completed.get() {
    return subscription::empty();
  }
  let started_at = state.scheduler.now();
  (*state.action.lock().unwrap())();
  if state.completed.get() {
    return subscription::empty();
  }

  // Period is measured from iteration start; an overrun makes the next
  // iteration due immediately, with no catch-up multiplication.
  let elapsed = state.scheduler.now().saturating_duration_since(started_at);
  let delay = state.period.saturating_sub(elapsed);

  let tick_state = state.clone();
  let next = DiscardableAction::new(move || periodic_tick(tick_state));
  state.child.clone().set(Box::new(next.clone()));
  state.scheduler.schedule_relative(delay, move || {
    next.run();
    subscription::empty()
  });
  subscription::empty()
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  use super::*;

  #[test]
  fn relative_is_absolute_from_now() {
    let scheduler = TestScheduler::new();
    scheduler.advance_time_to(Duration::from_secs(2));

    let fired_at = Arc::new(Mutex::new(None));
    let c_fired = fired_at.clone();
    let c_scheduler = scheduler.clone();
    scheduler.schedule_relative(Duration::from_secs(3), move || {
      *c_fired.lock().unwrap() = Some(c_scheduler.elapsed());
      subscription::empty()
    });

    scheduler.advance_time_to(Duration::from_secs(10));
    assert_eq!(*fired_at.lock().unwrap(), Some(Duration::from_secs(5)));
  }

  #[test]
  fn recursive_runs_until_the_continuation_stops_asking() {
    let scheduler = TestScheduler::new();
    let runs = Arc::new(Mutex::new(0));
    let c_runs = runs.clone();
    scheduler.schedule_recursive(move |reschedule| {
      let mut runs = c_runs.lock().unwrap();
      *runs += 1;
      if *runs < 5 {
        reschedule();
      }
    });

    scheduler.advance_time_to(Duration::ZERO);
    assert_eq!(*runs.lock().unwrap(), 5);
    assert!(scheduler.is_empty());
  }

  #[test]
  fn cancelling_recursion_halts_within_one_step() {
    let scheduler = TestScheduler::new();
    let runs = Arc::new(Mutex::new(0));
    let handle: Arc<Mutex<Option<BoxSubscription>>> = Arc::new(Mutex::new(None));

    let c_runs = runs.clone();
    let c_handle = handle.clone();
    let subscription = scheduler.schedule_recursive(move |reschedule| {
      let mut runs = c_runs.lock().unwrap();
      *runs += 1;
      if *runs == 3 {
        if let Some(handle) = c_handle.lock().unwrap().as_mut() {
          handle.unsubscribe();
        }
      }
      reschedule();
    });
    *handle.lock().unwrap() = Some(subscription);

    scheduler.advance_time_to(Duration::ZERO);
    assert!(*runs.lock().unwrap() <= 4);
    assert!(scheduler.is_empty());
  }

  #[test]
  fn periodic_fires_on_the_period_grid() {
    let scheduler = TestScheduler::new();
    let fired = Arc::new(Mutex::new(Vec::new()));
    let c_fired = fired.clone();
    let c_scheduler = scheduler.clone();
    scheduler.schedule_periodically(None, Duration::from_secs(10), move || {
      c_fired.lock().unwrap().push(c_scheduler.elapsed());
    });

    scheduler.advance_time_to(Duration::from_secs(35));
    let secs: Vec<u64> = fired.lock().unwrap().iter().map(|d| d.as_secs()).collect();
    assert_eq!(secs, vec![0, 10, 20, 30]);
  }

  #[test]
  fn periodic_honors_the_initial_delay_and_cancel() {
    let scheduler = TestScheduler::new();
    let fired = Arc::new(Mutex::new(Vec::new()));
    let c_fired = fired.clone();
    let c_scheduler = scheduler.clone();
    let mut subscription = scheduler.schedule_periodically(
      Some(Duration::from_secs(5)),
      Duration::from_secs(10),
      move || c_fired.lock().unwrap().push(c_scheduler.elapsed().as_secs()),
    );

    scheduler.advance_time_to(Duration::from_secs(20));
    assert_eq!(*fired.lock().unwrap(), vec![5, 15]);

    subscription.unsubscribe();
    scheduler.advance_time_to(Duration::from_secs(60));
    assert_eq!(*fired.lock().unwrap(), vec![5, 15]);
    assert!(scheduler.is_empty());
  }
}
