use std::thread;
use std::time::Instant;

use crate::cell::{CellArc, MutArc};
use crate::subscription::{BoxSubscription, MultiAssignSubscription, SubscriptionLike};

pub(crate) type ScheduledWork = Box<dyn FnOnce() -> BoxSubscription + Send>;

/// A scheduled unit of work that can be canceled before or during dispatch.
///
/// `run` wins or loses a single atomic swap on the `ready` flag: the action
/// runs at most once, and a cancel that lands first prevents it from ever
/// running. A cancel that lands after dispatch unsubscribes whatever inner
/// subscription the work returned; the race where the cancel arrives *while*
/// the work runs is settled by the inner slot — storing into an
/// already-closed [`MultiAssignSubscription`] unsubscribes the stored value
/// on the spot.
///
/// Clones share state; any clone serves as the cancel handle.
#[derive(Clone)]
pub struct DiscardableAction {
  ready: CellArc<bool>,
  work: MutArc<Option<ScheduledWork>>,
  inner: MultiAssignSubscription,
}

impl DiscardableAction {
  pub fn new(work: impl FnOnce() -> BoxSubscription + Send + 'static) -> Self {
    Self {
      ready: CellArc::from(true),
      work: MutArc::from(Some(Box::new(work) as ScheduledWork)),
      inner: MultiAssignSubscription::new(),
    }
  }

  /// Run the work if it is still ready. Subsequent calls are no-ops.
  pub fn run(&self) {
    if self.ready.compare_exchange(true, false).is_err() {
      return;
    }
    let work = self.work.rc_deref_mut().take();
    if let Some(work) = work {
      let subscription = work();
      self.inner.clone().set(subscription);
    }
  }
}

impl SubscriptionLike for DiscardableAction {
  fn unsubscribe(&mut self) {
    self.ready.set(false);
    // Drop the closure so its captures release even if the scheduler still
    // holds this action in a queue.
    self.work.rc_deref_mut().take();
    self.inner.unsubscribe();
  }

  fn is_closed(&self) -> bool { !self.ready.get() }
}

/// Block the calling thread until the due time has passed.
///
/// Schedulers that cannot delay dispatch themselves (immediate, trampoline,
/// thread-per-action) apply this in front of the action; the event loop uses
/// a cooperative timer instead.
pub(crate) fn wait_until(due: Instant) {
  let wait = due.saturating_duration_since(Instant::now());
  if !wait.is_zero() {
    thread::sleep(wait);
  }
}
