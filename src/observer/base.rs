use crate::cell::CellArc;
use crate::observer::Observer;

/// Makes termination final.
///
/// The first `error` or `complete` wins an atomic swap on the `stopped` flag
/// and is delivered; everything after it is silently dropped. `next` reads
/// the flag without synchronizing against the swap, so a terminal racing in
/// from another thread may let one in-flight `next` through — any `next`
/// that observed `stopped == false` was ordered before the terminal.
///
/// Clones share the flag, so a producer fanned out across threads still gets
/// exactly one terminal.
#[derive(Clone)]
pub struct BaseObserver<O> {
  observer: O,
  stopped: CellArc<bool>,
}

impl<O> BaseObserver<O> {
  pub fn new(observer: O) -> Self {
    Self { observer, stopped: CellArc::from(false) }
  }
}

impl<O: Observer> Observer for BaseObserver<O> {
  type Item = O::Item;
  type Err = O::Err;

  fn next(&mut self, value: Self::Item) {
    if !self.stopped.get() {
      self.observer.next(value);
    }
  }

  fn error(&mut self, err: Self::Err) {
    if self.stopped.compare_exchange(false, true).is_ok() {
      self.observer.error(err);
    }
  }

  fn complete(&mut self) {
    if self.stopped.compare_exchange(false, true).is_ok() {
      self.observer.complete();
    }
  }

  fn is_stopped(&self) -> bool { self.stopped.get() }
}
