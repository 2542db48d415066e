use crate::cell::CellArc;
use crate::error::ProtocolViolation;
use crate::observer::Observer;

/// Per-observer notification state machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CheckState {
  Idle,
  Busy,
  Done,
}

/// Detects observer-contract violations.
///
/// Exactly one notification may be in progress at a time, and nothing may
/// follow a terminal. The fallible `try_*` methods report a violation as
/// [`ProtocolViolation`]; the [`Observer`] impl treats one as fatal and
/// panics with the same message. Either way the state advances to its
/// terminal `Done` before the failure propagates, so a broken chain cannot
/// be reused.
///
/// The underlying callback's own failure (a panic) propagates to the caller
/// after the state transition has run: `next` restores the observer to idle,
/// terminals advance it to done.
///
/// Clones share the state cell, which is what lets a downstream callback
/// re-enter through its own handle and be caught.
#[derive(Clone)]
pub struct CheckedObserver<O> {
  observer: O,
  state: CellArc<CheckState>,
}

/// Runs the "notification ended" transition on every exit path, including
/// unwinding out of the underlying callback. Never overwrites a `Done`
/// forced by a nested violation.
struct ExitGuard {
  state: CellArc<CheckState>,
  to: CheckState,
}

impl Drop for ExitGuard {
  fn drop(&mut self) {
    let _ = self.state.compare_exchange(CheckState::Busy, self.to);
  }
}

impl<O> CheckedObserver<O> {
  pub fn new(observer: O) -> Self {
    Self { observer, state: CellArc::from(CheckState::Idle) }
  }

  fn enter(&self) -> Result<(), ProtocolViolation> {
    match self.state.compare_exchange(CheckState::Idle, CheckState::Busy) {
      Ok(_) => Ok(()),
      Err(CheckState::Busy) => {
        self.state.set(CheckState::Done);
        Err(ProtocolViolation::Reentrancy)
      }
      Err(_) => Err(ProtocolViolation::AlreadyTerminated),
    }
  }
}

impl<O: Observer> CheckedObserver<O> {
  pub fn try_next(&mut self, value: O::Item) -> Result<(), ProtocolViolation> {
    self.enter()?;
    let _exit = ExitGuard { state: self.state.clone(), to: CheckState::Idle };
    self.observer.next(value);
    Ok(())
  }

  pub fn try_error(&mut self, err: O::Err) -> Result<(), ProtocolViolation> {
    self.enter()?;
    let _exit = ExitGuard { state: self.state.clone(), to: CheckState::Done };
    self.observer.error(err);
    Ok(())
  }

  pub fn try_complete(&mut self) -> Result<(), ProtocolViolation> {
    self.enter()?;
    let _exit = ExitGuard { state: self.state.clone(), to: CheckState::Done };
    self.observer.complete();
    Ok(())
  }
}

impl<O: Observer> Observer for CheckedObserver<O> {
  type Item = O::Item;
  type Err = O::Err;

  fn next(&mut self, value: Self::Item) {
    if let Err(violation) = self.try_next(value) {
      panic!("{violation}");
    }
  }

  fn error(&mut self, err: Self::Err) {
    if let Err(violation) = self.try_error(err) {
      panic!("{violation}");
    }
  }

  fn complete(&mut self) {
    if let Err(violation) = self.try_complete() {
      panic!("{violation}");
    }
  }

  fn is_stopped(&self) -> bool {
    self.state.get() == CheckState::Done || self.observer.is_stopped()
  }
}
