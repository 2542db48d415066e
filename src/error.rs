use thiserror::Error;

/// Fatal observer-contract violations raised by [`CheckedObserver`].
///
/// These indicate a bug in the producer, not a recoverable stream error: the
/// checked observer advances to its terminal state before reporting one, so
/// the broken chain cannot be reused.
///
/// [`CheckedObserver`]: crate::observer::CheckedObserver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
  /// A notification was delivered while another was still in progress on the
  /// same observer.
  #[error("reentrancy detected: a notification is already in progress")]
  Reentrancy,
  /// A notification was delivered after `complete` or `error`.
  #[error("observer already terminated")]
  AlreadyTerminated,
}
