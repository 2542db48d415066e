use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use super::action::DiscardableAction;

/// An action paired with its due time and insertion rank.
pub struct TimedAction {
  pub due: Instant,
  seq: u64,
  pub action: DiscardableAction,
}

impl PartialEq for TimedAction {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl Eq for TimedAction {}

impl PartialOrd for TimedAction {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for TimedAction {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier due times first, then FIFO by insertion rank.
    other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
  }
}

/// Priority queue over `(due, insertion order)`.
///
/// The per-queue insertion counter breaks due-time ties deterministically:
/// actions scheduled at the same instant pop in the order they were pushed.
#[derive(Default)]
pub struct TimedQueue {
  heap: BinaryHeap<TimedAction>,
  next_seq: u64,
}

impl TimedQueue {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, due: Instant, action: DiscardableAction) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.heap.push(TimedAction { due, seq, action });
  }

  /// Due time of the next action, if any.
  pub fn peek_due(&self) -> Option<Instant> { self.heap.peek().map(|timed| timed.due) }

  pub fn pop(&mut self) -> Option<TimedAction> { self.heap.pop() }

  pub fn is_empty(&self) -> bool { self.heap.is_empty() }

  pub fn len(&self) -> usize { self.heap.len() }
}
