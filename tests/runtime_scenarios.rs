//! End-to-end scenarios across the observer adapters and the schedulers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rivulet::prelude::*;

fn secs(s: u64) -> Duration {
  Duration::from_secs(s)
}

#[test]
fn equal_due_times_run_in_scheduling_order() {
  let scheduler = TestScheduler::new();
  let epoch = scheduler.now();
  let log: Arc<Mutex<Vec<(char, u64)>>> = Arc::new(Mutex::new(Vec::new()));

  for (label, at) in [('a', 10), ('b', 10), ('c', 5)] {
    let c_log = log.clone();
    let c_scheduler = scheduler.clone();
    scheduler.schedule_absolute(Some(epoch + secs(at)), move || {
      c_log.lock().unwrap().push((label, c_scheduler.elapsed().as_secs()));
      subscription::empty()
    });
  }

  scheduler.advance_time_to(secs(20));
  assert_eq!(*log.lock().unwrap(), vec![('c', 5), ('a', 10), ('b', 10)]);
  assert_eq!(scheduler.elapsed(), secs(20));
}

#[test]
fn a_cancelled_action_never_runs_but_time_still_advances() {
  let scheduler = TestScheduler::new();
  let epoch = scheduler.now();
  let runs = Arc::new(AtomicUsize::new(0));

  let c_runs = runs.clone();
  let mut handle = scheduler.schedule_absolute(Some(epoch + secs(100)), move || {
    c_runs.fetch_add(1, Ordering::SeqCst);
    subscription::empty()
  });
  handle.unsubscribe();

  scheduler.advance_time_to(secs(200));
  assert_eq!(runs.load(Ordering::SeqCst), 0);
  assert_eq!(scheduler.elapsed(), secs(200));
}

#[test]
fn periodic_work_composes_with_inner_schedules() {
  let scheduler = TestScheduler::new();
  let periodic_at = Arc::new(Mutex::new(Vec::new()));
  let inner_at = Arc::new(Mutex::new(Vec::new()));

  let c_periodic = periodic_at.clone();
  let c_inner = inner_at.clone();
  let c_scheduler = scheduler.clone();
  scheduler.schedule_periodically(None, secs(10), move || {
    c_periodic.lock().unwrap().push(c_scheduler.elapsed().as_secs());
    let inner = c_inner.clone();
    let inner_scheduler = c_scheduler.clone();
    c_scheduler.schedule_relative(secs(3), move || {
      inner.lock().unwrap().push(inner_scheduler.elapsed().as_secs());
      subscription::empty()
    });
  });

  scheduler.advance_time_to(secs(35));
  assert_eq!(*periodic_at.lock().unwrap(), vec![0, 10, 20, 30]);
  assert_eq!(*inner_at.lock().unwrap(), vec![3, 13, 23, 33]);
}

#[test]
fn cancelling_an_endless_recursion_stops_it_within_one_step() {
  let scheduler = TestScheduler::new();
  let runs = Arc::new(AtomicUsize::new(0));
  let handle: Arc<Mutex<Option<BoxSubscription>>> = Arc::new(Mutex::new(None));

  let c_runs = runs.clone();
  let c_handle = handle.clone();
  let subscription = scheduler.schedule_recursive(move |reschedule| {
    if c_runs.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
      if let Some(handle) = c_handle.lock().unwrap().as_mut() {
        handle.unsubscribe();
      }
    }
    reschedule();
  });
  *handle.lock().unwrap() = Some(subscription);

  scheduler.advance_time_to(Duration::ZERO);
  assert!(runs.load(Ordering::SeqCst) <= 4);
  assert!(scheduler.is_empty());
}

/// Observer whose callbacks flag any overlapping delivery.
fn overlap_probe(
  count: &Arc<AtomicUsize>, in_flight: &Arc<AtomicBool>, overlapped: &Arc<AtomicBool>,
) -> impl Observer<Item = usize, Err = &'static str> + Clone + Send + 'static {
  let count = count.clone();
  let in_flight = in_flight.clone();
  let overlapped = overlapped.clone();
  observer::create(
    move |_: usize| {
      if in_flight.swap(true, Ordering::SeqCst) {
        overlapped.store(true, Ordering::SeqCst);
      }
      // Widen the race window so an overlap would actually be observed.
      std::hint::black_box(&count);
      thread::yield_now();
      count.fetch_add(1, Ordering::SeqCst);
      in_flight.store(false, Ordering::SeqCst);
    },
    |_| {},
    || {},
  )
}

#[test]
fn synchronized_observer_excludes_concurrent_producers() {
  let count = Arc::new(AtomicUsize::new(0));
  let in_flight = Arc::new(AtomicBool::new(false));
  let overlapped = Arc::new(AtomicBool::new(false));
  let observer = SynchronizedObserver::new(overlap_probe(&count, &in_flight, &overlapped));

  let producers: Vec<_> = (0..4)
    .map(|_| {
      let mut observer = observer.clone();
      thread::spawn(move || {
        for i in 0..50 {
          observer.next(i);
        }
      })
    })
    .collect();
  for producer in producers {
    producer.join().unwrap();
  }

  assert!(!overlapped.load(Ordering::SeqCst));
  assert_eq!(count.load(Ordering::SeqCst), 200);
}

#[test]
fn async_lock_observer_serializes_and_stays_terminal_final() {
  let count = Arc::new(AtomicUsize::new(0));
  let in_flight = Arc::new(AtomicBool::new(false));
  let overlapped = Arc::new(AtomicBool::new(false));
  let completions = Arc::new(AtomicUsize::new(0));

  let c_completions = completions.clone();
  let probe = overlap_probe(&count, &in_flight, &overlapped);
  let observer = AsyncLockObserver::new(observer::create(
    {
      let mut probe = probe;
      move |v| probe.next(v)
    },
    |_: &'static str| {},
    move || {
      c_completions.fetch_add(1, Ordering::SeqCst);
    },
  ));

  let producers: Vec<_> = (0..4)
    .map(|id| {
      let mut observer = observer.clone();
      thread::spawn(move || {
        for i in 0..50 {
          observer.next(i);
          if id == 0 && i == 25 {
            observer.complete();
          }
        }
      })
    })
    .collect();
  for producer in producers {
    producer.join().unwrap();
  }

  assert!(!overlapped.load(Ordering::SeqCst));
  assert_eq!(completions.load(Ordering::SeqCst), 1);

  // Terminal already delivered: nothing further gets through.
  let before = count.load(Ordering::SeqCst);
  let mut observer = observer.clone();
  observer.next(99);
  observer.complete();
  assert_eq!(count.load(Ordering::SeqCst), before);
  assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn overrunning_periodic_iterations_do_not_double_fire() {
  let scheduler = NewThreadScheduler::new();
  let started = Instant::now();
  let fired: Arc<Mutex<Vec<u128>>> = Arc::new(Mutex::new(Vec::new()));

  let c_fired = fired.clone();
  let mut handle =
    scheduler.schedule_periodically(None, Duration::from_millis(200), move || {
      let at = started.elapsed().as_millis();
      let overrun = {
        let mut fired = c_fired.lock().unwrap();
        fired.push(at);
        fired.len() == 1
      };
      if overrun {
        thread::sleep(Duration::from_millis(500));
      }
    });

  thread::sleep(Duration::from_millis(1100));
  handle.unsubscribe();
  let fired = fired.lock().unwrap().clone();

  assert!(fired.len() >= 3, "expected at least three iterations, got {fired:?}");
  // The first iteration overran its period by ~300ms; the second fires as
  // soon as it ends instead of waiting out another period...
  assert!(fired[1] >= 450 && fired[1] < 680, "no immediate refire: {fired:?}");
  // ...and exactly once: the third lands a full period later, not sooner.
  assert!(fired[2] >= fired[1] + 150, "doubled-up iteration: {fired:?}");
}

#[test]
fn base_then_checked_compose_as_one_contract() {
  let delivered = Arc::new(Mutex::new(Vec::new()));
  let c_delivered = delivered.clone();
  let mut observer = observer::create(
    move |v: i32| c_delivered.lock().unwrap().push(format!("next({v})")),
    {
      let delivered = delivered.clone();
      move |err: &'static str| delivered.lock().unwrap().push(format!("error({err})"))
    },
    {
      let delivered = delivered.clone();
      move || delivered.lock().unwrap().push("complete".into())
    },
  )
  .base();

  observer.next(1);
  observer.complete();
  observer.next(2);
  observer.error("late");
  assert_eq!(*delivered.lock().unwrap(), vec!["next(1)", "complete"]);

  // A checked wrapper layered on top sees the chain as stopped, while the
  // base layer keeps dropping deliveries silently.
  let mut checked = observer.checked();
  assert!(checked.is_stopped());
  assert_eq!(checked.try_next(3), Ok(()));
  assert_eq!(*delivered.lock().unwrap(), vec!["next(1)", "complete"]);
}

#[test]
fn event_loop_delays_are_cooperative_and_time_ordered() {
  let scheduler = EventLoopScheduler::new();
  let (sender, receiver) = std::sync::mpsc::channel();

  let c_sender = sender.clone();
  scheduler.schedule_relative(Duration::from_millis(40), move || {
    c_sender.send("slow").unwrap();
    subscription::empty()
  });
  scheduler.schedule(move || {
    sender.send("fast").unwrap();
    subscription::empty()
  });

  let first = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
  let second = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
  assert_eq!((first, second), ("fast", "slow"));
}
