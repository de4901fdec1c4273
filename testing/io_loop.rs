// Copyright 2018-2025 the Deno authors. MIT license.

use parking_lot::Condvar;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;
use std::time::Instant;
use uv_bridge::AsyncHandleId;
use uv_bridge::IoLoop;
use uv_bridge::LoopCallback;
use uv_bridge::RunMode;
use uv_bridge::TimerId;

/// One call into the loop, in the order the loop saw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCall {
  Run { mode: RunMode, thread: ThreadId },
  Poll { thread: ThreadId },
}

impl LoopCall {
  pub fn thread(&self) -> ThreadId {
    match self {
      LoopCall::Run { thread, .. } | LoopCall::Poll { thread } => *thread,
    }
  }

  pub fn is_run(&self) -> bool {
    matches!(self, LoopCall::Run { .. })
  }
}

#[derive(Debug, Default, Clone)]
pub struct FakeLoopConfig {
  /// Number of `poll_events` calls that return at once, as if an fd were
  /// always ready.
  pub immediate_polls: usize,
  /// `run` reports no active handles from this iteration on.
  pub alive_until: Option<usize>,
  /// `uv_stop` is requested once this many posted events were dispatched.
  pub stop_after_events: Option<usize>,
}

struct AsyncEntry {
  callback: Option<LoopCallback>,
  pending: bool,
}

struct TimerEntry {
  deadline: Instant,
  repeat: Duration,
  callback: Option<LoopCallback>,
}

#[derive(Default)]
struct State {
  config: FakeLoopConfig,
  next_id: u64,
  asyncs: BTreeMap<u64, AsyncEntry>,
  timers: BTreeMap<u64, TimerEntry>,
  ready_events: usize,
  dispatched_events: usize,
  iterations: usize,
  stop_requested: bool,
  polling: bool,
  calls: Vec<LoopCall>,
}

impl State {
  fn next_id(&mut self) -> u64 {
    self.next_id += 1;
    self.next_id
  }

  fn has_ready_work(&self, now: Instant) -> bool {
    self.ready_events > 0
      || self.asyncs.values().any(|entry| entry.pending)
      || self.timers.values().any(|timer| timer.deadline <= now)
  }

  fn next_deadline(&self) -> Option<Instant> {
    self.timers.values().map(|timer| timer.deadline).min()
  }
}

/// An in-memory I/O loop.
///
/// `poll_events` blocks on a condition variable until an event is posted
/// with [`FakeIoLoop::post_event`], an async handle is poked or a timer is
/// due; `run` dispatches whatever is ready without blocking.
#[derive(Default)]
pub struct FakeIoLoop {
  state: Mutex<State>,
  changed: Condvar,
}

impl FakeIoLoop {
  pub fn new(config: FakeLoopConfig) -> Arc<Self> {
    Arc::new(FakeIoLoop {
      state: Mutex::new(State {
        config,
        ..Default::default()
      }),
      changed: Condvar::new(),
    })
  }

  /// Simulates an fd becoming ready.
  pub fn post_event(&self) {
    self.state.lock().ready_events += 1;
    self.changed.notify_all();
  }

  pub fn calls(&self) -> Vec<LoopCall> {
    self.state.lock().calls.clone()
  }

  pub fn run_count(&self) -> usize {
    self.calls().iter().filter(|call| call.is_run()).count()
  }

  pub fn poll_count(&self) -> usize {
    self.calls().iter().filter(|call| !call.is_run()).count()
  }

  pub fn dispatched_events(&self) -> usize {
    self.state.lock().dispatched_events
  }

  pub fn active_asyncs(&self) -> usize {
    self.state.lock().asyncs.len()
  }

  pub fn active_timers(&self) -> usize {
    self.state.lock().timers.len()
  }

  pub fn is_polling(&self) -> bool {
    self.state.lock().polling
  }

  /// Blocks until some thread sits in `poll_events`.
  pub fn wait_until_polling(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut state = self.state.lock();
    while !state.polling {
      if self.changed.wait_until(&mut state, deadline).timed_out() {
        return state.polling;
      }
    }
    true
  }

  fn take_due_callbacks(
    state: &mut State,
    now: Instant,
  ) -> Vec<(bool, u64, LoopCallback)> {
    let mut due = Vec::new();
    for (id, entry) in state.asyncs.iter_mut() {
      if entry.pending {
        entry.pending = false;
        if let Some(callback) = entry.callback.take() {
          due.push((true, *id, callback));
        }
      }
    }
    for (id, timer) in state.timers.iter_mut() {
      if timer.deadline <= now {
        if let Some(callback) = timer.callback.take() {
          due.push((false, *id, callback));
        }
      }
    }
    due
  }
}

impl IoLoop for FakeIoLoop {
  fn run(&self, mode: RunMode) -> bool {
    let now = Instant::now();
    let due = {
      let mut state = self.state.lock();
      state.calls.push(LoopCall::Run {
        mode,
        thread: std::thread::current().id(),
      });
      state.iterations += 1;
      state.dispatched_events += state.ready_events;
      state.ready_events = 0;
      if let Some(limit) = state.config.stop_after_events {
        if state.dispatched_events >= limit {
          state.stop_requested = true;
        }
      }
      Self::take_due_callbacks(&mut state, now)
    };

    // Callbacks may call back into the loop.
    let mut finished = Vec::with_capacity(due.len());
    for (is_async, id, mut callback) in due {
      callback();
      finished.push((is_async, id, callback));
    }

    let mut state = self.state.lock();
    for (is_async, id, callback) in finished {
      if is_async {
        if let Some(entry) = state.asyncs.get_mut(&id) {
          entry.callback = Some(callback);
        }
      } else {
        match state.timers.get(&id).map(|timer| timer.repeat) {
          Some(repeat) if repeat.is_zero() => {
            state.timers.remove(&id);
          }
          Some(repeat) => {
            if let Some(timer) = state.timers.get_mut(&id) {
              timer.deadline = now + repeat;
              timer.callback = Some(callback);
            }
          }
          // Stopped by its own callback.
          None => {}
        }
      }
    }

    match state.config.alive_until {
      Some(limit) => state.iterations < limit,
      None => !state.asyncs.is_empty() || !state.timers.is_empty(),
    }
  }

  fn stop_requested(&self) -> bool {
    self.state.lock().stop_requested
  }

  fn async_init(&self, callback: LoopCallback) -> AsyncHandleId {
    let mut state = self.state.lock();
    let id = state.next_id();
    state.asyncs.insert(
      id,
      AsyncEntry {
        callback: Some(callback),
        pending: false,
      },
    );
    AsyncHandleId(id)
  }

  fn async_send(&self, handle: AsyncHandleId) {
    if let Some(entry) = self.state.lock().asyncs.get_mut(&handle.0) {
      entry.pending = true;
    }
    self.changed.notify_all();
  }

  fn async_close(&self, handle: AsyncHandleId) {
    self.state.lock().asyncs.remove(&handle.0);
  }

  fn timer_start(
    &self,
    timeout: Duration,
    repeat: Duration,
    callback: LoopCallback,
  ) -> TimerId {
    let mut state = self.state.lock();
    let id = state.next_id();
    state.timers.insert(
      id,
      TimerEntry {
        deadline: Instant::now() + timeout,
        repeat,
        callback: Some(callback),
      },
    );
    drop(state);
    self.changed.notify_all();
    TimerId(id)
  }

  fn timer_stop(&self, timer: TimerId) {
    self.state.lock().timers.remove(&timer.0);
  }

  fn poll_events(&self) {
    let mut state = self.state.lock();
    state.calls.push(LoopCall::Poll {
      thread: std::thread::current().id(),
    });
    if state.config.immediate_polls > 0 {
      state.config.immediate_polls -= 1;
      return;
    }

    state.polling = true;
    self.changed.notify_all();
    while !state.has_ready_work(Instant::now()) {
      match state.next_deadline() {
        Some(deadline) => {
          self.changed.wait_until(&mut state, deadline);
        }
        None => self.changed.wait(&mut state),
      }
    }
    state.polling = false;
    self.changed.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn run_dispatches_poked_async() {
    let io = FakeIoLoop::new(FakeLoopConfig::default());
    let fired = Arc::new(Mutex::new(0));
    let counter = fired.clone();
    let handle = io.async_init(Box::new(move || *counter.lock() += 1));
    io.async_send(handle);
    io.poll_events();
    assert!(io.run(RunMode::NoWait));
    assert_eq!(*fired.lock(), 1);
    assert!(io.run(RunMode::NoWait));
    assert_eq!(*fired.lock(), 1);
    io.async_close(handle);
    assert!(!io.run(RunMode::NoWait));
  }

  #[test]
  fn poll_returns_when_event_posted() {
    let io = FakeIoLoop::new(FakeLoopConfig::default());
    let poller = {
      let io = io.clone();
      std::thread::spawn(move || io.poll_events())
    };
    assert!(io.wait_until_polling(Duration::from_secs(5)));
    io.post_event();
    poller.join().unwrap();
    assert!(!io.is_polling());
    io.run(RunMode::NoWait);
    assert_eq!(io.dispatched_events(), 1);
  }

  #[test]
  fn repeating_timer_rearms() {
    let io = FakeIoLoop::new(FakeLoopConfig::default());
    let fired = Arc::new(Mutex::new(0));
    let counter = fired.clone();
    let timer = io.timer_start(
      Duration::from_millis(1),
      Duration::from_millis(1),
      Box::new(move || *counter.lock() += 1),
    );
    for _ in 0..2 {
      io.poll_events();
      io.run(RunMode::NoWait);
    }
    assert_eq!(*fired.lock(), 2);
    assert_eq!(io.active_timers(), 1);
    io.timer_stop(timer);
    assert_eq!(io.active_timers(), 0);
  }
}
