// Copyright 2018-2025 the Deno authors. MIT license.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uv_bridge::tasks::set_current;
use uv_bridge::BindingsOptions;
use uv_bridge::CoreError;
use uv_bridge::NodeBindings;
use uv_bridge::PumpState;
use uv_bridge::Role;
use uv_bridge::RunMode;
use uv_bridge_testing::test_options;
use uv_bridge_testing::FakeIoLoop;
use uv_bridge_testing::FakeLoopConfig;
use uv_bridge_testing::FakeRuntime;
use uv_bridge_testing::Harness;
use uv_bridge_testing::LoopCall;
use uv_bridge_testing::RecordingHostLoop;

const BOUND: Duration = Duration::from_secs(10);

fn assert_alternating(calls: &[LoopCall]) {
  assert!(calls.first().is_some_and(|call| call.is_run()));
  for pair in calls.windows(2) {
    assert_ne!(pair[0].is_run(), pair[1].is_run(), "calls: {calls:?}");
  }
}

#[tokio::test]
async fn quits_when_handles_run_out() {
  let harness = Harness::new(
    Role::Renderer,
    FakeLoopConfig {
      immediate_polls: 4,
      alive_until: Some(5),
      ..Default::default()
    },
  );
  harness.start().unwrap();
  timeout(BOUND, harness.host.run())
    .await
    .expect("host loop quits");

  assert_eq!(harness.io.run_count(), 5);
  assert_eq!(harness.host.quit_requests(), 1);
  assert_eq!(harness.engine().enter_count(), 5);

  let (io, host) = harness.teardown();
  assert_eq!(io.run_count(), 5);
  assert_eq!(host.quit_requests(), 1);
  assert_alternating(&io.calls());
}

#[tokio::test]
async fn posted_event_wakes_main_thread_once() {
  let harness = Harness::new(
    Role::Renderer,
    FakeLoopConfig {
      stop_after_events: Some(1),
      ..Default::default()
    },
  );
  harness.start().unwrap();
  assert_eq!(harness.io.run_count(), 1);
  assert_eq!(harness.bindings.pump_state(), PumpState::Idle);

  let poster = {
    let io = harness.io.clone();
    std::thread::spawn(move || {
      assert!(io.wait_until_polling(BOUND));
      io.post_event();
    })
  };
  timeout(BOUND, harness.host.run())
    .await
    .expect("event is pumped");
  poster.join().unwrap();

  assert_eq!(harness.host.posted(), 1);
  assert_eq!(harness.io.run_count(), 2);
  assert_eq!(harness.io.dispatched_events(), 1);
  assert_eq!(harness.host.quit_requests(), 1);

  let (io, host) = harness.teardown();
  assert_eq!(host.posted(), 1);
  assert_eq!(io.run_count(), 2);
}

#[tokio::test]
async fn loop_calls_stay_on_their_threads() {
  let harness = Harness::new(
    Role::Renderer,
    FakeLoopConfig {
      immediate_polls: 3,
      alive_until: Some(4),
      ..Default::default()
    },
  );
  let main = std::thread::current().id();
  harness.start().unwrap();
  timeout(BOUND, harness.host.run())
    .await
    .expect("host loop quits");

  let (io, host) = harness.teardown();
  let calls = io.calls();
  assert_alternating(&calls);
  for call in calls.iter().filter(|call| call.is_run()) {
    assert_eq!(
      *call,
      LoopCall::Run {
        mode: RunMode::NoWait,
        thread: main,
      }
    );
  }
  let poll_threads: Vec<_> = calls
    .iter()
    .filter(|call| !call.is_run())
    .map(|call| call.thread())
    .collect();
  assert!(!poll_threads.is_empty());
  assert!(poll_threads.iter().all(|thread| *thread == poll_threads[0]));
  assert_ne!(poll_threads[0], main);
  assert!(host.task_threads().iter().all(|thread| *thread == main));
}

#[tokio::test]
async fn idle_gc_ticks_on_main_thread() {
  let harness = Harness::with_options(
    FakeLoopConfig::default(),
    BindingsOptions {
      idle_gc_interval: Duration::from_millis(10),
      ..test_options(Role::Browser)
    },
  );
  harness.start().unwrap();
  assert_eq!(harness.engine().idle_notifications(), 0);

  // The timer keeps the loop alive, so the host loop never quits.
  let _ = timeout(Duration::from_millis(300), harness.host.run()).await;

  assert!(harness.engine().idle_notifications() >= 2);
  assert_eq!(harness.host.quit_requests(), 0);
  let main = std::thread::current().id();
  assert!(harness.host.task_threads().iter().all(|thread| *thread == main));

  let (io, _host) = harness.teardown();
  assert_eq!(io.active_timers(), 0);
}

#[tokio::test]
async fn explicit_wakeup_interrupts_poll() {
  let harness = Harness::new(Role::Renderer, FakeLoopConfig::default());
  harness.start().unwrap();
  assert!(harness.io.wait_until_polling(BOUND));

  harness.bindings.wakeup_poll_thread();
  let _ = timeout(Duration::from_millis(200), harness.host.run()).await;

  assert_eq!(harness.host.posted(), 1);
  assert_eq!(harness.io.run_count(), 2);
}

#[test]
fn start_requires_prepare_and_environment() {
  let harness = Harness::new(Role::Renderer, FakeLoopConfig::default());
  assert!(matches!(harness.bindings.start(), Err(CoreError::NotPrepared)));

  harness.bindings.prepare().unwrap();
  assert!(matches!(
    harness.bindings.prepare(),
    Err(CoreError::AlreadyPrepared)
  ));
  assert!(matches!(
    harness.bindings.start(),
    Err(CoreError::NotInitialized)
  ));
  assert_eq!(harness.bindings.pump_state(), PumpState::Unarmed);

  harness.initialize().unwrap();
  harness.bindings.start().unwrap();
  assert!(matches!(
    harness.bindings.start(),
    Err(CoreError::AlreadyStarted)
  ));
  assert_eq!(harness.io.run_count(), 1);
}

#[test]
fn start_requires_current_host_loop() {
  let io = FakeIoLoop::new(FakeLoopConfig::default());
  let bindings =
    NodeBindings::new(FakeRuntime::new(), io.clone(), test_options(Role::Renderer));
  bindings
    .initialize(uv_bridge_testing::argv(&["/app/bin/app"]))
    .unwrap();
  bindings.prepare().unwrap();

  assert!(matches!(bindings.start(), Err(CoreError::NoHostLoop)));
  assert_eq!(io.run_count(), 0);
  drop(bindings);
  assert_eq!(io.active_asyncs(), 0);
}

#[test]
fn host_loop_is_captured_at_start() {
  let io = FakeIoLoop::new(FakeLoopConfig::default());
  let bindings =
    NodeBindings::new(FakeRuntime::new(), io.clone(), test_options(Role::Renderer));
  bindings
    .initialize(uv_bridge_testing::argv(&["/app/bin/app"]))
    .unwrap();
  bindings.prepare().unwrap();

  let host = RecordingHostLoop::new();
  {
    let _current = set_current(host.clone());
    bindings.start().unwrap();
  }
  // No longer current, but still the loop the bindings post to.
  assert!(uv_bridge::tasks::current().is_none());
  assert!(io.wait_until_polling(BOUND));
  io.post_event();

  let deadline = std::time::Instant::now() + BOUND;
  while host.posted() == 0 && std::time::Instant::now() < deadline {
    std::thread::sleep(Duration::from_millis(5));
  }
  assert_eq!(host.posted(), 1);
  drop(bindings);
  assert_eq!(Arc::strong_count(&host), 1);
}
