// Copyright 2018-2025 the Deno authors. MIT license.

use pretty_assertions::assert_eq;
use std::time::Duration;
use std::time::Instant;
use uv_bridge::PumpState;
use uv_bridge::Role;
use uv_bridge_testing::FakeLoopConfig;
use uv_bridge_testing::Harness;

const BOUND: Duration = Duration::from_secs(10);

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + BOUND;
  while !done() {
    if Instant::now() >= deadline {
      return false;
    }
    std::thread::sleep(Duration::from_millis(2));
  }
  true
}

#[test]
fn teardown_during_poll_posts_nothing() {
  let harness = Harness::new(Role::Renderer, FakeLoopConfig::default());
  harness.start().unwrap();
  assert!(harness.io.wait_until_polling(BOUND));
  assert!(!harness.bindings.is_closed());

  let (io, host) = harness.teardown();

  assert!(!io.is_polling());
  assert_eq!(io.poll_count(), 1);
  assert_eq!(io.run_count(), 1);
  assert_eq!(host.posted(), 0);
  assert_eq!(host.pending_tasks(), 0);
  assert_eq!(io.active_asyncs(), 0);
}

#[test]
fn queued_pump_runs_during_teardown() {
  let harness = Harness::new(
    Role::Renderer,
    FakeLoopConfig {
      immediate_polls: 1,
      ..Default::default()
    },
  );
  harness.start().unwrap();
  // The poll thread reported events, but the host loop is not running.
  assert!(wait_for(|| harness.host.posted() == 1));
  assert_eq!(harness.host.pending_tasks(), 1);
  assert_eq!(harness.bindings.pump_state(), PumpState::Idle);

  let (io, host) = harness.teardown();

  assert_eq!(host.pending_tasks(), 0);
  assert_eq!(host.posted(), 1);
  assert_eq!(io.run_count(), 2);
  assert_eq!(io.active_asyncs(), 0);
}

#[test]
fn teardown_before_prepare() {
  let harness = Harness::new(Role::Browser, FakeLoopConfig::default());
  harness.initialize().unwrap();
  assert_eq!(harness.io.active_timers(), 1);

  let (io, host) = harness.teardown();

  assert!(io.calls().is_empty());
  assert_eq!(io.active_timers(), 0);
  assert_eq!(host.posted(), 0);
}

#[test]
fn teardown_before_start_joins_poll_thread() {
  let harness = Harness::new(Role::Renderer, FakeLoopConfig::default());
  harness.initialize().unwrap();
  harness.bindings.prepare().unwrap();
  assert_eq!(harness.io.active_asyncs(), 1);

  let (io, host) = harness.teardown();

  // The poll thread never got the semaphore, so it never polled.
  assert_eq!(io.poll_count(), 0);
  assert_eq!(io.active_asyncs(), 0);
  assert_eq!(host.posted(), 0);
}

#[tokio::test]
async fn teardown_after_quit_is_clean() {
  let harness = Harness::new(
    Role::Browser,
    FakeLoopConfig {
      immediate_polls: 1,
      alive_until: Some(2),
      ..Default::default()
    },
  );
  harness.start().unwrap();
  tokio::time::timeout(BOUND, harness.host.run())
    .await
    .expect("host loop quits");

  let (io, host) = harness.teardown();

  assert_eq!(io.run_count(), 2);
  assert_eq!(host.quit_requests(), 1);
  assert_eq!(host.pending_tasks(), 0);
  assert_eq!(io.active_asyncs(), 0);
  assert_eq!(io.active_timers(), 0);
  assert!(!io.is_polling());
}
