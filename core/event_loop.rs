// Copyright 2018-2025 the Deno authors. MIT license.

//! The slice of a libuv-style I/O loop that the bridge drives.
//!
//! The loop itself is owned by the embedded runtime. The bridge only ever
//! asks it to do two things from two different threads:
//!
//! ```text
//! Poll thread                        Main thread
//! ───────────                        ───────────
//!                                    run(NoWait)      // dispatch ready callbacks
//!   ← wake semaphore posted
//! poll_events()                      ...host message loop runs...
//!   ← fd ready / async_send
//! post pump task  ─────────────────► run(NoWait)
//! ```
//!
//! `poll_events` must be safe to call while the main thread is *not*
//! inside `run`; the bridge never lets the two overlap.

use std::time::Duration;

/// Run mode for the event loop, matching libuv's `uv_run_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum RunMode {
  /// Run the event loop until there are no more active handles/requests.
  Default = 0,
  /// Run a single iteration of the event loop.
  Once = 1,
  /// Run a single iteration without blocking for I/O.
  NoWait = 2,
}

/// An async wake handle registered on an [`IoLoop`] (`uv_async_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsyncHandleId(pub u64);

/// A timer registered on an [`IoLoop`] (`uv_timer_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Callback run on the main thread, from inside [`IoLoop::run`].
pub type LoopCallback = Box<dyn FnMut() + Send + 'static>;

pub trait IoLoop: Send + Sync + 'static {
  /// Runs the loop in `mode`. Returns `false` once no active handles or
  /// requests remain, `true` otherwise (`uv_run() != 0`).
  fn run(&self, mode: RunMode) -> bool;

  /// Whether `uv_stop` has been requested on this loop.
  fn stop_requested(&self) -> bool;

  /// Registers an async handle whose callback runs on the next iteration
  /// after [`IoLoop::async_send`]. The handle keeps the loop alive until
  /// it is closed.
  fn async_init(&self, callback: LoopCallback) -> AsyncHandleId;

  /// Pokes an async handle. Thread-safe; interrupts a blocking
  /// [`IoLoop::poll_events`].
  fn async_send(&self, handle: AsyncHandleId);

  /// Unregisters an async handle.
  fn async_close(&self, handle: AsyncHandleId);

  /// Starts a timer that first fires after `timeout`, then every `repeat`
  /// (a zero `repeat` makes it one-shot).
  fn timer_start(
    &self,
    timeout: Duration,
    repeat: Duration,
    callback: LoopCallback,
  ) -> TimerId;

  fn timer_stop(&self, timer: TimerId);

  /// Blocks on the loop's backend (epoll, kqueue, IOCP) until a watched fd
  /// is ready, a timer is due or an async handle is poked. Does not
  /// dispatch any callback.
  fn poll_events(&self);
}
