// Copyright 2018-2025 the Deno authors. MIT license.

//! The thread that blocks on the I/O loop's backend on behalf of the main
//! thread.
//!
//! The main thread cannot block in `uv_run` without starving the host
//! message loop, and cannot spin on `uv_run(NoWait)` without burning a
//! core. The poll thread does the blocking wait instead and hands control
//! back through the host loop's task queue:
//!
//! ```text
//! Poll thread                        Main thread
//! ───────────                        ───────────
//! wake.wait()                        pump_once()
//!                                      run(NoWait)
//!   ← resumed                          wake.post()
//! poll_events()                      ...host message loop runs...
//!   ← fd ready / async_send
//! post_task(pump_once) ────────────► pump_once()
//! wake.wait()                          ...
//! ```
//!
//! Two primitives drive the hand-off. The wake semaphore is how the main
//! thread lets the poll thread go; the I/O loop's own async handle is how
//! the main thread interrupts a poll that is already blocked in the
//! kernel.

use super::pump::PumpHandle;
use crate::event_loop::IoLoop;
use crate::tasks::HostLoop;
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Binary semaphore gating the poll thread. Dropping it destroys the
/// semaphore and releases a waiter for good.
pub(crate) struct WakeSemaphore {
  tx: mpsc::SyncSender<()>,
}

pub(crate) struct WakeWaiter {
  rx: mpsc::Receiver<()>,
}

/// Creates the wake semaphore with a count of zero.
pub(crate) fn wake_semaphore() -> (WakeSemaphore, WakeWaiter) {
  let (tx, rx) = mpsc::sync_channel(1);
  (WakeSemaphore { tx }, WakeWaiter { rx })
}

impl WakeSemaphore {
  pub fn post(&self) {
    // A full channel already holds the one outstanding post, and a
    // disconnected one means the poll thread is gone.
    let _ = self.tx.try_send(());
  }
}

impl WakeWaiter {
  /// Returns `false` once the semaphore has been destroyed.
  fn wait(&self) -> bool {
    self.rx.recv().is_ok()
  }
}

/// State the poll thread shares with the main thread.
pub(crate) struct LoopSignals {
  closed: AtomicBool,
  host: Mutex<Option<Arc<dyn HostLoop>>>,
  pump: PumpHandle,
}

impl LoopSignals {
  pub fn new(pump: PumpHandle) -> Self {
    Self {
      closed: AtomicBool::new(false),
      host: Mutex::new(None),
      pump,
    }
  }

  pub fn close(&self) {
    self.closed.store(true, Ordering::Release);
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  pub fn set_host(&self, host: Arc<dyn HostLoop>) {
    *self.host.lock() = Some(host);
  }

  pub fn host(&self) -> Option<Arc<dyn HostLoop>> {
    self.host.lock().clone()
  }

  pub fn clear_host(&self) {
    self.host.lock().take();
  }

  /// Posts a pump to the main thread's host loop.
  pub fn wakeup_main(&self) {
    let Some(host) = self.host() else {
      log::warn!("Poll thread woke up before the host loop was captured");
      return;
    };
    let pump = self.pump;
    host.post_task(Box::new(move || {
      if pump.with(|pump| pump.pump_once()).is_none() {
        log::warn!("Dropping pump task: not on the main thread or torn down");
      }
    }));
  }
}

pub(crate) struct PollThread {
  thread: Option<JoinHandle<()>>,
}

impl PollThread {
  pub fn spawn<L: IoLoop>(
    name: String,
    io_loop: Arc<L>,
    waiter: WakeWaiter,
    signals: Arc<LoopSignals>,
  ) -> std::io::Result<Self> {
    let thread = std::thread::Builder::new()
      .name(name)
      .spawn(move || poll_thread_main(&*io_loop, waiter, &signals))?;
    Ok(PollThread {
      thread: Some(thread),
    })
  }

  pub fn join(mut self) {
    if let Some(thread) = self.thread.take() {
      if thread.join().is_err() {
        log::error!("Poll thread panicked");
      }
    }
  }
}

fn poll_thread_main<L: IoLoop>(
  io_loop: &L,
  waiter: WakeWaiter,
  signals: &LoopSignals,
) {
  log::debug!("Poll thread started");
  loop {
    if signals.is_closed() {
      break;
    }

    // Wait for the main thread to finish its loop iteration.
    if !waiter.wait() || signals.is_closed() {
      break;
    }

    log::trace!("Poll thread blocking on I/O loop backend");
    io_loop.poll_events();

    // Teardown pokes the dummy handle to get here; nothing to pump.
    if signals.is_closed() {
      break;
    }

    signals.wakeup_main();
  }
  log::debug!("Poll thread exiting");
}
