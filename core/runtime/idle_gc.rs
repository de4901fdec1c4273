// Copyright 2018-2025 the Deno authors. MIT license.

use super::pump::PumpHandle;
use crate::event_loop::IoLoop;
use crate::event_loop::TimerId;
use std::time::Duration;

pub const DEFAULT_IDLE_GC_INTERVAL: Duration = Duration::from_millis(5000);

/// Repeating I/O loop timer that lets the engine collect garbage while the
/// browser process is idle.
pub(crate) struct IdleGcTicker {
  timer: TimerId,
}

impl IdleGcTicker {
  pub fn arm<L: IoLoop>(
    io_loop: &L,
    interval: Duration,
    pump: PumpHandle,
  ) -> Self {
    // Timer callbacks only run inside `run()`, i.e. on the main thread.
    let timer = io_loop.timer_start(
      interval,
      interval,
      Box::new(move || {
        pump.with(|pump| pump.idle_notification());
      }),
    );
    log::debug!("Idle GC armed every {interval:?}");
    IdleGcTicker { timer }
  }

  pub fn stop<L: IoLoop>(self, io_loop: &L) {
    io_loop.timer_stop(self.timer);
  }
}
