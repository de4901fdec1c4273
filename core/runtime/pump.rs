// Copyright 2018-2025 the Deno authors. MIT license.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Observable state of the loop pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
  /// Not started yet, or torn down.
  Unarmed,
  /// Waiting for the poll thread to report new events.
  Idle,
  /// Inside a single I/O loop iteration.
  Pumping,
}

/// Work that must run on the thread that owns the JS isolate.
pub(crate) trait MainThreadPump {
  fn pump_once(&self);
  fn idle_notification(&self);
}

thread_local! {
  static PUMPS: RefCell<HashMap<u64, Weak<dyn MainThreadPump>>> =
    RefCell::new(HashMap::new());
}

static NEXT_PUMP_ID: AtomicU64 = AtomicU64::new(1);

/// A `Send` reference to a pump living on the main thread.
///
/// Resolving the handle only succeeds on the thread that registered it, so
/// a task that wanders onto another thread cannot reach JS state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PumpHandle(u64);

impl PumpHandle {
  pub fn register(pump: Weak<dyn MainThreadPump>) -> Self {
    let id = NEXT_PUMP_ID.fetch_add(1, Ordering::Relaxed);
    PUMPS.with(|pumps| pumps.borrow_mut().insert(id, pump));
    PumpHandle(id)
  }

  pub fn unregister(self) {
    PUMPS.with(|pumps| pumps.borrow_mut().remove(&self.0));
  }

  /// Runs `f` against the pump. Returns `None` when called off the main
  /// thread or after the pump is gone.
  pub fn with<T>(self, f: impl FnOnce(&dyn MainThreadPump) -> T) -> Option<T> {
    // The registry borrow ends before `f` runs; `f` may resolve handles too.
    let pump = PUMPS.with(|pumps| {
      pumps.borrow().get(&self.0).and_then(Weak::upgrade)
    })?;
    Some(f(&*pump))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;
  use std::rc::Rc;

  #[derive(Default)]
  struct CountingPump {
    pumps: Cell<usize>,
  }

  impl MainThreadPump for CountingPump {
    fn pump_once(&self) {
      self.pumps.set(self.pumps.get() + 1);
    }

    fn idle_notification(&self) {}
  }

  #[test]
  fn resolves_on_owner_thread_only() {
    let pump = Rc::new(CountingPump::default());
    let weak: Weak<dyn MainThreadPump> = Rc::downgrade(&pump) as _;
    let handle = PumpHandle::register(weak);

    assert_eq!(handle.with(|p| p.pump_once()), Some(()));
    assert_eq!(pump.pumps.get(), 1);

    let resolved_elsewhere = std::thread::spawn(move || {
      handle.with(|p| p.pump_once()).is_some()
    })
    .join()
    .unwrap();
    assert!(!resolved_elsewhere);
    assert_eq!(pump.pumps.get(), 1);

    handle.unregister();
    assert!(handle.with(|p| p.pump_once()).is_none());
  }

  #[test]
  fn dropped_pump_does_not_resolve() {
    let pump = Rc::new(CountingPump::default());
    let weak: Weak<dyn MainThreadPump> = Rc::downgrade(&pump) as _;
    let handle = PumpHandle::register(weak);
    drop(pump);
    assert!(handle.with(|p| p.pump_once()).is_none());
    handle.unregister();
  }
}
