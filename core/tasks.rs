// Copyright 2018-2025 the Deno authors. MIT license.

//! The host application's message loop, seen from the bridge.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Notify;

/// A unit of work posted to a host message loop.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A task-based run loop owned by the host application.
///
/// Tasks run on the thread that runs the loop, in the order they were
/// posted.
pub trait HostLoop: Send + Sync + 'static {
  /// Queues `task`. Callable from any thread.
  fn post_task(&self, task: Task);

  /// Asks the loop to return once it has no more queued tasks.
  fn quit_when_idle(&self);

  /// Runs queued tasks, including ones posted while running, until the
  /// queue is empty. Only called on the loop's own thread.
  fn run_until_idle(&self);
}

thread_local! {
  static CURRENT: RefCell<Option<Arc<dyn HostLoop>>> = const { RefCell::new(None) };
}

/// Returns the host loop registered for the calling thread, if any.
pub fn current() -> Option<Arc<dyn HostLoop>> {
  CURRENT.with(|current| current.borrow().clone())
}

/// Makes `host` the current loop of the calling thread until the returned
/// guard is dropped.
#[must_use = "the loop stops being current when the guard is dropped"]
pub fn set_current(host: Arc<dyn HostLoop>) -> CurrentHostLoopGuard {
  let previous = CURRENT.with(|current| current.borrow_mut().replace(host));
  CurrentHostLoopGuard {
    previous,
    _unsend_marker: PhantomData,
  }
}

pub struct CurrentHostLoopGuard {
  previous: Option<Arc<dyn HostLoop>>,
  // The guard restores a thread-local; it must be dropped where it was made.
  _unsend_marker: PhantomData<*const ()>,
}

impl Drop for CurrentHostLoopGuard {
  fn drop(&mut self) {
    let previous = self.previous.take();
    CURRENT.with(|current| *current.borrow_mut() = previous);
  }
}

/// A [`HostLoop`] driven from a tokio runtime.
///
/// [`TokioHostLoop::run`] is awaited on the main thread (typically inside a
/// current-thread runtime); any thread may post to it.
#[derive(Default)]
pub struct TokioHostLoop {
  tasks: Mutex<VecDeque<Task>>,
  quit_when_idle: AtomicBool,
  notify: Notify,
}

impl TokioHostLoop {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Number of tasks posted but not yet run.
  pub fn pending_tasks(&self) -> usize {
    self.tasks.lock().len()
  }

  /// Runs tasks as they are posted until [`HostLoop::quit_when_idle`] has
  /// been requested and the queue drains.
  pub async fn run(&self) {
    loop {
      self.run_until_idle();
      if self.quit_when_idle.load(Ordering::SeqCst)
        && self.tasks.lock().is_empty()
      {
        self.quit_when_idle.store(false, Ordering::SeqCst);
        return;
      }
      // A post between the check above and this await leaves a permit
      // behind, so the wakeup is not lost.
      self.notify.notified().await;
    }
  }

  fn pop(&self) -> Option<Task> {
    self.tasks.lock().pop_front()
  }
}

impl HostLoop for TokioHostLoop {
  fn post_task(&self, task: Task) {
    self.tasks.lock().push_back(task);
    self.notify.notify_one();
  }

  fn quit_when_idle(&self) {
    self.quit_when_idle.store(true, Ordering::SeqCst);
    self.notify.notify_one();
  }

  fn run_until_idle(&self) {
    // The lock is released before each task runs so tasks may post more.
    while let Some(task) = self.pop() {
      task();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  #[test]
  fn run_until_idle_runs_in_post_order() {
    let host = TokioHostLoop::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
      let order = order.clone();
      host.post_task(Box::new(move || order.lock().push(i)));
    }
    assert_eq!(host.pending_tasks(), 3);
    host.run_until_idle();
    assert_eq!(*order.lock(), vec![0, 1, 2]);
    assert_eq!(host.pending_tasks(), 0);
  }

  #[test]
  fn tasks_posted_while_running_also_run() {
    let host = TokioHostLoop::new();
    let count = Arc::new(AtomicUsize::new(0));
    let inner_host = host.clone();
    let inner_count = count.clone();
    host.post_task(Box::new(move || {
      inner_count.fetch_add(1, Ordering::SeqCst);
      let count = inner_count.clone();
      inner_host.post_task(Box::new(move || {
        count.fetch_add(1, Ordering::SeqCst);
      }));
    }));
    host.run_until_idle();
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn run_returns_once_quit_and_idle() {
    let host = TokioHostLoop::new();
    let count = Arc::new(AtomicUsize::new(0));
    let remote = host.clone();
    let remote_count = count.clone();
    let poster = std::thread::spawn(move || {
      std::thread::sleep(Duration::from_millis(20));
      let count = remote_count.clone();
      remote.post_task(Box::new(move || {
        count.fetch_add(1, Ordering::SeqCst);
      }));
      remote.quit_when_idle();
    });
    tokio::time::timeout(Duration::from_secs(5), host.run())
      .await
      .unwrap();
    poster.join().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(host.pending_tasks(), 0);
  }

  #[test]
  fn current_is_scoped_to_guard() {
    assert!(current().is_none());
    let host: Arc<dyn HostLoop> = TokioHostLoop::new();
    {
      let _guard = set_current(host.clone());
      assert!(Arc::ptr_eq(&current().unwrap(), &host));
    }
    assert!(current().is_none());
  }
}
