// Copyright 2018-2025 the Deno authors. MIT license.

use parking_lot::Mutex;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::ThreadId;
use uv_bridge::HostLoop;
use uv_bridge::PathService;
use uv_bridge::Task;
use uv_bridge::TokioHostLoop;

/// A [`TokioHostLoop`] that counts what the bridge asks of it.
#[derive(Default)]
pub struct RecordingHostLoop {
  inner: TokioHostLoop,
  posted: AtomicUsize,
  quits: AtomicUsize,
  ran_on: Arc<Mutex<Vec<ThreadId>>>,
}

impl RecordingHostLoop {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub async fn run(&self) {
    self.inner.run().await
  }

  pub fn posted(&self) -> usize {
    self.posted.load(Ordering::SeqCst)
  }

  pub fn quit_requests(&self) -> usize {
    self.quits.load(Ordering::SeqCst)
  }

  pub fn pending_tasks(&self) -> usize {
    self.inner.pending_tasks()
  }

  /// Threads that ran posted tasks, in order.
  pub fn task_threads(&self) -> Vec<ThreadId> {
    self.ran_on.lock().clone()
  }
}

impl HostLoop for RecordingHostLoop {
  fn post_task(&self, task: Task) {
    self.posted.fetch_add(1, Ordering::SeqCst);
    let ran_on = self.ran_on.clone();
    self.inner.post_task(Box::new(move || {
      ran_on.lock().push(std::thread::current().id());
      task();
    }));
  }

  fn quit_when_idle(&self) {
    self.quits.fetch_add(1, Ordering::SeqCst);
    self.inner.quit_when_idle();
  }

  fn run_until_idle(&self) {
    self.inner.run_until_idle();
  }
}

/// A path service with a fixed executable and a fixed answer to "does
/// this file exist".
pub struct FakePaths {
  pub executable: Option<PathBuf>,
  pub entry_script_exists: bool,
}

impl FakePaths {
  pub fn new(executable: &str) -> Self {
    FakePaths {
      executable: Some(PathBuf::from(executable)),
      entry_script_exists: true,
    }
  }
}

impl PathService for FakePaths {
  fn executable_path(&self) -> Option<PathBuf> {
    self.executable.clone()
  }

  fn exists(&self, _path: &Path) -> bool {
    self.entry_script_exists
  }
}
