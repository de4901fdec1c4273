// Copyright 2018-2025 the Deno authors. MIT license.

//! Fakes for the collaborators of `uv_bridge` and a harness wiring them to
//! a [`NodeBindings`].

mod engine;
mod host;
mod io_loop;

pub use engine::EnvironmentRequest;
pub use engine::FakeContext;
pub use engine::FakeEngine;
pub use engine::FakeFrame;
pub use engine::FakeRuntime;
pub use engine::FakeScript;
pub use engine::FakeValue;
pub use engine::RecordedCall;
pub use host::FakePaths;
pub use host::RecordingHostLoop;
pub use io_loop::FakeIoLoop;
pub use io_loop::FakeLoopConfig;
pub use io_loop::LoopCall;

use std::ffi::OsString;
use std::sync::Arc;
use uv_bridge::tasks::set_current;
use uv_bridge::tasks::CurrentHostLoopGuard;
use uv_bridge::BindingsOptions;
use uv_bridge::CoreError;
use uv_bridge::EmbeddedRuntime as _;
use uv_bridge::NodeBindings;
use uv_bridge::Platform;
use uv_bridge::Role;

pub const TEST_EXECUTABLE: &str = "/app/bin/app";

pub fn argv(args: &[&str]) -> Vec<OsString> {
  args.iter().map(OsString::from).collect()
}

/// Default options for a harness: fake paths rooted at
/// [`TEST_EXECUTABLE`], non-mac layout.
pub fn test_options(role: Role) -> BindingsOptions {
  BindingsOptions {
    role,
    platform: Platform::Other,
    path_service: Some(Box::new(FakePaths::new(TEST_EXECUTABLE))),
    ..Default::default()
  }
}

/// Bindings over a [`FakeRuntime`] and a [`FakeIoLoop`], with a
/// [`RecordingHostLoop`] current on the calling thread.
pub struct Harness {
  pub bindings: NodeBindings<FakeRuntime, FakeIoLoop>,
  pub io: Arc<FakeIoLoop>,
  pub host: Arc<RecordingHostLoop>,
  _current: CurrentHostLoopGuard,
}

impl Harness {
  pub fn new(role: Role, config: FakeLoopConfig) -> Self {
    Self::with_options(config, test_options(role))
  }

  pub fn with_options(config: FakeLoopConfig, options: BindingsOptions) -> Self {
    let io = FakeIoLoop::new(config);
    let host = RecordingHostLoop::new();
    let current = set_current(host.clone());
    let bindings = NodeBindings::new(FakeRuntime::new(), io.clone(), options);
    Harness {
      bindings,
      io,
      host,
      _current: current,
    }
  }

  pub fn runtime(&self) -> &FakeRuntime {
    self.bindings.runtime()
  }

  pub fn engine(&self) -> &FakeEngine {
    self.bindings.runtime().engine()
  }

  pub fn initialize(&self) -> Result<(), CoreError> {
    self
      .bindings
      .initialize(argv(&[TEST_EXECUTABLE, "--flag"]))
  }

  /// Initializes, prepares and starts the bindings.
  pub fn start(&self) -> Result<(), CoreError> {
    self.initialize()?;
    self.bindings.prepare()?;
    self.bindings.start()
  }

  /// Tears the bindings down and hands back the loops for inspection.
  pub fn teardown(self) -> (Arc<FakeIoLoop>, Arc<RecordingHostLoop>) {
    let Harness {
      bindings,
      io,
      host,
      _current,
    } = self;
    drop(bindings);
    (io, host)
  }
}
