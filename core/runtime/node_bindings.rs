// Copyright 2018-2025 the Deno authors. MIT license.

use super::bindings::bind_frame;
use super::bindings::BindOutcome;
use super::idle_gc::IdleGcTicker;
use super::idle_gc::DEFAULT_IDLE_GC_INTERVAL;
use super::poll_thread::wake_semaphore;
use super::poll_thread::LoopSignals;
use super::poll_thread::PollThread;
use super::poll_thread::WakeSemaphore;
use super::pump::MainThreadPump;
use super::pump::PumpHandle;
use super::pump::PumpState;
use super::setup::resolve_entry_point;
use super::setup::runtime_args;
use super::setup::EntryPoint;
use crate::embedder::EmbeddedRuntime;
use crate::embedder::Environment;
use crate::embedder::ParsedArgs;
use crate::embedder::RuntimeModes;
use crate::error::CoreError;
use crate::event_loop::AsyncHandleId;
use crate::event_loop::IoLoop;
use crate::event_loop::RunMode;
use crate::js::JsEngine;
use crate::js::WebFrame;
use crate::paths::PathService;
use crate::paths::Platform;
use crate::paths::ProcessPaths;
use crate::paths::Role;
use crate::tasks;
use std::cell::Cell;
use std::cell::OnceCell;
use std::cell::RefCell;
use std::ffi::OsString;
use std::rc::Rc;
use std::rc::Weak;
use std::sync::Arc;
use std::time::Duration;

pub struct BindingsOptions {
  pub role: Role,

  /// Bundle layout used to find the resources directory.
  pub platform: Platform,

  /// Period of the browser process's idle GC timer.
  pub idle_gc_interval: Duration,

  pub poll_thread_name: String,

  /// Defaults to [`ProcessPaths`].
  pub path_service: Option<Box<dyn PathService>>,
}

impl Default for BindingsOptions {
  fn default() -> Self {
    Self {
      role: Role::default(),
      platform: Platform::current(),
      idle_gc_interval: DEFAULT_IDLE_GC_INTERVAL,
      poll_thread_name: "uv-poll".to_string(),
      path_service: None,
    }
  }
}

/// Runs an embedded runtime's I/O loop on the host's main thread.
///
/// The bindings own the shared [`Environment`]: [`NodeBindings::initialize`]
/// writes it exactly once, after which [`NodeBindings::bind`] and the loop
/// pump only read it. It is never destroyed by the bindings.
///
/// Lifecycle, all on the thread that created the bindings:
///
/// 1. [`NodeBindings::initialize`]
/// 2. [`NodeBindings::prepare`] (registers the keepalive, starts the poll
///    thread)
/// 3. [`NodeBindings::start`] once the host loop is current
/// 4. drop, which stops the poll thread and drains the host loop
///
/// [`NodeBindings::bind`] may be called for every new frame after step 1.
pub struct NodeBindings<R: EmbeddedRuntime, L: IoLoop> {
  inner: Rc<Inner<R, L>>,
}

struct Inner<R: EmbeddedRuntime, L: IoLoop> {
  role: Role,
  platform: Platform,
  idle_gc_interval: Duration,
  poll_thread_name: String,
  paths: Box<dyn PathService>,
  runtime: R,
  io_loop: Arc<L>,
  pump_handle: PumpHandle,
  signals: Arc<LoopSignals>,
  environment: OnceCell<Environment<R::Engine>>,
  parsed_args: OnceCell<ParsedArgs>,
  entry_point: OnceCell<EntryPoint>,
  state: Cell<PumpState>,
  started: Cell<bool>,
  dummy_handle: Cell<Option<AsyncHandleId>>,
  wake: RefCell<Option<WakeSemaphore>>,
  poll_thread: RefCell<Option<PollThread>>,
  idle_gc: RefCell<Option<IdleGcTicker>>,
}

impl<R: EmbeddedRuntime, L: IoLoop> NodeBindings<R, L> {
  pub fn new(runtime: R, io_loop: Arc<L>, options: BindingsOptions) -> Self {
    let inner = Rc::new_cyclic(|weak: &Weak<Inner<R, L>>| {
      let pump: Weak<dyn MainThreadPump> = weak.clone();
      let pump_handle = PumpHandle::register(pump);
      Inner {
        role: options.role,
        platform: options.platform,
        idle_gc_interval: options.idle_gc_interval,
        poll_thread_name: options.poll_thread_name,
        paths: options
          .path_service
          .unwrap_or_else(|| Box::new(ProcessPaths)),
        runtime,
        io_loop,
        pump_handle,
        signals: Arc::new(LoopSignals::new(pump_handle)),
        environment: OnceCell::new(),
        parsed_args: OnceCell::new(),
        entry_point: OnceCell::new(),
        state: Cell::new(PumpState::Unarmed),
        started: Cell::new(false),
        dummy_handle: Cell::new(None),
        wake: RefCell::new(None),
        poll_thread: RefCell::new(None),
        idle_gc: RefCell::new(None),
      }
    });
    NodeBindings { inner }
  }

  pub fn role(&self) -> Role {
    self.inner.role
  }

  pub fn runtime(&self) -> &R {
    &self.inner.runtime
  }

  pub fn io_loop(&self) -> &Arc<L> {
    &self.inner.io_loop
  }

  /// The shared environment, once [`NodeBindings::initialize`] succeeded.
  pub fn environment(&self) -> Option<&Environment<R::Engine>> {
    self.inner.environment.get()
  }

  /// Arguments as split by the runtime during initialization.
  pub fn parsed_args(&self) -> Option<&ParsedArgs> {
    self.inner.parsed_args.get()
  }

  pub fn entry_point(&self) -> Option<&EntryPoint> {
    self.inner.entry_point.get()
  }

  pub fn pump_state(&self) -> PumpState {
    self.inner.state.get()
  }

  pub fn is_closed(&self) -> bool {
    self.inner.signals.is_closed()
  }

  /// Initializes the embedded runtime and creates the shared environment
  /// from the process arguments.
  pub fn initialize_from_env(&self) -> Result<(), CoreError> {
    self.initialize(std::env::args_os().collect())
  }

  /// Initializes the embedded runtime and creates the shared environment.
  ///
  /// `argv` is the argument vector as seen by the host. Any error is fatal
  /// for process startup.
  pub fn initialize(&self, argv: Vec<OsString>) -> Result<(), CoreError> {
    let inner = &self.inner;
    if inner.environment.get().is_some() {
      return Err(CoreError::AlreadyInitialized);
    }

    let entry_point =
      resolve_entry_point(&*inner.paths, inner.role, inner.platform)?;
    let args =
      runtime_args(&argv, &entry_point.executable, &entry_point.entry_script);
    log::debug!(
      "Initializing {:?} runtime with entry script {}",
      inner.role,
      entry_point.entry_script.display()
    );

    if inner.role.is_browser() {
      inner.arm_idle_gc();
    }

    inner.runtime.set_modes(RuntimeModes {
      standalone: true,
      upstream: false,
    });

    let parsed = inner.runtime.init(args).map_err(CoreError::RuntimeInit)?;
    inner
      .runtime
      .engine()
      .initialize()
      .map_err(CoreError::EngineInit)?;

    // The parsed user arguments serve as both argument sets.
    let env = inner
      .runtime
      .create_environment(&parsed.args, &parsed.args)
      .map_err(CoreError::CreateEnvironment)?;
    if inner.environment.set(env).is_err() {
      return Err(CoreError::AlreadyInitialized);
    }
    let _ = inner.parsed_args.set(parsed);
    let _ = inner.entry_point.set(entry_point);
    Ok(())
  }

  /// Makes the shared environment's bindings visible in `frame`'s
  /// main-world context.
  pub fn bind(
    &self,
    frame: &dyn WebFrame<R::Engine>,
  ) -> Result<BindOutcome, CoreError> {
    let env = self
      .inner
      .environment
      .get()
      .ok_or(CoreError::NotInitialized)?;
    let outcome = bind_frame(&self.inner.runtime, env, frame);
    match &outcome {
      BindOutcome::Bound => {
        log::debug!("Bound environment into {}", frame.document_url())
      }
      BindOutcome::EmptyContext => {
        log::trace!("No script context yet for {}", frame.document_url())
      }
      BindOutcome::Threw(exception) => {
        log::debug!("Bootstrap threw in {}: {exception}", frame.document_url())
      }
    }
    Ok(outcome)
  }

  /// Registers the keepalive handle, creates the wake semaphore and starts
  /// the poll thread.
  pub fn prepare(&self) -> Result<(), CoreError> {
    let inner = &self.inner;
    if inner.poll_thread.borrow().is_some() {
      return Err(CoreError::AlreadyPrepared);
    }

    // Without a registered handle the I/O loop reports "nothing to do"
    // and exits.
    let dummy = inner.io_loop.async_init(Box::new(|| {}));
    let (wake, waiter) = wake_semaphore();
    let poll_thread = match PollThread::spawn(
      inner.poll_thread_name.clone(),
      inner.io_loop.clone(),
      waiter,
      inner.signals.clone(),
    ) {
      Ok(poll_thread) => poll_thread,
      Err(err) => {
        inner.io_loop.async_close(dummy);
        return Err(err.into());
      }
    };

    inner.dummy_handle.set(Some(dummy));
    *inner.wake.borrow_mut() = Some(wake);
    *inner.poll_thread.borrow_mut() = Some(poll_thread);
    log::debug!("Message loop prepared");
    Ok(())
  }

  /// Captures the current host loop and runs the first loop iteration, so
  /// the I/O loop registers every existing handle with its backend.
  pub fn start(&self) -> Result<(), CoreError> {
    let inner = &self.inner;
    if inner.poll_thread.borrow().is_none() {
      return Err(CoreError::NotPrepared);
    }
    if inner.started.get() {
      return Err(CoreError::AlreadyStarted);
    }
    if inner.environment.get().is_none() {
      return Err(CoreError::NotInitialized);
    }
    let host = tasks::current().ok_or(CoreError::NoHostLoop)?;
    inner.signals.set_host(host);
    inner.started.set(true);
    inner.state.set(PumpState::Idle);
    log::debug!("Message loop started");
    inner.pump_once();
    Ok(())
  }

  /// Interrupts a poll in progress on the poll thread.
  pub fn wakeup_poll_thread(&self) {
    self.inner.wakeup_poll_thread();
  }
}

impl<R: EmbeddedRuntime, L: IoLoop> Drop for NodeBindings<R, L> {
  fn drop(&mut self) {
    self.inner.teardown();
  }
}

impl<R: EmbeddedRuntime, L: IoLoop> Inner<R, L> {
  fn arm_idle_gc(&self) {
    let mut idle_gc = self.idle_gc.borrow_mut();
    if idle_gc.is_none() {
      *idle_gc = Some(IdleGcTicker::arm(
        &*self.io_loop,
        self.idle_gc_interval,
        self.pump_handle,
      ));
    }
  }

  fn wakeup_poll_thread(&self) {
    if let Some(dummy) = self.dummy_handle.get() {
      self.io_loop.async_send(dummy);
    }
  }

  fn teardown(&self) {
    log::debug!("Tearing down message loop integration");
    self.signals.close();
    self.state.set(PumpState::Unarmed);

    let poll_thread = self.poll_thread.borrow_mut().take();
    if let Some(poll_thread) = poll_thread {
      // Release a poll thread waiting for its turn...
      if let Some(wake) = self.wake.borrow().as_ref() {
        wake.post();
      }
      // ...and one already blocked in the backend.
      self.wakeup_poll_thread();
      poll_thread.join();
    }

    // A pump posted before the poll thread saw the closed flag still runs.
    if let Some(host) = self.signals.host() {
      host.run_until_idle();
    }
    self.signals.clear_host();
    self.state.set(PumpState::Unarmed);

    self.wake.borrow_mut().take();
    let idle_gc = self.idle_gc.borrow_mut().take();
    if let Some(idle_gc) = idle_gc {
      idle_gc.stop(&*self.io_loop);
    }
    if let Some(dummy) = self.dummy_handle.take() {
      self.io_loop.async_close(dummy);
    }
    self.pump_handle.unregister();
  }
}

impl<R: EmbeddedRuntime, L: IoLoop> MainThreadPump for Inner<R, L> {
  fn pump_once(&self) {
    if self.state.get() == PumpState::Pumping {
      log::warn!("Ignoring re-entrant pump");
      return;
    }
    let Some(env) = self.environment.get() else {
      log::error!("Pump requested before the environment was created");
      return;
    };

    self.state.set(PumpState::Pumping);
    log::trace!("Pumping I/O loop");
    let engine = self.runtime.engine();
    let alive = engine.enter(&env.context, || self.io_loop.run(RunMode::NoWait));
    if !alive || self.io_loop.stop_requested() {
      log::debug!("I/O loop is done, quitting host loop when idle");
      if let Some(host) = self.signals.host() {
        host.quit_when_idle();
      }
    }
    self.state.set(if self.signals.is_closed() {
      PumpState::Unarmed
    } else {
      PumpState::Idle
    });

    // Let the poll thread wait for the next batch of events.
    if let Some(wake) = self.wake.borrow().as_ref() {
      wake.post();
    }
  }

  fn idle_notification(&self) {
    if self.signals.is_closed() {
      return;
    }
    self.runtime.engine().idle_notification();
  }
}
