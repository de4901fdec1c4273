// Copyright 2018-2025 the Deno authors. MIT license.

use std::cell::Cell;
use std::cell::RefCell;
use url::Url;
use uv_bridge::AnyError;
use uv_bridge::EmbeddedRuntime;
use uv_bridge::Environment;
use uv_bridge::JsEngine;
use uv_bridge::JsException;
use uv_bridge::ParsedArgs;
use uv_bridge::RuntimeModes;
use uv_bridge::WebFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeContext(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeValue {
  Undefined,
  String(String),
  Object(u32),
  Function(u32),
  Token(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeScript {
  Evaluates(FakeValue),
  Throws(String),
}

/// A function call made through [`JsEngine::call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
  pub context: FakeContext,
  /// Context entered when the call was made.
  pub entered: Option<FakeContext>,
  pub function: FakeValue,
  pub receiver: FakeValue,
  pub args: Vec<FakeValue>,
}

#[derive(Default)]
struct EngineState {
  next_id: u32,
  initialized: usize,
  idle_notifications: usize,
  entered: Vec<FakeContext>,
  enter_count: usize,
  tokens: Vec<(FakeContext, FakeValue)>,
  calls: Vec<RecordedCall>,
  throw_on_call: Option<String>,
}

/// Single-threaded stand-in for a JS engine. Every context owns a global
/// object and a security token; functions do nothing but get recorded.
#[derive(Default)]
pub struct FakeEngine {
  state: RefCell<EngineState>,
}

impl FakeEngine {
  fn next_id(&self) -> u32 {
    let mut state = self.state.borrow_mut();
    state.next_id += 1;
    state.next_id
  }

  pub fn new_context(&self) -> FakeContext {
    let context = FakeContext(self.next_id());
    let token = FakeValue::Token(self.next_id());
    self.state.borrow_mut().tokens.push((context, token));
    context
  }

  pub fn new_object(&self) -> FakeValue {
    FakeValue::Object(self.next_id())
  }

  pub fn initialized(&self) -> usize {
    self.state.borrow().initialized
  }

  pub fn idle_notifications(&self) -> usize {
    self.state.borrow().idle_notifications
  }

  pub fn enter_count(&self) -> usize {
    self.state.borrow().enter_count
  }

  pub fn current_context(&self) -> Option<FakeContext> {
    self.state.borrow().entered.last().copied()
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.state.borrow().calls.clone()
  }

  pub fn throw_on_call(&self, message: &str) {
    self.state.borrow_mut().throw_on_call = Some(message.to_string());
  }
}

impl JsEngine for FakeEngine {
  type Context = FakeContext;
  type Value = FakeValue;
  type Script = FakeScript;

  fn initialize(&self) -> Result<(), AnyError> {
    self.state.borrow_mut().initialized += 1;
    Ok(())
  }

  fn idle_notification(&self) -> bool {
    self.state.borrow_mut().idle_notifications += 1;
    true
  }

  fn enter<T>(&self, context: &FakeContext, f: impl FnOnce() -> T) -> T {
    {
      let mut state = self.state.borrow_mut();
      state.entered.push(*context);
      state.enter_count += 1;
    }
    let result = f();
    self.state.borrow_mut().entered.pop();
    result
  }

  fn security_token(&self, context: &FakeContext) -> FakeValue {
    self
      .state
      .borrow()
      .tokens
      .iter()
      .find(|(ctx, _)| ctx == context)
      .map(|(_, token)| token.clone())
      .unwrap_or(FakeValue::Undefined)
  }

  fn set_security_token(&self, context: &FakeContext, token: FakeValue) {
    let mut state = self.state.borrow_mut();
    state.tokens.retain(|(ctx, _)| ctx != context);
    state.tokens.push((*context, token));
  }

  fn global(&self, context: &FakeContext) -> FakeValue {
    // Globals share their context's id.
    FakeValue::Object(context.0)
  }

  fn string(&self, _context: &FakeContext, value: &str) -> FakeValue {
    FakeValue::String(value.to_string())
  }

  fn run_script(
    &self,
    _context: &FakeContext,
    script: &FakeScript,
  ) -> Result<FakeValue, JsException> {
    match script {
      FakeScript::Evaluates(value) => Ok(value.clone()),
      FakeScript::Throws(message) => Err(JsException::new(message.clone())),
    }
  }

  fn call(
    &self,
    context: &FakeContext,
    function: &FakeValue,
    receiver: &FakeValue,
    args: &[FakeValue],
  ) -> Result<FakeValue, JsException> {
    if !matches!(function, FakeValue::Function(_)) {
      return Err(JsException::new("TypeError: bootstrap is not a function"));
    }
    let mut state = self.state.borrow_mut();
    let entered = state.entered.last().copied();
    state.calls.push(RecordedCall {
      context: *context,
      entered,
      function: function.clone(),
      receiver: receiver.clone(),
      args: args.to_vec(),
    });
    match &state.throw_on_call {
      Some(message) => Err(JsException::new(message.clone())),
      None => Ok(FakeValue::Undefined),
    }
  }
}

/// A `create_environment` call as the runtime saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRequest {
  pub args: Vec<String>,
  pub exec_args: Vec<String>,
}

#[derive(Default)]
struct RuntimeState {
  modes: Option<RuntimeModes>,
  init_args: Vec<Vec<String>>,
  environment_requests: Vec<EnvironmentRequest>,
  exceptions: Vec<JsException>,
  fail_environment: bool,
}

/// A stand-in for node: splits leading `--` flags into execution
/// arguments and builds environments on a [`FakeEngine`].
pub struct FakeRuntime {
  engine: FakeEngine,
  bootstrap: RefCell<FakeScript>,
  bootstrap_fn: FakeValue,
  state: RefCell<RuntimeState>,
  compiles: Cell<usize>,
}

impl Default for FakeRuntime {
  fn default() -> Self {
    Self::new()
  }
}

impl FakeRuntime {
  pub fn new() -> Self {
    let engine = FakeEngine::default();
    let bootstrap_fn = FakeValue::Function(engine.next_id());
    FakeRuntime {
      engine,
      bootstrap: RefCell::new(FakeScript::Evaluates(bootstrap_fn.clone())),
      bootstrap_fn,
      state: RefCell::default(),
      compiles: Cell::new(0),
    }
  }

  pub fn bootstrap_fn(&self) -> FakeValue {
    self.bootstrap_fn.clone()
  }

  pub fn set_bootstrap(&self, script: FakeScript) {
    *self.bootstrap.borrow_mut() = script;
  }

  pub fn fail_environment(&self) {
    self.state.borrow_mut().fail_environment = true;
  }

  pub fn modes(&self) -> Option<RuntimeModes> {
    self.state.borrow().modes
  }

  pub fn init_args(&self) -> Vec<Vec<String>> {
    self.state.borrow().init_args.clone()
  }

  pub fn environment_requests(&self) -> Vec<EnvironmentRequest> {
    self.state.borrow().environment_requests.clone()
  }

  pub fn exceptions(&self) -> Vec<JsException> {
    self.state.borrow().exceptions.clone()
  }

  pub fn compiles(&self) -> usize {
    self.compiles.get()
  }
}

impl EmbeddedRuntime for FakeRuntime {
  type Engine = FakeEngine;

  fn engine(&self) -> &FakeEngine {
    &self.engine
  }

  fn set_modes(&self, modes: RuntimeModes) {
    self.state.borrow_mut().modes = Some(modes);
  }

  fn init(&self, args: Vec<String>) -> Result<ParsedArgs, AnyError> {
    self.state.borrow_mut().init_args.push(args.clone());
    let mut iter = args.into_iter();
    let Some(program) = iter.next() else {
      anyhow::bail!("missing program name");
    };
    let rest: Vec<String> = iter.collect();
    let split = rest
      .iter()
      .position(|arg| !arg.starts_with("--"))
      .unwrap_or(rest.len());
    let (exec_args, user_args) = rest.split_at(split);
    let mut parsed_args = vec![program];
    parsed_args.extend_from_slice(user_args);
    Ok(ParsedArgs {
      args: parsed_args,
      exec_args: exec_args.to_vec(),
    })
  }

  fn create_environment(
    &self,
    args: &[String],
    exec_args: &[String],
  ) -> Result<Environment<FakeEngine>, AnyError> {
    let mut state = self.state.borrow_mut();
    state.environment_requests.push(EnvironmentRequest {
      args: args.to_vec(),
      exec_args: exec_args.to_vec(),
    });
    if state.fail_environment {
      anyhow::bail!("isolate refused a new context");
    }
    drop(state);

    let context = self.engine.new_context();
    Ok(Environment {
      context,
      process_object: self.engine.new_object(),
      security_token: self.engine.security_token(&context),
    })
  }

  fn compile_bootstrap(
    &self,
    _context: &FakeContext,
  ) -> Result<FakeScript, JsException> {
    self.compiles.set(self.compiles.get() + 1);
    Ok(self.bootstrap.borrow().clone())
  }

  fn report_exception(&self, exception: JsException) {
    self.state.borrow_mut().exceptions.push(exception);
  }
}

/// A document frame whose script context may not exist yet.
pub struct FakeFrame {
  pub context: Option<FakeContext>,
  pub url: Url,
}

impl FakeFrame {
  pub fn new(context: Option<FakeContext>, url: &str) -> Self {
    FakeFrame {
      context,
      url: Url::parse(url).expect("valid document url"),
    }
  }
}

impl WebFrame<FakeEngine> for FakeFrame {
  fn main_world_script_context(&self) -> Option<FakeContext> {
    self.context
  }

  fn document_url(&self) -> Url {
    self.url.clone()
  }
}
