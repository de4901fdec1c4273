// Copyright 2018-2025 the Deno authors. MIT license.

//! The embedded runtime (node) as consumed by the bridge.

use crate::error::AnyError;
use crate::error::JsException;
use crate::js::JsEngine;

/// Global switches of the embedded runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeModes {
  /// The runtime owns uncaught-exception reporting.
  pub standalone: bool,
  /// The runtime runs under a larger runtime supervisor.
  pub upstream: bool,
}

/// Arguments after the runtime has split off its own flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
  pub args: Vec<String>,
  pub exec_args: Vec<String>,
}

/// The runtime's per-process JS execution state.
pub struct Environment<E: JsEngine> {
  pub context: E::Context,
  /// The `process` object handed to every bound context.
  pub process_object: E::Value,
  pub security_token: E::Value,
}

impl<E: JsEngine> Clone for Environment<E> {
  fn clone(&self) -> Self {
    Self {
      context: self.context.clone(),
      process_object: self.process_object.clone(),
      security_token: self.security_token.clone(),
    }
  }
}

pub trait EmbeddedRuntime: 'static {
  type Engine: JsEngine;

  /// The process's default isolate.
  fn engine(&self) -> &Self::Engine;

  fn set_modes(&self, modes: RuntimeModes);

  /// Splits `args` into user arguments and execution (runtime) arguments.
  fn init(&self, args: Vec<String>) -> Result<ParsedArgs, AnyError>;

  fn create_environment(
    &self,
    args: &[String],
    exec_args: &[String],
  ) -> Result<Environment<Self::Engine>, AnyError>;

  /// Compiles the bootstrap source in `context`. Running the script yields a
  /// function `(process, scriptPath) => void`.
  fn compile_bootstrap(
    &self,
    context: &<Self::Engine as JsEngine>::Context,
  ) -> Result<<Self::Engine as JsEngine>::Script, JsException>;

  /// The runtime's uncaught-exception path.
  fn report_exception(&self, exception: JsException);
}
