// Copyright 2018-2025 the Deno authors. MIT license.

//! What the bridge needs from the JavaScript engine and from the host's
//! document frames.

use crate::error::AnyError;
use crate::error::JsException;
use url::Url;

/// The process-wide isolate.
///
/// Every method is called on the main thread. Handles (`Context`, `Value`,
/// `Script`) are persistent handles owned by the engine; cloning one makes
/// another reference to the same JS object.
pub trait JsEngine: 'static {
  type Context: Clone + 'static;
  type Value: Clone + 'static;
  type Script: 'static;

  /// One-shot engine initialization (`V8::Initialize`).
  fn initialize(&self) -> Result<(), AnyError>;

  /// Hints that the embedder is idle and garbage collection may run.
  /// Returns `true` when the engine has no more idle work to do.
  fn idle_notification(&self) -> bool;

  /// Runs `f` with a handle scope open and `context` entered.
  fn enter<T>(&self, context: &Self::Context, f: impl FnOnce() -> T) -> T;

  fn security_token(&self, context: &Self::Context) -> Self::Value;

  fn set_security_token(&self, context: &Self::Context, token: Self::Value);

  fn global(&self, context: &Self::Context) -> Self::Value;

  fn string(&self, context: &Self::Context, value: &str) -> Self::Value;

  fn run_script(
    &self,
    context: &Self::Context,
    script: &Self::Script,
  ) -> Result<Self::Value, JsException>;

  /// Calls `function` with `receiver` as `this`. Fails if `function` is
  /// not callable or if the call throws.
  fn call(
    &self,
    context: &Self::Context,
    function: &Self::Value,
    receiver: &Self::Value,
    args: &[Self::Value],
  ) -> Result<Self::Value, JsException>;
}

/// A document frame created by the host.
pub trait WebFrame<E: JsEngine> {
  /// The frame's main-world script context, or `None` while the host has
  /// not created it yet.
  fn main_world_script_context(&self) -> Option<E::Context>;

  fn document_url(&self) -> Url;
}
