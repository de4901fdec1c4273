// Copyright 2018-2025 the Deno authors. MIT license.

use std::path::PathBuf;

/// A generic wrapper that can encapsulate any concrete error type.
///
/// Used for failures reported by the embedded runtime and the JS engine,
/// whose error types the bridge knows nothing about.
pub type AnyError = anyhow::Error;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
  #[error("Unable to resolve the path of the current executable")]
  ExecutablePath,
  #[error("Entry script not found at {}", .0.display())]
  EntryScriptMissing(PathBuf),
  #[error("The embedded runtime rejected its arguments")]
  RuntimeInit(#[source] AnyError),
  #[error("Failed to initialize the JavaScript engine")]
  EngineInit(#[source] AnyError),
  #[error("Failed to create the shared environment")]
  CreateEnvironment(#[source] AnyError),
  #[error("The shared environment has already been created")]
  AlreadyInitialized,
  #[error("The shared environment has not been created yet")]
  NotInitialized,
  #[error("The message loop has already been prepared")]
  AlreadyPrepared,
  #[error("The message loop must be prepared before it is started")]
  NotPrepared,
  #[error("The message loop has already been started")]
  AlreadyStarted,
  #[error("No host message loop is current on this thread")]
  NoHostLoop,
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl CoreError {
  pub fn print_with_cause(&self) -> String {
    use std::error::Error;
    let mut err_message = self.to_string();

    if let Some(source) = self.source() {
      err_message.push_str(&format!(
        "\n\nCaused by:\n    {}",
        source.to_string().replace('\n', "\n    ")
      ));
    }

    err_message
  }
}

/// An exception thrown by JavaScript and not caught by JavaScript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Uncaught {message}")]
pub struct JsException {
  pub message: String,
}

impl JsException {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn print_with_cause_includes_source() {
    let err =
      CoreError::CreateEnvironment(anyhow::anyhow!("isolate is gone\nbye"));
    assert_eq!(
      err.print_with_cause(),
      "Failed to create the shared environment\n\nCaused by:\n    isolate is gone\n    bye"
    );
  }

  #[test]
  fn print_without_cause() {
    let err = CoreError::EntryScriptMissing(PathBuf::from("/r/atom.js"));
    assert_eq!(err.print_with_cause(), "Entry script not found at /r/atom.js");
  }

  #[test]
  fn js_exception_display() {
    let exception = JsException::new("TypeError: boom");
    assert_eq!(exception.to_string(), "Uncaught TypeError: boom");
  }
}
