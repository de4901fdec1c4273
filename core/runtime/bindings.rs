// Copyright 2018-2025 the Deno authors. MIT license.

use crate::embedder::EmbeddedRuntime;
use crate::embedder::Environment;
use crate::error::JsException;
use crate::js::JsEngine;
use crate::js::WebFrame;
use percent_encoding::percent_decode_str;
use url::Url;

/// Result of binding the shared environment into a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
  Bound,
  /// The frame has no main-world script context yet. The host binds
  /// again once it creates one.
  EmptyContext,
  /// The bootstrap threw. The exception has already been handed to the
  /// runtime's uncaught-exception path.
  Threw(JsException),
}

/// Path of the script behind `url`, with every percent-escape decoded,
/// including spaces and URL-special characters.
pub fn document_script_path(url: &Url) -> String {
  percent_decode_str(url.path())
    .decode_utf8_lossy()
    .into_owned()
}

pub(crate) fn bind_frame<R: EmbeddedRuntime>(
  runtime: &R,
  env: &Environment<R::Engine>,
  frame: &dyn WebFrame<R::Engine>,
) -> BindOutcome {
  let Some(context) = frame.main_world_script_context() else {
    return BindOutcome::EmptyContext;
  };
  let engine = runtime.engine();
  let result = engine.enter(&context, || {
    // Same-origin collapse: every bound context shares the environment's
    // token so runtime objects can be reached from the document.
    engine.set_security_token(&context, env.security_token.clone());

    let script = runtime.compile_bootstrap(&context)?;
    let bootstrap = engine.run_script(&context, &script)?;

    let script_path = document_script_path(&frame.document_url());
    let args = [
      env.process_object.clone(),
      engine.string(&context, &script_path),
    ];
    let global = engine.global(&context);
    engine.call(&context, &bootstrap, &global, &args)
  });

  match result {
    Ok(_) => BindOutcome::Bound,
    Err(exception) => {
      runtime.report_exception(exception.clone());
      BindOutcome::Threw(exception)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[rstest]
  #[case("file:///tmp/hello%20world.html", "/tmp/hello world.html")]
  #[case("file:///tmp/plain.html", "/tmp/plain.html")]
  #[case("file:///tmp/a%23b%3Fc%25d.html", "/tmp/a#b?c%d.html")]
  #[case("file:///tmp/caf%C3%A9.html", "/tmp/café.html")]
  #[case("file:///tmp/a+b.html", "/tmp/a+b.html")]
  #[case("http://example.com/app/index.html?x=1#top", "/app/index.html")]
  fn decodes_document_path(#[case] url: &str, #[case] expected: &str) {
    let url = Url::parse(url).unwrap();
    assert_eq!(document_script_path(&url), expected);
  }
}
