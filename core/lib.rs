// Copyright 2018-2025 the Deno authors. MIT license.

//! Lets an embedded runtime's libuv-style I/O loop share the main thread
//! with a host application's task-based message loop.
//!
//! The I/O loop is pumped one non-blocking iteration at a time on the main
//! thread, inside the runtime's JS context. A dedicated poll thread does
//! the blocking wait on the loop's backend and posts the next pump to the
//! host loop when events arrive, so neither loop starves the other and
//! nothing busy-waits.
//!
//! The I/O loop ([`IoLoop`]), the JS engine ([`JsEngine`]), the embedded
//! runtime ([`EmbeddedRuntime`]) and the host loop ([`HostLoop`]) are
//! supplied by the embedder. [`NodeBindings`] ties them together.

pub mod embedder;
pub mod error;
pub mod event_loop;
pub mod js;
pub mod paths;
mod runtime;
pub mod tasks;

// Re-exports
pub use anyhow;
pub use url;

pub use crate::embedder::EmbeddedRuntime;
pub use crate::embedder::Environment;
pub use crate::embedder::ParsedArgs;
pub use crate::embedder::RuntimeModes;
pub use crate::error::AnyError;
pub use crate::error::CoreError;
pub use crate::error::JsException;
pub use crate::event_loop::AsyncHandleId;
pub use crate::event_loop::IoLoop;
pub use crate::event_loop::LoopCallback;
pub use crate::event_loop::RunMode;
pub use crate::event_loop::TimerId;
pub use crate::js::JsEngine;
pub use crate::js::WebFrame;
pub use crate::paths::PathService;
pub use crate::paths::Platform;
pub use crate::paths::ProcessPaths;
pub use crate::paths::Role;
pub use crate::runtime::document_script_path;
pub use crate::runtime::runtime_args;
pub use crate::runtime::BindOutcome;
pub use crate::runtime::BindingsOptions;
pub use crate::runtime::EntryPoint;
pub use crate::runtime::NodeBindings;
pub use crate::runtime::PumpState;
pub use crate::runtime::DEFAULT_IDLE_GC_INTERVAL;
pub use crate::tasks::HostLoop;
pub use crate::tasks::Task;
pub use crate::tasks::TokioHostLoop;
