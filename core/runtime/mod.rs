// Copyright 2018-2025 the Deno authors. MIT license.
mod bindings;
mod idle_gc;
mod node_bindings;
mod poll_thread;
mod pump;
mod setup;

pub use bindings::document_script_path;
pub use bindings::BindOutcome;
pub use idle_gc::DEFAULT_IDLE_GC_INTERVAL;
pub use node_bindings::BindingsOptions;
pub use node_bindings::NodeBindings;
pub use pump::PumpState;
pub use setup::runtime_args;
pub use setup::EntryPoint;
