// Copyright 2018-2025 the Deno authors. MIT license.

use std::path::Path;
use std::path::PathBuf;

pub const BROWSER_ENTRY_SCRIPT: &str = "atom.js";
pub const RENDERER_ENTRY_SCRIPT: &str = "atom-renderer.js";

/// Which kind of process the bridge lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
  /// The process that owns application state and the primary I/O loop.
  Browser,
  /// A process hosting document contexts.
  #[default]
  Renderer,
}

impl Role {
  pub fn is_browser(self) -> bool {
    self == Role::Browser
  }

  pub fn entry_script_name(self) -> &'static str {
    match self {
      Role::Browser => BROWSER_ENTRY_SCRIPT,
      Role::Renderer => RENDERER_ENTRY_SCRIPT,
    }
  }
}

/// Platform whose bundle layout decides where resources live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  MacOs,
  Other,
}

impl Platform {
  pub const fn current() -> Self {
    if cfg!(target_os = "macos") {
      Platform::MacOs
    } else {
      Platform::Other
    }
  }
}

impl Default for Platform {
  fn default() -> Self {
    Self::current()
  }
}

/// The host's path service.
pub trait PathService {
  /// Path of the running executable. `argv[0]` is not trusted for this.
  fn executable_path(&self) -> Option<PathBuf>;

  fn exists(&self, path: &Path) -> bool;
}

/// [`PathService`] backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessPaths;

impl PathService for ProcessPaths {
  fn executable_path(&self) -> Option<PathBuf> {
    match std::env::current_exe() {
      Ok(path) => Some(path),
      Err(err) => {
        log::error!("Unable to read the current executable path: {err}");
        None
      }
    }
  }

  fn exists(&self, path: &Path) -> bool {
    path.is_file()
  }
}

fn dir_name(path: &Path) -> &Path {
  path.parent().unwrap_or(path)
}

/// Resources directory for an executable at `exe`.
///
/// On macOS the browser lives in `X.app/Contents/MacOS/` and renderers in
/// `X.app/Contents/Frameworks/H.app/Contents/MacOS/`; both share
/// `X.app/Contents/Resources`. Elsewhere resources sit next to the
/// executable.
pub fn resources_dir(exe: &Path, role: Role, platform: Platform) -> PathBuf {
  let levels = match (platform, role) {
    (Platform::MacOs, Role::Browser) => 2,
    (Platform::MacOs, Role::Renderer) => 5,
    (Platform::Other, _) => {
      return dir_name(exe).join("resources");
    }
  };
  let mut dir = exe;
  for _ in 0..levels {
    dir = dir_name(dir);
  }
  dir.join("Resources")
}

pub fn entry_script_path(resources: &Path, role: Role) -> PathBuf {
  resources
    .join("browser")
    .join("atom")
    .join(role.entry_script_name())
}
