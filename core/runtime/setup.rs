// Copyright 2018-2025 the Deno authors. MIT license.

use crate::error::CoreError;
use crate::paths::entry_script_path;
use crate::paths::resources_dir;
use crate::paths::PathService;
use crate::paths::Platform;
use crate::paths::Role;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

/// Where the runtime's entry script was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
  pub executable: PathBuf,
  pub resources_dir: PathBuf,
  pub entry_script: PathBuf,
}

pub(crate) fn resolve_entry_point(
  paths: &dyn PathService,
  role: Role,
  platform: Platform,
) -> Result<EntryPoint, CoreError> {
  let executable = paths.executable_path().ok_or(CoreError::ExecutablePath)?;
  let resources_dir = resources_dir(&executable, role, platform);
  let entry_script = entry_script_path(&resources_dir, role);
  if !paths.exists(&entry_script) {
    return Err(CoreError::EntryScriptMissing(entry_script));
  }
  Ok(EntryPoint {
    executable,
    resources_dir,
    entry_script,
  })
}

/// Builds the argument vector handed to the embedded runtime: the host's
/// arguments as UTF-8 with `entry_script` spliced in as `argv[1]`.
///
/// Arguments that are not valid Unicode are converted lossily. An empty
/// `argv` gets `executable` as its program name.
pub fn runtime_args(
  argv: &[OsString],
  executable: &Path,
  entry_script: &Path,
) -> Vec<String> {
  let mut args = Vec::with_capacity(argv.len() + 2);
  args.extend(argv.iter().map(|arg| arg.to_string_lossy().into_owned()));
  if args.is_empty() {
    args.push(executable.to_string_lossy().into_owned());
  }
  args.insert(1, entry_script.to_string_lossy().into_owned());
  args
}
