use anyhow::{Context, Result};
use std::env;
use std::ffi::OsString;
use sysinfo::System;
use tracing::debug;

/// Returns true when no other running process shares this executable's name.
/// Consulted once at startup; the hotkey listener must not start when a
/// previous instance already owns the hotkey.
pub fn is_sole_instance() -> Result<bool> {
    let exe_name = current_exe_name()?;
    let own_pid = sysinfo::get_current_pid()
        .map_err(|err| anyhow::anyhow!("Failed to determine own pid: {err}"))?;

    let system = System::new_all();
    let duplicates = system
        .processes()
        .iter()
        .filter(|(pid, process)| **pid != own_pid && process.name() == exe_name.as_os_str())
        .count();

    if duplicates > 0 {
        debug!(duplicates, "Found other instance(s) of {:?}", exe_name);
    }

    Ok(duplicates == 0)
}

fn current_exe_name() -> Result<OsString> {
    let exe = env::current_exe().context("Failed to resolve current executable path")?;
    exe.file_name()
        .map(OsString::from)
        .context("Executable path has no file name")
}
