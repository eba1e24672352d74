//! Process discovery through `/proc`.
//!
//! Wine and Proton games show up as ordinary Linux processes: the kernel
//! `comm` is the executable name (truncated to 15 bytes) and `argv[0]` is
//! usually the Windows path, e.g. `C:\Program Files\Diablo IV\Diablo IV.exe`.
//! A process matches a name when either of those agrees with it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MemoryError, Result};
use crate::maps::{self, MemoryRegion, ModuleInfo};

/// Kernel limit on `comm` length, excluding the trailing NUL.
const COMM_MAX_LEN: usize = 15;

/// Root of the proc filesystem.
const PROC_ROOT: &str = "/proc";

/// A process seen while scanning `/proc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Kernel `comm` name.
    pub name: String,
    /// Final path component of `argv[0]`, split on both `/` and `\`.
    pub exe_name: Option<String>,
    pub cmdline: Vec<String>,
}

impl ProcessInfo {
    /// Whether this process is the one called `name`.
    pub fn matches(&self, name: &str) -> bool {
        if self.exe_name.as_deref() == Some(name) || self.name == name {
            return true;
        }
        // `comm` is truncated, so a long name can only match on its prefix.
        name.len() > COMM_MAX_LEN && self.name.len() == COMM_MAX_LEN && name.starts_with(&self.name)
    }
}

/// Split a raw `/proc/<pid>/cmdline` buffer into arguments.
pub fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

/// Last component of a Unix or Windows path.
pub fn exe_basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn proc_dir(pid: u32) -> PathBuf {
    Path::new(PROC_ROOT).join(pid.to_string())
}

fn read_process(pid: u32) -> Result<ProcessInfo> {
    let dir = proc_dir(pid);
    let name = fs::read_to_string(dir.join("comm"))?.trim_end().to_string();
    let cmdline = parse_cmdline(&fs::read(dir.join("cmdline"))?);
    let exe_name = cmdline
        .first()
        .map(|argv0| exe_basename(argv0).to_string())
        .filter(|s| !s.is_empty());

    Ok(ProcessInfo {
        pid,
        name,
        exe_name,
        cmdline,
    })
}

/// Enumerate every process currently visible in `/proc`.
///
/// Processes that exit while the scan is running are skipped.
pub fn list_processes() -> Result<Vec<ProcessInfo>> {
    let mut processes = Vec::new();

    for entry in fs::read_dir(PROC_ROOT)? {
        let entry = entry?;
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };

        match read_process(pid) {
            Ok(info) => processes.push(info),
            Err(e) => tracing::trace!(pid, error = %e, "Skipping process"),
        }
    }

    processes.sort_by_key(|p| p.pid);
    Ok(processes)
}

/// Find a running process by name. The lowest matching pid wins.
pub fn find_process(name: &str) -> Result<ProcessInfo> {
    list_processes()?
        .into_iter()
        .find(|p| p.matches(name))
        .ok_or_else(|| MemoryError::ProcessNotFound(name.to_string()))
}

/// A live process the logger is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    /// Attach to `pid`, failing if it is not running.
    pub fn attach(pid: u32) -> Result<Self> {
        let handle = Self { pid };
        if !handle.is_alive() {
            return Err(MemoryError::ProcessGone(pid));
        }
        Ok(handle)
    }

    /// Find `name` and attach to it.
    pub fn open(name: &str) -> Result<Self> {
        let info = find_process(name)?;
        tracing::debug!(pid = info.pid, name, "Found process");
        Self::attach(info.pid)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        proc_dir(self.pid).is_dir()
    }

    /// Current memory map of the process.
    pub fn regions(&self) -> Result<Vec<MemoryRegion>> {
        maps::read_maps(self.pid)
    }

    /// Locate a loaded module (executable or library) by file name.
    pub fn module(&self, name: &str) -> Result<ModuleInfo> {
        let regions = self.regions()?;
        maps::find_module(&regions, name).ok_or_else(|| MemoryError::ModuleNotFound {
            module: name.to_string(),
            pid: self.pid,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn cmdline_splits_on_nul() {
        let raw = b"C:\\Games\\Diablo IV\\Diablo IV.exe\0-launch\0\0";
        let args = parse_cmdline(raw);
        assert_eq!(args, vec!["C:\\Games\\Diablo IV\\Diablo IV.exe", "-launch"]);
    }

    #[test]
    fn basename_handles_both_separators() {
        assert_eq!(exe_basename("C:\\Games\\Diablo IV\\Diablo IV.exe"), "Diablo IV.exe");
        assert_eq!(exe_basename("/usr/bin/wine64"), "wine64");
        assert_eq!(exe_basename("plain"), "plain");
    }

    #[test]
    fn matches_on_exe_name_or_truncated_comm() {
        let info = ProcessInfo {
            pid: 1,
            name: "Diablo IV.exe".into(),
            exe_name: None,
            cmdline: vec![],
        };
        assert!(info.matches("Diablo IV.exe"));
        assert!(!info.matches("Diablo"));
        // Only a full-length `comm` can be a truncated name.
        assert!(!info.matches("Diablo IV.exe (x64)"));

        let long = ProcessInfo {
            pid: 2,
            name: "VeryLongProcess".into(),
            exe_name: Some("wine-preloader".into()),
            cmdline: vec![],
        };
        assert!(long.matches("VeryLongProcessName.exe"));
        assert!(!long.matches("AnotherLongProcessName.exe"));
        assert!(long.matches("wine-preloader"));
    }

    #[test]
    fn finds_current_process() {
        let own = read_process(std::process::id()).expect("own process is readable");
        let found = find_process(&own.name).expect("own name should be found");
        assert!(found.matches(&own.name));
        assert!(list_processes()
            .expect("listing should succeed")
            .iter()
            .any(|p| p.pid == std::process::id()));
    }

    #[test]
    fn missing_process_is_not_found() {
        assert_matches!(
            find_process("definitely-not-running-d4log.exe"),
            Err(MemoryError::ProcessNotFound(name)) if name == "definitely-not-running-d4log.exe"
        );
    }

    #[test]
    fn attach_checks_liveness() {
        let handle = ProcessHandle::attach(std::process::id()).expect("self is alive");
        assert!(handle.is_alive());
        assert_matches!(ProcessHandle::attach(u32::MAX), Err(MemoryError::ProcessGone(_)));
    }
}
