//! Process snapshots read from the operating system via `sysinfo`.

use super::{ProcessSnapshotProvider, SnapshotError};
use std::ffi::OsString;
use std::sync::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use wa_protocol::process_models::ProcessInfo;

/// Reads the live process table.
///
/// The `System` is kept between calls so command lines of long-lived
/// processes are only read once.
pub struct SysinfoSnapshotProvider {
    system: Mutex<System>,
}

impl Default for SysinfoSnapshotProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSnapshotProvider {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessSnapshotProvider for SysinfoSnapshotProvider {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, SnapshotError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| SnapshotError::Unavailable(format!("process table lock poisoned: {e}")))?;

        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new().with_cmd(UpdateKind::OnlyIfNotSet),
        );

        let processes = system
            .processes()
            .iter()
            // Threads show up as processes on Linux; they share the command
            // line of their process and must never be attach candidates.
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                parent_pid: process.parent().map(|parent| parent.as_u32()),
                command_line: join_command_line(process.cmd()),
            })
            .collect();

        Ok(processes)
    }
}

/// Rebuilds a command line from argv, quoting arguments with whitespace.
fn join_command_line(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| {
            let arg = arg.to_string_lossy();
            if arg.chars().any(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
