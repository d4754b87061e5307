//! OS process snapshots.
//!
//! This module provides:
//! - The `ProcessSnapshotProvider` trait the engine polls every tick
//! - Subtree filtering over a flat process list
//! - A sysinfo-backed provider and an in-memory provider

pub mod static_provider;
pub mod sysinfo_provider;

pub use static_provider::StaticSnapshotProvider;
pub use sysinfo_provider::SysinfoSnapshotProvider;

use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::warn;
use wa_protocol::process_models::ProcessInfo;

/// Errors raised while enumerating processes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The process table could not be read.
    #[error("Process enumeration unavailable: {0}")]
    Unavailable(String),
}

/// Source of running OS processes.
///
/// Implementors only provide `enumerate`; `list_processes` turns
/// enumeration failures into an empty list so a failed scan means
/// "nothing to attach this tick", never a stopped engine.
pub trait ProcessSnapshotProvider: Send + Sync {
    /// Reads the full process table.
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, SnapshotError>;

    /// Lists running processes, optionally restricted to the transitive
    /// descendants of `parent`.
    ///
    /// Never fails: enumeration errors are logged and produce an empty
    /// list. The result contains each pid at most once and never the
    /// `parent` pid itself.
    fn list_processes(&self, parent: Option<u32>) -> Vec<ProcessInfo> {
        let all = match self.enumerate() {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "Process enumeration failed, treating snapshot as empty");
                return Vec::new();
            }
        };

        match parent {
            Some(pid) => descendants(&all, pid),
            None => dedup_by_pid(all),
        }
    }
}

/// Returns every transitive descendant of `root` in breadth-first order.
///
/// Intermediate shells and launchers are walked through, so a runtime
/// process started by `sh -> dotnet watch -> dotnet exec` is still found
/// from the shell's pid. Cycles in corrupt parent links are tolerated.
pub fn descendants(processes: &[ProcessInfo], root: u32) -> Vec<ProcessInfo> {
    let mut children: HashMap<u32, Vec<&ProcessInfo>> = HashMap::new();
    for process in processes {
        if let Some(parent) = process.parent_pid {
            if parent != process.pid {
                children.entry(parent).or_default().push(process);
            }
        }
    }

    let mut seen: HashSet<u32> = HashSet::new();
    seen.insert(root);
    let mut queue = VecDeque::from([root]);
    let mut result = Vec::new();

    while let Some(pid) = queue.pop_front() {
        for child in children.get(&pid).map(Vec::as_slice).unwrap_or_default() {
            if seen.insert(child.pid) {
                result.push((*child).clone());
                queue.push_back(child.pid);
            }
        }
    }

    result
}

fn dedup_by_pid(processes: Vec<ProcessInfo>) -> Vec<ProcessInfo> {
    let mut seen = HashSet::new();
    processes
        .into_iter()
        .filter(|process| seen.insert(process.pid))
        .collect()
}
