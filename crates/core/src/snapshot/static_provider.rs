//! In-memory process snapshot provider.
//!
//! Serves a process list that callers replace between ticks. Used by the
//! engine tests and by hosts that receive process lists from elsewhere.

use super::{ProcessSnapshotProvider, SnapshotError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use wa_protocol::process_models::ProcessInfo;

#[derive(Debug, Default)]
pub struct StaticSnapshotProvider {
    processes: Mutex<Vec<ProcessInfo>>,
    failing: AtomicBool,
}

impl StaticSnapshotProvider {
    pub fn new(processes: Vec<ProcessInfo>) -> Self {
        Self {
            processes: Mutex::new(processes),
            failing: AtomicBool::new(false),
        }
    }

    /// Replaces the process list returned by the next enumeration.
    pub fn set_processes(&self, processes: Vec<ProcessInfo>) {
        match self.processes.lock() {
            Ok(mut guard) => *guard = processes,
            Err(poisoned) => *poisoned.into_inner() = processes,
        }
    }

    /// Makes every enumeration fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl ProcessSnapshotProvider for StaticSnapshotProvider {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, SnapshotError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SnapshotError::Unavailable(
                "static provider set to fail".to_string(),
            ));
        }
        self.processes
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| SnapshotError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_processes_replaces_snapshot() {
        let provider = StaticSnapshotProvider::new(vec![ProcessInfo::new(1, None, "a")]);
        provider.set_processes(vec![
            ProcessInfo::new(2, None, "b"),
            ProcessInfo::new(3, Some(2), "c"),
        ]);

        let all = provider.enumerate().expect("enumerate");
        assert_eq!(all.len(), 2);
        assert_eq!(provider.list_processes(Some(2))[0].pid, 3);
    }

    #[test]
    fn test_failing_toggle() {
        let provider = StaticSnapshotProvider::default();
        provider.set_failing(true);
        assert!(provider.enumerate().is_err());
        provider.set_failing(false);
        assert_eq!(provider.enumerate(), Ok(Vec::new()));
    }
}
