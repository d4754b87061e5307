//! Custom assertion helpers for engine tests.

use wa_core::AttachmentEngine;
use wa_protocol::session_models::SessionStatus;

/// Assert the engine's view of a pid.
#[allow(dead_code)]
pub fn assert_status(engine: &AttachmentEngine, pid: u32, expected: Option<SessionStatus>) {
    assert_eq!(
        engine.sessions().status(pid),
        expected,
        "unexpected session status for pid {pid}"
    );
}

/// Assert the engine tracks no session for any of `pids`.
#[allow(dead_code)]
pub fn assert_untracked(engine: &AttachmentEngine, pids: &[u32]) {
    for &pid in pids {
        assert_status(engine, pid, None);
    }
}
