//! Mock host implementations for deterministic testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wa_core::host::{DebugHost, HostError, HostResult, ReattachPrompt, TaskHost, WorkspaceHost};
use wa_protocol::session_models::{DebugConfiguration, ReattachDecision};
use wa_protocol::task_models::{BuildTaskRequest, TaskHandle};

/// Records every debug session request.
#[derive(Default)]
pub struct MockDebugHost {
    pub started: Mutex<Vec<DebugConfiguration>>,
    pub disconnected: Mutex<Vec<String>>,
    pub fail_attach: AtomicBool,
}

impl MockDebugHost {
    pub fn started_pids(&self) -> Vec<u32> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|config| config.process_id)
            .collect()
    }

    #[allow(dead_code)]
    pub fn disconnected_names(&self) -> Vec<String> {
        self.disconnected.lock().unwrap().clone()
    }
}

impl DebugHost for MockDebugHost {
    fn start_debug_session(&self, config: DebugConfiguration) -> HostResult<()> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(HostError::Request("attach refused".to_string()));
        }
        self.started.lock().unwrap().push(config);
        Ok(())
    }

    fn disconnect_session(&self, name: &str) -> HostResult<()> {
        self.disconnected.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Answers reattach prompts from a script, after an optional delay.
pub struct MockPrompt {
    answers: Mutex<VecDeque<ReattachDecision>>,
    fallback: ReattachDecision,
    delay: Duration,
    pub asked: Mutex<Vec<(String, u32)>>,
}

impl MockPrompt {
    pub fn answering(decision: ReattachDecision) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            fallback: decision,
            delay: Duration::ZERO,
            asked: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn scripted(answers: &[ReattachDecision], delay: Duration) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            fallback: ReattachDecision::No,
            delay,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked_count(&self) -> usize {
        self.asked.lock().unwrap().len()
    }
}

#[async_trait]
impl ReattachPrompt for MockPrompt {
    async fn prompt_reattach(&self, project: &str, pid: u32) -> ReattachDecision {
        self.asked.lock().unwrap().push((project.to_string(), pid));
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        answer
    }
}

/// Records launch and terminate requests without spawning anything.
#[derive(Default)]
pub struct MockTaskHost {
    pub requests: Mutex<Vec<BuildTaskRequest>>,
    pub terminated: Mutex<Vec<TaskHandle>>,
    pub fail_launch: AtomicBool,
    pub fail_terminate: AtomicBool,
    counter: AtomicUsize,
}

impl MockTaskHost {
    pub fn launch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn terminated_count(&self) -> usize {
        self.terminated.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskHost for MockTaskHost {
    async fn start_build_task(&self, request: BuildTaskRequest) -> HostResult<TaskHandle> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(HostError::ExecutableNotFound(request.command));
        }
        self.requests.lock().unwrap().push(request);
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(TaskHandle(format!("handle-{n}")))
    }

    async fn terminate_task(&self, handle: &TaskHandle) -> HostResult<()> {
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(HostError::UnknownTask(handle.clone()));
        }
        self.terminated.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

/// Fixed workspace roots; collects notices.
pub struct MockWorkspace {
    pub roots: Vec<String>,
    pub notices: Mutex<Vec<String>>,
}

impl MockWorkspace {
    pub fn new(roots: &[&str]) -> Self {
        Self {
            roots: roots.iter().map(|r| r.to_string()).collect(),
            notices: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WorkspaceHost for MockWorkspace {
    fn list_workspace_roots(&self) -> Vec<String> {
        self.roots.clone()
    }

    async fn select_project(&self, candidates: &[String]) -> Option<String> {
        candidates.first().cloned()
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}
