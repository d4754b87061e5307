//! Test fixtures: process trees and an engine wired to mock hosts.

use super::mock_hosts::{MockDebugHost, MockPrompt, MockTaskHost, MockWorkspace};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wa_core::snapshot::StaticSnapshotProvider;
use wa_core::tasks::TaskRegistry;
use wa_core::{AttachmentEngine, Collaborators, EngineHandle, TickReport};
use wa_protocol::config_models::{EngineConfig, WatchConfig};
use wa_protocol::ipc::HostEvent;
use wa_protocol::process_models::ProcessInfo;
use wa_protocol::session_models::ReattachDecision;

pub const ROOT: &str = "/repo";
pub const API_PROJECT: &str = "/repo/Api/Api.csproj";
pub const WATCH_PID: u32 = 10;

/// Session name the engine gives the Api project's session for `pid`.
pub fn api_session(pid: u32) -> String {
    format!("Api - .NET Core Attach - AUTO - {pid}")
}

/// A `dotnet watch` process for the Api project with the given runtime
/// children, plus build tool noise and an unrelated process.
pub fn api_tree(runtime_pids: &[u32]) -> Vec<ProcessInfo> {
    let mut processes = vec![
        ProcessInfo::new(1, None, "/sbin/init"),
        ProcessInfo::new(
            WATCH_PID,
            Some(1),
            format!("dotnet watch --project {API_PROJECT} run"),
        ),
        ProcessInfo::new(
            20,
            Some(WATCH_PID),
            r#"dotnet exec "/usr/share/dotnet/sdk/8.0.100/MSBuild.dll" /repo/Api/Api.csproj"#,
        ),
        ProcessInfo::new(30, Some(1), r#"dotnet exec "/elsewhere/bin/Other.dll""#),
    ];
    for &pid in runtime_pids {
        processes.push(ProcessInfo::new(
            pid,
            Some(WATCH_PID),
            r#"dotnet exec "/repo/Api/bin/Debug/Api.dll""#,
        ));
    }
    processes
}

/// An engine wired to mock hosts, driven tick by tick.
pub struct Harness {
    pub engine: AttachmentEngine,
    pub handle: EngineHandle,
    pub snapshot: Arc<StaticSnapshotProvider>,
    pub debug: Arc<MockDebugHost>,
    pub prompt: Arc<MockPrompt>,
    pub tasks: Arc<MockTaskHost>,
    pub workspace: Arc<MockWorkspace>,
}

impl Harness {
    pub fn new(prompt: MockPrompt) -> Self {
        Self::with_config(EngineConfig::default(), prompt)
    }

    pub fn with_config(config: EngineConfig, prompt: MockPrompt) -> Self {
        let (handle, inbox) = EngineHandle::channel();
        let snapshot = Arc::new(StaticSnapshotProvider::default());
        let debug = Arc::new(MockDebugHost::default());
        let prompt = Arc::new(prompt);
        let tasks = Arc::new(MockTaskHost::default());
        let workspace = Arc::new(MockWorkspace::new(&[ROOT]));

        let engine = AttachmentEngine::new(
            config,
            Collaborators {
                snapshot: snapshot.clone(),
                workspace: workspace.clone(),
                tasks: tasks.clone(),
                debug: debug.clone(),
                prompt: prompt.clone(),
            },
            inbox,
        );

        Self {
            engine,
            handle,
            snapshot,
            debug,
            prompt,
            tasks,
            workspace,
        }
    }

    #[allow(dead_code)]
    pub fn answering(decision: ReattachDecision) -> Self {
        Self::new(MockPrompt::answering(decision))
    }

    /// Starts the Api watch task and reports its watch process.
    pub async fn start_api_task(&mut self) -> String {
        let watch = WatchConfig {
            name: "api".to_string(),
            ..Default::default()
        };
        self.handle
            .start_watch(ROOT.to_string(), API_PROJECT.to_string(), watch)
            .await
            .expect("Failed to request watch task");
        self.settle().await;

        let task_id = TaskRegistry::task_id(ROOT, API_PROJECT);
        self.event(HostEvent::TaskProcessStarted {
            task_id: task_id.clone(),
            pid: WATCH_PID,
        })
        .await;
        self.settle().await;
        task_id
    }

    /// Delivers a host event and applies it.
    pub async fn event(&mut self, event: HostEvent) {
        self.handle.notify(event).await.expect("Engine inbox closed");
        self.engine.drain_inbox();
    }

    /// Lets spawned continuations run, then applies what they sent.
    pub async fn settle(&mut self) -> usize {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.engine.drain_inbox()
    }

    /// Advances (paused) time and applies expired timers.
    pub async fn advance(&mut self, ms: u64) -> usize {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.engine.drain_inbox()
    }

    pub fn tick_with(&mut self, processes: Vec<ProcessInfo>) -> TickReport {
        self.snapshot.set_processes(processes);
        self.engine.tick()
    }
}

/// Create a temporary workspace with project files at the given relative
/// paths.
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_workspace(projects: &[&str]) -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    for project in projects {
        let path = temp_dir.path().join(project);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, "<Project Sdk=\"Microsoft.NET.Sdk\" />")?;
    }
    Ok(temp_dir)
}
