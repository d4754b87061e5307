//! Task host that runs watch processes as local child processes.
//!
//! Each watch process leads its own process group, so terminating a task
//! also stops the application it spawned.

use crate::engine::inbox::EngineHandle;
use crate::host::{HostError, HostResult, TaskHost};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wa_protocol::ipc::HostEvent;
use wa_protocol::task_models::{BuildTaskRequest, TaskHandle};

struct RunningTask {
    pid: u32,
    kill: oneshot::Sender<()>,
}

type RunningTasks = Arc<Mutex<HashMap<TaskHandle, RunningTask>>>;

/// Spawns build tasks with `tokio::process` and reports their lifecycle
/// to the engine.
///
/// Output of the watch process is forwarded to the log so the stdout of
/// the hosting process stays free for the IPC protocol.
pub struct ProcessTaskHost {
    engine: EngineHandle,
    running: RunningTasks,
}

impl ProcessTaskHost {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of tasks still running.
    pub fn running_count(&self) -> usize {
        self.running.lock().map(|running| running.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TaskHost for ProcessTaskHost {
    async fn start_build_task(&self, request: BuildTaskRequest) -> HostResult<TaskHandle> {
        let program = which::which(&request.command)
            .map_err(|_| HostError::ExecutableNotFound(request.command.clone()))?;

        let mut command = Command::new(&program);
        command
            .args(&request.args)
            .envs(&request.env)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| HostError::Request(format!("{} exited immediately", request.label)))?;
        let handle = TaskHandle(Uuid::new_v4().to_string());
        info!(task = %request.task_id, pid, label = %request.label, "Watch process spawned");

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, request.label.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, request.label.clone());
        }

        let notified = self
            .engine
            .notify(HostEvent::TaskProcessStarted {
                task_id: request.task_id.clone(),
                pid,
            })
            .await;
        if notified.is_err() {
            abandon(pid, &request.task_id).await;
            return Err(HostError::Closed);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let registered = self
            .running
            .lock()
            .map(|mut running| {
                running.insert(
                    handle.clone(),
                    RunningTask {
                        pid,
                        kill: kill_tx,
                    },
                );
            })
            .map_err(|e| format!("task table lock poisoned: {e}"));
        if let Err(reason) = registered {
            abandon(pid, &request.task_id).await;
            return Err(HostError::Request(reason));
        }

        tokio::spawn(supervise(
            child,
            kill_rx,
            request.task_id,
            handle.clone(),
            self.engine.clone(),
            self.running.clone(),
        ));

        Ok(handle)
    }

    async fn terminate_task(&self, handle: &TaskHandle) -> HostResult<()> {
        let task = self
            .running
            .lock()
            .map_err(|e| HostError::Request(format!("task table lock poisoned: {e}")))?
            .remove(handle)
            .ok_or_else(|| HostError::UnknownTask(handle.clone()))?;

        let killed = kill_tree(task.pid).await;
        // The supervisor may have seen the exit already; that is fine.
        let _ = task.kill.send(());
        killed.map_err(HostError::from)
    }
}

/// Waits for the child to exit or to be killed and reports the end.
async fn supervise(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    task_id: String,
    handle: TaskHandle,
    engine: EngineHandle,
    running: RunningTasks,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => info!(task = %task_id, %status, "Watch process exited"),
            Err(e) => warn!(task = %task_id, error = %e, "Failed to wait for watch process"),
        },
        _ = kill_rx => {
            debug!(task = %task_id, "Terminating watch process");
            if let Err(e) = child.kill().await {
                warn!(task = %task_id, error = %e, "Failed to kill watch process");
            }
        }
    }

    if let Ok(mut running) = running.lock() {
        running.remove(&handle);
    }
    let _ = engine.notify(HostEvent::TaskEnded { task_id }).await;
}

/// Kills a watch process that could not be registered. The child handle
/// is dropped by the caller.
async fn abandon(pid: u32, task_id: &str) {
    if let Err(e) = kill_tree(pid).await {
        warn!(task = %task_id, pid, error = %e, "Failed to kill unregistered watch process");
    }
}

/// Kills the process group led by `pid`.
#[cfg(unix)]
async fn kill_tree(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("pid {pid} out of range")))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

/// Kills `pid` and all of its descendants.
#[cfg(not(unix))]
async fn kill_tree(pid: u32) -> io::Result<()> {
    let status = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}

fn forward_output<R>(stream: R, label: String)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "watch_output", task = %label, "{line}");
        }
    });
}
