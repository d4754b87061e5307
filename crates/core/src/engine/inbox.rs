//! Message inbox of the attachment engine.
//!
//! Everything that happens outside a tick (host lifecycle events, timer
//! expiries, prompt answers, launch results) is sent here and applied by
//! the engine at the start of its next tick. Once the engine is dropped
//! the receiver is gone and late messages are discarded.

use crate::host::HostError;
use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use wa_protocol::config_models::WatchConfig;
use wa_protocol::ipc::HostEvent;
use wa_protocol::session_models::ReattachDecision;
use wa_protocol::task_models::TaskHandle;

/// Capacity of the engine inbox.
pub const INBOX_CAPACITY: usize = 256;

/// A message applied by the engine at a tick boundary.
#[derive(Debug)]
pub enum Inbound {
    /// Lifecycle notification from a host.
    Host(HostEvent),

    /// Register and launch a watch task for a resolved project file.
    StartWatch {
        workspace_root: String,
        project_file: String,
        watch: WatchConfig,
    },

    /// The task host finished launching a task.
    TaskLaunched {
        task_id: String,
        result: Result<TaskHandle, HostError>,
    },

    /// The disconnect debounce of a terminating session elapsed.
    DisconnectDebounceElapsed { pid: u32, epoch: u64 },

    /// The eviction debounce of a disconnected session elapsed.
    EvictionElapsed { pid: u32, epoch: u64 },

    /// The user answered a reattach prompt.
    ReattachAnswered {
        disconnected_pid: u32,
        candidate_pid: u32,
        decision: ReattachDecision,
    },

    /// A stop requested from a reattach prompt finished.
    StopConfirmed {
        pid: u32,
        epoch: u64,
        terminated: bool,
    },
}

/// Cloneable handle used by hosts and the CLI to talk to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Inbound>,
    stop: Arc<Notify>,
}

/// Receiving half handed to `AttachmentEngine::new`.
#[derive(Debug)]
pub struct EngineInbox {
    pub(crate) rx: mpsc::Receiver<Inbound>,
    pub(crate) stop: Arc<Notify>,
    pub(crate) scheduler: Scheduler,
}

impl EngineHandle {
    /// Creates a handle and the inbox it feeds.
    ///
    /// Hosts usually need a handle before the engine exists, so the
    /// channel is created first and the inbox is passed to the engine.
    pub fn channel() -> (EngineHandle, EngineInbox) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let stop = Arc::new(Notify::new());
        let handle = EngineHandle {
            tx: tx.clone(),
            stop: stop.clone(),
        };
        let inbox = EngineInbox {
            rx,
            stop,
            scheduler: Scheduler { tx },
        };
        (handle, inbox)
    }

    /// Delivers a lifecycle event.
    ///
    /// # Errors
    ///
    /// Fails once the engine has stopped.
    pub async fn notify(&self, event: HostEvent) -> Result<()> {
        self.send(Inbound::Host(event)).await
    }

    /// Asks the engine to register and launch a watch task.
    pub async fn start_watch(
        &self,
        workspace_root: String,
        project_file: String,
        watch: WatchConfig,
    ) -> Result<()> {
        self.send(Inbound::StartWatch {
            workspace_root,
            project_file,
            watch,
        })
        .await
    }

    /// Signals `AttachmentEngine::run` to stop.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) async fn send(&self, message: Inbound) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| anyhow!("attachment engine has stopped"))
    }
}

/// Runs timers and host continuations that report back to the inbox.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: mpsc::Sender<Inbound>,
}

impl Scheduler {
    /// Delivers `message` after `delay`.
    pub fn after(&self, delay: Duration, message: Inbound) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message).await;
        });
    }

    /// Runs `work` in the background and delivers the message it resolves to.
    pub fn spawn<F>(&self, work: F)
    where
        F: Future<Output = Inbound> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let message = work.await;
            let _ = tx.send(message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_delivers_after_delay() {
        let (_handle, mut inbox) = EngineHandle::channel();

        inbox.scheduler.after(
            Duration::from_millis(2000),
            Inbound::EvictionElapsed { pid: 7, epoch: 1 },
        );

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(inbox.rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let message = inbox.rx.try_recv().expect("Message should be delivered");
        assert!(matches!(message, Inbound::EvictionElapsed { pid: 7, epoch: 1 }));
    }

    #[tokio::test]
    async fn test_handle_fails_after_inbox_dropped() {
        let (handle, inbox) = EngineHandle::channel();
        drop(inbox);

        let result = handle
            .notify(HostEvent::TaskEnded {
                task_id: "t".to_string(),
            })
            .await;

        assert!(result.is_err());
        assert!(handle.is_closed());
    }
}
