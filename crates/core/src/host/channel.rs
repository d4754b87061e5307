//! Host that forwards engine requests to an external IDE as protocol
//! events and resolves prompts from the IDE's answers.
//!
//! The IDE side sees newline-delimited JSON: `Event`s go out, `Op`s come
//! back. Prompt and picker requests carry a uuid that the matching answer
//! echoes.

use crate::host::{DebugHost, HostError, HostResult, ReattachPrompt, WorkspaceHost};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;
use wa_protocol::ipc::{Event, Op};
use wa_protocol::session_models::{DebugConfiguration, ReattachDecision};

enum PendingAnswer {
    Reattach(oneshot::Sender<ReattachDecision>),
    Project(oneshot::Sender<Option<String>>),
}

/// Debug, prompt and workspace host backed by an event channel.
#[derive(Clone)]
pub struct ChannelHost {
    roots: Vec<String>,
    events_tx: mpsc::Sender<Event>,
    pending: Arc<Mutex<HashMap<Uuid, PendingAnswer>>>,
}

impl ChannelHost {
    pub fn new(roots: Vec<String>, events_tx: mpsc::Sender<Event>) -> Self {
        Self {
            roots,
            events_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Routes an answer `Op` to the prompt waiting for it.
    ///
    /// Returns false if the op is not an answer or no prompt is waiting for
    /// its request id.
    pub fn answer(&self, op: &Op) -> bool {
        let (request_id, answer) = match op {
            Op::ReattachAnswer {
                request_id,
                decision,
            } => (request_id, Answer::Decision(*decision)),
            Op::ProjectSelected {
                request_id,
                project,
            } => (request_id, Answer::Project(project.clone())),
            _ => return false,
        };

        let Some(pending) = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(request_id))
        else {
            debug!(%request_id, "Answer for unknown request");
            return false;
        };

        match (pending, answer) {
            (PendingAnswer::Reattach(tx), Answer::Decision(decision)) => tx.send(decision).is_ok(),
            (PendingAnswer::Project(tx), Answer::Project(project)) => tx.send(project).is_ok(),
            _ => {
                warn!(%request_id, "Answer kind does not match the request");
                false
            }
        }
    }

    /// Number of prompts waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    fn register(&self, answer: PendingAnswer) -> HostResult<Uuid> {
        let request_id = Uuid::new_v4();
        self.pending
            .lock()
            .map_err(|e| HostError::Request(format!("pending table lock poisoned: {e}")))?
            .insert(request_id, answer);
        Ok(request_id)
    }

    fn forget(&self, request_id: &Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(request_id);
        }
    }

    fn emit(&self, event: Event) -> HostResult<()> {
        self.events_tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => HostError::Closed,
            mpsc::error::TrySendError::Full(_) => {
                HostError::Request("event channel is full".to_string())
            }
        })
    }
}

enum Answer {
    Decision(ReattachDecision),
    Project(Option<String>),
}

impl DebugHost for ChannelHost {
    fn start_debug_session(&self, config: DebugConfiguration) -> HostResult<()> {
        self.emit(Event::StartDebugSession { config })
    }

    fn disconnect_session(&self, name: &str) -> HostResult<()> {
        self.emit(Event::DisconnectSession {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl ReattachPrompt for ChannelHost {
    async fn prompt_reattach(&self, project: &str, pid: u32) -> ReattachDecision {
        let (tx, rx) = oneshot::channel();
        let request_id = match self.register(PendingAnswer::Reattach(tx)) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Cannot prompt for reattach");
                return ReattachDecision::No;
            }
        };

        let event = Event::PromptReattach {
            request_id,
            project: project.to_string(),
            pid,
        };
        if self.events_tx.send(event).await.is_err() {
            self.forget(&request_id);
            return ReattachDecision::No;
        }

        rx.await.unwrap_or(ReattachDecision::No)
    }
}

#[async_trait]
impl WorkspaceHost for ChannelHost {
    fn list_workspace_roots(&self) -> Vec<String> {
        self.roots.clone()
    }

    async fn select_project(&self, candidates: &[String]) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        let request_id = self.register(PendingAnswer::Project(tx)).ok()?;

        let event = Event::SelectProject {
            request_id,
            candidates: candidates.to_vec(),
        };
        if self.events_tx.send(event).await.is_err() {
            self.forget(&request_id);
            return None;
        }

        rx.await.ok().flatten()
    }

    fn notify(&self, message: &str) {
        if let Err(e) = self.emit(Event::Notice {
            message: message.to_string(),
        }) {
            warn!(error = %e, message, "Failed to deliver notice");
        }
    }
}

/// Encodes an event as one protocol line, without the trailing newline.
pub fn encode_event(event: &Event) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Decodes one protocol line into an operation.
pub fn decode_op(line: &str) -> serde_json::Result<Op> {
    serde_json::from_str(line.trim())
}
