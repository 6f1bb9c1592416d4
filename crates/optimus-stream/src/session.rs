//! Stream session controller.
//!
//! The controller owns the single active-session slot of a conversation. Each
//! session runs a pump task that opens the transfer, frames and parses the
//! body, and sends tagged [`SessionUpdate`]s back over one channel. The caller
//! feeds those updates to [`SessionController::apply`] on its own event loop,
//! so all timeline mutation happens there.
//!
//! Cancellation is cooperative. A superseded pump may still deliver a few
//! updates before it notices; they carry the old session id and are dropped.

use std::pin::{pin, Pin};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt as _};
use optimus_core::{ChatTranscript, MessageId, ModelOption, Role, SessionId};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::AgentQueryRequest;
use crate::error::Result;
use crate::event::{parse_record, AgentEvent};
use crate::frame;
use crate::timeline::{Change, Timeline};

/// Raw response body of a streamed query.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens the byte stream for a query.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Start the transfer for `request`.
    async fn open_stream(&self, request: &AgentQueryRequest) -> Result<ByteStream>;
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// The transfer is running.
    Active,
    /// The transfer ended normally.
    Completed,
    /// The session was cancelled or superseded.
    Aborted,
    /// The transfer failed.
    Failed,
}

impl SessionState {
    /// Returns true once the session can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Everything observable about one session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session id.
    pub id: SessionId,
    /// Lifecycle state.
    pub state: SessionState,
    /// Steps and answer text received so far.
    pub timeline: Timeline,
    /// Transport error message, once failed.
    pub error: Option<String>,
}

impl SessionSnapshot {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Active,
            timeline: Timeline::new(),
            error: None,
        }
    }

    /// Whether the transfer is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

/// A message from a pump task to the controller.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// Session the update belongs to.
    pub session_id: SessionId,
    /// What happened.
    pub kind: UpdateKind,
}

/// Payload of a [`SessionUpdate`].
#[derive(Debug, Clone)]
pub enum UpdateKind {
    /// A parsed event.
    Event(AgentEvent),
    /// The transfer ended normally.
    Ended,
    /// The transfer failed with this message.
    Failed(String),
    /// The pump observed cancellation and stopped.
    Aborted,
}

/// Outcome of [`SessionController::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The update belonged to a superseded or settled session and was dropped.
    Stale,
    /// The timeline changed.
    Progress(Change),
    /// The session completed. Carries the transcript entry the answer was
    /// committed as, if there was an answer.
    Completed {
        /// Committed assistant entry.
        committed: Option<MessageId>,
    },
    /// The session failed.
    Failed {
        /// Human-readable transport error.
        message: String,
    },
    /// The session stopped after cancellation.
    Aborted,
}

impl Applied {
    /// Whether the update moved the session to a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Aborted
        )
    }

    /// Whether visible content grew.
    #[must_use]
    pub const fn is_growth(&self) -> bool {
        match self {
            Self::Progress(change) => change.is_growth(),
            Self::Completed { committed } => committed.is_some(),
            _ => false,
        }
    }
}

/// Handle to one session.
///
/// Gives pull access to the latest snapshot, push access through a watch
/// subscription, and cancellation.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    cancel: CancellationToken,
    view: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.view.borrow().clone()
    }

    /// Receiver notified after every applied change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.view.clone()
    }

    /// Ask the transfer to stop. Idempotent and does not wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct ActiveSession {
    handle: SessionHandle,
    view: watch::Sender<SessionSnapshot>,
}

impl ActiveSession {
    fn state(&self) -> SessionState {
        self.view.borrow().state
    }

    fn abort(&self) {
        self.handle.cancel();
        self.view.send_if_modified(|snap| {
            if snap.state.is_terminal() {
                return false;
            }
            snap.state = SessionState::Aborted;
            true
        });
    }
}

/// Owns the active-session slot and the chat transcript of one conversation.
pub struct SessionController {
    transport: Arc<dyn AgentTransport>,
    updates_tx: mpsc::Sender<SessionUpdate>,
    updates_rx: mpsc::Receiver<SessionUpdate>,
    current: Option<ActiveSession>,
    transcript: ChatTranscript,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("current", &self.current.as_ref().map(|s| s.handle.id))
            .field("transcript_len", &self.transcript.len())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Create a controller with an update channel of the given capacity.
    #[must_use]
    pub fn new(transport: Arc<dyn AgentTransport>, capacity: usize) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(capacity.max(1));
        Self {
            transport,
            updates_tx,
            updates_rx,
            current: None,
            transcript: ChatTranscript::new(),
        }
    }

    /// Validate and record the operator's input, then start a session for it.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::EmptyQuery` if the input is blank. Nothing is
    /// recorded and no session starts in that case.
    pub fn submit(&mut self, text: &str, model: &ModelOption) -> Result<SessionHandle> {
        let request = AgentQueryRequest::new(text, model)?;
        self.transcript.push(Role::User, request.query.clone());
        Ok(self.start(request))
    }

    /// Start a session, superseding any session still running.
    ///
    /// The previous session is cancelled and marked aborted before the new
    /// transfer is spawned. Its timeline is discarded.
    pub fn start(&mut self, request: AgentQueryRequest) -> SessionHandle {
        if let Some(previous) = self.current.take() {
            if previous.state() == SessionState::Active {
                info!(session_id = %previous.handle.id, "superseding active session");
            }
            previous.abort();
        }

        let id = SessionId::generate();
        let cancel = CancellationToken::new();
        let (view, view_rx) = watch::channel(SessionSnapshot::new(id));
        let handle = SessionHandle {
            id,
            cancel: cancel.clone(),
            view: view_rx,
        };

        info!(session_id = %id, model = %request.model_name, "starting session");
        tokio::spawn(pump(
            Arc::clone(&self.transport),
            request,
            id,
            cancel,
            self.updates_tx.clone(),
        ));

        self.current = Some(ActiveSession {
            handle: handle.clone(),
            view,
        });
        handle
    }

    /// Wait for the next update from any pump.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.updates_rx.recv().await
    }

    /// Apply one update to the active session.
    ///
    /// Updates for any other session, or for a session that already settled or
    /// was cancelled, are dropped.
    pub fn apply(&mut self, update: SessionUpdate) -> Applied {
        let Some(session) = self.current.as_ref() else {
            debug!(session_id = %update.session_id, "dropping update with no current session");
            return Applied::Stale;
        };
        if session.handle.id != update.session_id {
            debug!(
                session_id = %update.session_id,
                current = %session.handle.id,
                "dropping update from superseded session"
            );
            return Applied::Stale;
        }
        if session.state().is_terminal() {
            return Applied::Stale;
        }
        if session.handle.is_cancelled() && !matches!(update.kind, UpdateKind::Aborted) {
            session.abort();
            info!(session_id = %update.session_id, "session aborted");
            return Applied::Aborted;
        }

        match update.kind {
            UpdateKind::Event(event) => {
                let mut change = Change::default();
                session.view.send_modify(|snap| {
                    change = snap.timeline.apply(event);
                });
                Applied::Progress(change)
            }
            UpdateKind::Ended => {
                let mut answer = String::new();
                session.view.send_modify(|snap| {
                    snap.timeline.finish();
                    snap.state = SessionState::Completed;
                    snap.timeline.streaming_answer().clone_into(&mut answer);
                });
                let committed =
                    (!answer.is_empty()).then(|| self.transcript.push(Role::Assistant, answer));
                info!(session_id = %update.session_id, "session completed");
                Applied::Completed { committed }
            }
            UpdateKind::Failed(message) => {
                session.view.send_modify(|snap| {
                    snap.state = SessionState::Failed;
                    snap.error = Some(message.clone());
                });
                warn!(session_id = %update.session_id, error = %message, "session failed");
                Applied::Failed { message }
            }
            UpdateKind::Aborted => {
                session.abort();
                info!(session_id = %update.session_id, "session aborted");
                Applied::Aborted
            }
        }
    }

    /// Cancel the active session, if any. Returns true if one was running.
    pub fn cancel_active(&mut self) -> bool {
        match self.current.as_ref() {
            Some(session) if session.state() == SessionState::Active => {
                session.abort();
                info!(session_id = %session.handle.id, "session cancelled");
                true
            }
            _ => false,
        }
    }

    /// The durable conversation.
    #[must_use]
    pub const fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    /// Handle of the most recent session, running or settled.
    #[must_use]
    pub fn handle(&self) -> Option<&SessionHandle> {
        self.current.as_ref().map(|s| &s.handle)
    }

    /// Borrow the snapshot of the most recent session.
    #[must_use]
    pub fn current(&self) -> Option<watch::Ref<'_, SessionSnapshot>> {
        self.current.as_ref().map(|s| s.view.borrow())
    }

    /// Whether a session is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.state() == SessionState::Active)
    }
}

/// Drive one transfer and report its outcome.
async fn pump(
    transport: Arc<dyn AgentTransport>,
    request: AgentQueryRequest,
    session_id: SessionId,
    cancel: CancellationToken,
    tx: mpsc::Sender<SessionUpdate>,
) {
    let kind = tokio::select! {
        biased;
        () = cancel.cancelled() => UpdateKind::Aborted,
        outcome = forward_events(transport.as_ref(), &request, session_id, &tx) => match outcome {
            Ok(()) => UpdateKind::Ended,
            Err(e) => UpdateKind::Failed(e.to_string()),
        },
    };
    debug!(session_id = %session_id, outcome = ?kind, "pump finished");

    // The receiver only goes away with the controller.
    let _ = tx.send(SessionUpdate { session_id, kind }).await;
}

/// Frame, parse and forward events until the body ends or a final answer arrives.
async fn forward_events(
    transport: &dyn AgentTransport,
    request: &AgentQueryRequest,
    session_id: SessionId,
    tx: &mpsc::Sender<SessionUpdate>,
) -> Result<()> {
    let bytes = transport.open_stream(request).await?;
    let mut records = pin!(frame::records(bytes));

    while let Some(record) = records.try_next().await? {
        for event in parse_record(&record) {
            let is_final = event.is_final();
            let update = SessionUpdate {
                session_id,
                kind: UpdateKind::Event(event),
            };
            if tx.send(update).await.is_err() || is_final {
                return Ok(());
            }
        }
    }
    Ok(())
}
