//! Streaming consumer support: sink abstraction, state machine, abort handle.
//!
//! The [`ChatEventSink`] trait decouples the streaming send from presentation
//! concerns (terminal output, collection for tests). The state machine in
//! [`StreamPhase`] is the portable contract: Idle → Sending → Streaming →
//! {Completed | Failed | Cancelled}.

use crate::error::Error;
use crate::model::Message;
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::sync::watch;

/// Default bound on stream silence: no frame (not even a heartbeat) for this
/// long is treated as a transport failure. Deliberately much longer than any
/// sane server heartbeat interval.
pub const STREAM_SILENCE_TIMEOUT_SECS: u64 = 90;

/// Where a streaming send currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    /// The POST is in flight; no placeholder assistant message yet.
    Sending,
    /// Frames are being consumed into the placeholder assistant message.
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamPhase::Idle => "idle",
            StreamPhase::Sending => "sending",
            StreamPhase::Streaming => "streaming",
            StreamPhase::Completed => "completed",
            StreamPhase::Failed => "failed",
            StreamPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Terminal result of a streaming send.
///
/// `Failed` and `Cancelled` still carry the partial assistant message — a
/// truncated answer stays visible, it is never deleted.
#[derive(Debug)]
pub enum StreamEnd {
    /// `done` arrived; the message is finalized and immutable.
    Completed(Message),
    /// An `error` frame, transport break, or silence timeout. The caller may
    /// present a retry affordance.
    Failed { message: Message, error: Error },
    /// Caller-initiated abort. Not a failure.
    Cancelled(Message),
}

impl StreamEnd {
    pub fn phase(&self) -> StreamPhase {
        match self {
            StreamEnd::Completed(_) => StreamPhase::Completed,
            StreamEnd::Failed { .. } => StreamPhase::Failed,
            StreamEnd::Cancelled(_) => StreamPhase::Cancelled,
        }
    }

    /// The assistant message in its terminal state, partial or complete.
    pub fn message(&self) -> &Message {
        match self {
            StreamEnd::Completed(message) => message,
            StreamEnd::Failed { message, .. } => message,
            StreamEnd::Cancelled(message) => message,
        }
    }
}

/// Events emitted while a streaming send progresses.
#[derive(Debug, Clone)]
pub enum ChatEvent<'a> {
    /// The placeholder assistant message was created; streaming begins.
    Started { message_id: &'a str },
    /// An incremental chunk of assistant text, in arrival order.
    Delta(&'a str),
    /// The stream reached a terminal phase.
    Ended(StreamPhase),
}

/// Handles streaming events. Implementations own the presentation layer;
/// the engine stays agnostic to how deltas are displayed.
pub trait ChatEventSink {
    fn handle(&mut self, event: ChatEvent<'_>) -> io::Result<()>;
}

/// A sink that collects events for programmatic use or tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Accumulated delta text, in arrival order.
    pub text: String,
    /// Message id announced by `Started`, if streaming began.
    pub message_id: Option<String>,
    /// Terminal phase announced by `Ended`, if the stream finished.
    pub ended: Option<StreamPhase>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatEventSink for CollectingSink {
    fn handle(&mut self, event: ChatEvent<'_>) -> io::Result<()> {
        match event {
            ChatEvent::Started { message_id } => self.message_id = Some(message_id.to_string()),
            ChatEvent::Delta(chunk) => self.text.push_str(chunk),
            ChatEvent::Ended(phase) => self.ended = Some(phase),
        }
        Ok(())
    }
}

/// Cancellation handle for a streaming send.
///
/// Cloneable; `abort()` from anywhere (another task, a signal handler) moves
/// the stream to `Cancelled` at its next suspension point and drops the
/// transport. Aborting is idempotent and never an unhandled error.
#[derive(Debug, Clone)]
pub struct StreamAbort {
    tx: Arc<watch::Sender<bool>>,
}

impl StreamAbort {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `abort()` has been called (immediately if it already
    /// was).
    pub(crate) async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for checks the current value first, so an abort that happened
        // before subscription is not missed.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

impl Default for StreamAbort {
    fn default() -> Self {
        Self::new()
    }
}
