//! Idempotency keys for mutating requests.
//!
//! The server is the authority on deduplication; the client's obligation is a
//! fresh key per logical attempt, and reuse of the same key when the caller
//! retries that attempt. [`SendAttempt`] makes the distinction explicit: one
//! user action = one attempt = one key, however many times it is retried.

use std::fmt;
use uuid::Uuid;

/// An opaque, cryptographically-random token attached to every
/// state-mutating request via the `Idempotency-Key` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generate a fresh key. Each call yields a unique value.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One logical attempt to send a message.
///
/// The caller holds on to the attempt across retries so every retry carries
/// the same idempotency key; a brand-new user action builds a new attempt and
/// gets a new key.
#[derive(Debug, Clone)]
pub struct SendAttempt {
    content: String,
    use_rag: bool,
    key: IdempotencyKey,
}

impl SendAttempt {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            use_rag: true,
            key: IdempotencyKey::generate(),
        }
    }

    /// Toggle retrieval-augmented generation for this attempt.
    pub fn with_rag(mut self, use_rag: bool) -> Self {
        self.use_rag = use_rag;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn use_rag(&self) -> bool {
        self.use_rag
    }

    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }
}
