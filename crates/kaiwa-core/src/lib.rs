//! kaiwa-core: Embeddable session and streaming chat client engine.
//!
//! Provides token/session management with transparent refresh, cursor
//! pagination, an SSE frame parser, a streaming send state machine with
//! optimistic local state, and the [`ChatClient`] facade tying them together.
//!
//! # Quick Start
//!
//! ```no_run
//! use kaiwa_core::{
//!     ChatClient, ClientConfig, CollectingSink, MemoryCredentialStore, ReqwestHttp, SendAttempt,
//!     StreamAbort,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kaiwa_core::Error> {
//!     let http = ReqwestHttp::new("http://localhost:8000")?;
//!     let client = ChatClient::new(
//!         http,
//!         Box::new(MemoryCredentialStore::new()),
//!         ClientConfig::default(),
//!     );
//!     client.login("alice", "hunter2").await?;
//!
//!     let chat = client.create_chat(Some("hello"), &[]).await?;
//!     let mut sink = CollectingSink::new();
//!     let attempt = SendAttempt::new("Hi there!");
//!     client
//!         .send_streaming(&chat.id, &attempt, &StreamAbort::new(), &mut sink)
//!         .await?;
//!     println!("Response: {}", sink.text);
//!     Ok(())
//! }
//! ```
//!
//! For lower-level access, use the individual modules directly.

pub mod auth;
mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod idempotency;
pub mod model;
pub mod page;
pub mod sse;
pub mod store;
pub mod stream;
pub mod wire;

// Re-export the facade
pub use client::ChatClient;

// Re-export commonly used types
pub use auth::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionManager, TokenPair,
};
pub use config::ClientConfig;
pub use error::Error;
pub use http::{HttpClient, HttpRequest, HttpResponse, IDEMPOTENCY_HEADER, ReqwestHttp};
pub use idempotency::{IdempotencyKey, SendAttempt};
pub use model::{Chat, Message, MessagePage, Role};
pub use page::{LoadMode, Page};
pub use sse::{FrameEvent, FrameMode, FrameParser, FrameStream, StreamFrame};
pub use store::ChatStore;
pub use stream::{
    ChatEvent, ChatEventSink, CollectingSink, STREAM_SILENCE_TIMEOUT_SECS, StreamAbort, StreamEnd,
    StreamPhase,
};
pub use wire::UserInfo;
