//! Domain types: chats, messages, and per-chat message pages.
//!
//! These are owned exclusively by the [`ChatStore`](crate::store::ChatStore);
//! everything else goes through the store's mutation entry points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// A chat conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: String,
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// True while this chat only exists locally (optimistic create awaiting
    /// server confirmation).
    pub pending: bool,
}

impl Chat {
    /// Build a local placeholder chat with a client-generated id.
    pub fn placeholder(name: Option<&str>, tags: &[String]) -> Self {
        Self {
            id: local_id(),
            name: name.map(|s| s.to_string()),
            tags: tags.to_vec(),
            created_at: None,
            updated_at: None,
            last_message_at: None,
            pending: true,
        }
    }
}

/// A single message within a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    /// True while this message only exists locally (optimistic send awaiting
    /// server confirmation, or an assistant reply still streaming).
    pub pending: bool,
    /// Set when the message reached its terminal state. Finalized messages
    /// are immutable; the store rejects further patches.
    pub finalized: bool,
}

impl Message {
    /// Build a local placeholder user message for an optimistic send.
    pub fn placeholder_user(chat_id: &str, content: &str) -> Self {
        Self {
            id: local_id(),
            chat_id: chat_id.to_string(),
            role: Role::User,
            content: content.to_string(),
            created_at: None,
            pending: true,
            finalized: false,
        }
    }

    /// Build the empty assistant message that fills in while streaming.
    pub fn placeholder_assistant(chat_id: &str) -> Self {
        Self {
            id: local_id(),
            chat_id: chat_id.to_string(),
            role: Role::Assistant,
            content: String::new(),
            created_at: None,
            pending: true,
            finalized: false,
        }
    }
}

/// The fetched slice of one chat's messages plus its pagination state.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub items: Vec<Message>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// False until the first page fetch for this chat completes. Messages
    /// inserted by sends land in an unloaded page without marking it loaded.
    pub loaded: bool,
}

/// Client-generated id for records that do not have a server id yet.
fn local_id() -> String {
    format!("local-{}", Uuid::new_v4())
}
