//! Wire DTOs for the server contract.
//!
//! Field names follow the backend's JSON (`access_token`, `next_cursor`, ...)
//! and convert into the engine's domain types at the boundary.

use crate::auth::TokenPair;
use crate::model::{Chat, Message, Role};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `POST /auth/login` response.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

impl LoginResponse {
    pub fn into_token_pair(self) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: self.expires_in,
        }
    }
}

/// `POST /auth/refresh` response.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// The authenticated user, from login or `GET /auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub login: Option<String>,
}

/// A page of any collection: `{items[], next_cursor?}`.
#[derive(Debug, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A chat as the server lists it.
#[derive(Debug, Deserialize)]
pub struct ChatDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ChatDto {
    pub fn into_chat(self) -> Chat {
        Chat {
            id: self.id,
            name: self.name,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_message_at: self.last_message_at,
            pending: false,
        }
    }
}

/// A message as the server returns it. Server records are final.
#[derive(Debug, Deserialize)]
pub struct MessageDto {
    pub id: String,
    #[serde(default)]
    pub chat_id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MessageDto {
    /// Convert to a domain message. `chat_id` from the DTO wins when present;
    /// the endpoint's chat id fills in otherwise.
    pub fn into_message(self, chat_id: &str) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id.unwrap_or_else(|| chat_id.to_string()),
            role: self.role,
            content: self.content,
            created_at: self.created_at,
            pending: false,
            finalized: true,
        }
    }
}

/// `POST /chats` response.
#[derive(Debug, Deserialize)]
pub struct CreateChatResponse {
    pub chat_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_minimal_fields() {
        let body: LoginResponse = serde_json::from_str(r#"{"access_token": "a"}"#).unwrap();
        let tokens = body.into_token_pair();
        assert_eq!(tokens.access_token, "a");
        assert_eq!(tokens.token_type, "Bearer");
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn test_page_response_defaults_cursor_to_none() {
        let page: PageResponse<ChatDto> =
            serde_json::from_str(r#"{"items": [{"id": "c1"}]}"#).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_message_dto_converts_with_endpoint_chat_id() {
        let dto: MessageDto = serde_json::from_str(
            r#"{"id": "m1", "role": "assistant", "content": "hi", "created_at": "2026-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        let message = dto.into_message("c7");
        assert_eq!(message.chat_id, "c7");
        assert_eq!(message.role, Role::Assistant);
        assert!(message.finalized);
        assert!(message.created_at.is_some());
    }
}
