//! The normalized in-memory chat state.
//!
//! [`ChatStore`] exclusively owns every [`Chat`] and [`Message`]; all writes
//! go through the named mutation entry points below — one tagged operation
//! per effect, no monolithic reducer. Pagination state (cursor, has-more)
//! lives next to the collection it describes.

use crate::model::{Chat, Message, MessagePage};
use crate::page::Page;
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    chats_cursor: Option<String>,
    chats_has_more: bool,
    chats_loaded: bool,
    pages: HashMap<String, MessagePage>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- read access -----------------------------------------------------

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn chats_cursor(&self) -> Option<&str> {
        self.chats_cursor.as_deref()
    }

    pub fn chats_has_more(&self) -> bool {
        self.chats_has_more
    }

    pub fn chats_loaded(&self) -> bool {
        self.chats_loaded
    }

    pub fn message_page(&self, chat_id: &str) -> Option<&MessagePage> {
        self.pages.get(chat_id)
    }

    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.pages
            .get(chat_id)
            .map(|p| p.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn message(&self, chat_id: &str, message_id: &str) -> Option<&Message> {
        self.messages(chat_id).iter().find(|m| m.id == message_id)
    }

    // --- chat mutations --------------------------------------------------

    /// Insert a chat, or replace the stored chat with the same id in place.
    /// New chats go to the front (newest-first listing).
    pub fn upsert_chat(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = chat,
            None => self.chats.insert(0, chat),
        }
    }

    /// Replace the placeholder with id `old_id` by the server-confirmed
    /// record, keeping its position. Guarantees no duplicate remains.
    pub fn replace_chat(&mut self, old_id: &str, chat: Chat) {
        self.chats.retain(|c| c.id != chat.id || c.id == old_id);
        match self.chats.iter_mut().find(|c| c.id == old_id) {
            Some(existing) => *existing = chat,
            None => {
                warn!("replace_chat: no chat with id {}, inserting", old_id);
                self.chats.insert(0, chat);
            }
        }
    }

    /// Remove a chat and its message page.
    pub fn remove_chat(&mut self, id: &str) {
        self.chats.retain(|c| c.id != id);
        self.pages.remove(id);
    }

    /// Replace the chat collection wholesale with a freshly fetched page.
    pub fn set_chat_page(&mut self, page: Page<Chat>) {
        self.chats = page.items;
        self.chats_cursor = page.next_cursor;
        self.chats_has_more = page.has_more;
        self.chats_loaded = true;
    }

    /// Append a "load more" page, skipping ids already present.
    pub fn append_chat_page(&mut self, page: Page<Chat>) {
        for chat in page.items {
            if self.chats.iter().all(|c| c.id != chat.id) {
                self.chats.push(chat);
            }
        }
        self.chats_cursor = page.next_cursor;
        self.chats_has_more = page.has_more;
        self.chats_loaded = true;
    }

    // --- message mutations -----------------------------------------------

    fn page_mut(&mut self, chat_id: &str) -> &mut MessagePage {
        self.pages.entry(chat_id.to_string()).or_default()
    }

    /// Replace a chat's message page wholesale.
    pub fn set_message_page(&mut self, chat_id: &str, page: Page<Message>) {
        let stored = self.page_mut(chat_id);
        stored.items = page.items;
        stored.next_cursor = page.next_cursor;
        stored.has_more = page.has_more;
        stored.loaded = true;
    }

    /// Append a "load more" page to a chat, skipping ids already present.
    pub fn append_message_page(&mut self, chat_id: &str, page: Page<Message>) {
        let stored = self.page_mut(chat_id);
        for message in page.items {
            if stored.items.iter().all(|m| m.id != message.id) {
                stored.items.push(message);
            }
        }
        stored.next_cursor = page.next_cursor;
        stored.has_more = page.has_more;
        stored.loaded = true;
    }

    /// Append a single message (optimistic placeholder or server record).
    pub fn insert_message(&mut self, chat_id: &str, message: Message) {
        self.page_mut(chat_id).items.push(message);
    }

    /// Replace the content of a message. Finalized messages are immutable;
    /// a patch against one is ignored.
    pub fn patch_message(&mut self, chat_id: &str, message_id: &str, content: &str) {
        let Some(message) = self
            .page_mut(chat_id)
            .items
            .iter_mut()
            .find(|m| m.id == message_id)
        else {
            warn!("patch_message: no message {} in chat {}", message_id, chat_id);
            return;
        };
        if message.finalized {
            warn!("patch_message: message {} is finalized, ignoring", message_id);
            return;
        }
        message.content = content.to_string();
    }

    /// Clear the pending flag once the server has accepted the message.
    pub fn confirm_message(&mut self, chat_id: &str, message_id: &str) {
        if let Some(message) = self
            .page_mut(chat_id)
            .items
            .iter_mut()
            .find(|m| m.id == message_id)
        {
            message.pending = false;
        }
    }

    /// Replace the placeholder with id `old_id` by the server-confirmed
    /// record, in place. Guarantees no duplicate remains.
    pub fn replace_message(&mut self, chat_id: &str, old_id: &str, message: Message) {
        let stored = self.page_mut(chat_id);
        stored
            .items
            .retain(|m| m.id != message.id || m.id == old_id);
        match stored.items.iter_mut().find(|m| m.id == old_id) {
            Some(existing) => *existing = message,
            None => {
                warn!("replace_message: no message {} in chat {}", old_id, chat_id);
                stored.items.push(message);
            }
        }
    }

    /// Seal a message: set its timestamp and mark it immutable.
    pub fn finalize_message(&mut self, chat_id: &str, message_id: &str, at: DateTime<Utc>) {
        if let Some(message) = self
            .page_mut(chat_id)
            .items
            .iter_mut()
            .find(|m| m.id == message_id)
        {
            message.created_at = Some(at);
            message.pending = false;
            message.finalized = true;
        }
    }

    /// Roll back an optimistic insert.
    pub fn remove_message(&mut self, chat_id: &str, message_id: &str) {
        self.page_mut(chat_id).items.retain(|m| m.id != message_id);
    }
}
