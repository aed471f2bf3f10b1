//! The client facade.
//!
//! [`ChatClient`] wires the session manager, the chat store, and the
//! transport together and exposes the engine's operations: authentication,
//! cursor pagination, optimistic mutations, and streaming sends. UI layers
//! hold a `ChatClient` handle — never the token storage or the store's
//! internals directly.

use crate::auth::{CredentialStore, SessionManager, TokenPair};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{HttpClient, HttpRequest, IDEMPOTENCY_HEADER};
use crate::idempotency::{IdempotencyKey, SendAttempt};
use crate::model::{Chat, Message};
use crate::page::{LoadMode, Page, check_page_response, paged_path};
use crate::sse::{FrameEvent, FrameMode, FrameStream};
use crate::store::ChatStore;
use crate::stream::{ChatEvent, ChatEventSink, StreamAbort, StreamEnd, StreamPhase};
use crate::wire::{ChatDto, CreateChatResponse, MessageDto, PageResponse, UserInfo};
use chrono::Utc;
use log::{debug, warn};
use serde_json::json;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Terminal state of the streaming loop, before the sink is notified.
enum Terminal {
    Completed,
    Cancelled,
    Failed(Error),
}

pub struct ChatClient<C> {
    session: SessionManager<C>,
    store: Mutex<ChatStore>,
    config: ClientConfig,
}

impl<C: HttpClient> ChatClient<C> {
    pub fn new(http: C, credentials: Box<dyn CredentialStore>, config: ClientConfig) -> Self {
        Self {
            session: SessionManager::new(http, credentials),
            store: Mutex::new(ChatStore::new()),
            config,
        }
    }

    /// The session manager handle (token state, raw authorized requests).
    pub fn session(&self) -> &SessionManager<C> {
        &self.session
    }

    /// Locked view of the chat state. Mutations belong to the engine; callers
    /// read through this and write through the operations below.
    pub fn store(&self) -> MutexGuard<'_, ChatStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // --- authentication ---------------------------------------------------

    pub async fn login(&self, login: &str, password: &str) -> Result<TokenPair, Error> {
        self.session.login(login, password).await
    }

    pub async fn logout(&self) -> Result<(), Error> {
        self.session.logout().await
    }

    pub async fn me(&self) -> Result<UserInfo, Error> {
        self.session.me().await
    }

    /// Validate a session restored from persisted credentials.
    pub async fn restore_session(&self) -> Result<UserInfo, Error> {
        if !self.session.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        self.session.me().await
    }

    // --- pagination -------------------------------------------------------

    /// Fetch one page of the chat list. Requesting the same cursor twice
    /// yields identical results; the cursor is round-tripped verbatim.
    pub async fn fetch_chats_page(&self, cursor: Option<&str>) -> Result<Page<Chat>, Error> {
        let path = paged_path("/chats", self.config.page_size, cursor);
        let response = self.session.authorized_request(HttpRequest::get(&path)).await?;
        let response = check_page_response(response, cursor.is_some())?;
        let body: PageResponse<ChatDto> = response.json()?;
        Ok(Page::from_parts(
            body.items.into_iter().map(ChatDto::into_chat).collect(),
            body.next_cursor,
        ))
    }

    /// Synchronize the chat list. `Reset` replaces the stored collection
    /// wholesale; `More` appends the next page using the stored cursor.
    pub async fn load_chats(&self, mode: LoadMode) -> Result<Page<Chat>, Error> {
        let cursor = match mode {
            LoadMode::Reset => None,
            LoadMode::More => {
                let store = self.store();
                if store.chats_loaded() && !store.chats_has_more() {
                    debug!("chat list exhausted, skipping fetch");
                    return Ok(Page::empty());
                }
                store.chats_cursor().map(|s| s.to_string())
            }
        };
        let page = self.fetch_chats_page(cursor.as_deref()).await?;
        match mode {
            LoadMode::Reset => self.store().set_chat_page(page.clone()),
            LoadMode::More => self.store().append_chat_page(page.clone()),
        }
        Ok(page)
    }

    /// Fetch one page of a chat's messages.
    pub async fn fetch_messages_page(
        &self,
        chat_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Message>, Error> {
        let base = format!("/chats/{}/messages", chat_id);
        let path = paged_path(&base, self.config.page_size, cursor);
        let response = self.session.authorized_request(HttpRequest::get(&path)).await?;
        let response = check_page_response(response, cursor.is_some())?;
        let body: PageResponse<MessageDto> = response.json()?;
        Ok(Page::from_parts(
            body.items
                .into_iter()
                .map(|dto| dto.into_message(chat_id))
                .collect(),
            body.next_cursor,
        ))
    }

    /// Synchronize one chat's message page. Merge policy mirrors
    /// [`load_chats`](Self::load_chats). Independent chats never interfere:
    /// each chat has its own page and cursor.
    pub async fn load_messages(&self, chat_id: &str, mode: LoadMode) -> Result<Page<Message>, Error> {
        let cursor = match mode {
            LoadMode::Reset => None,
            LoadMode::More => {
                let store = self.store();
                match store.message_page(chat_id) {
                    Some(page) if page.loaded && !page.has_more => {
                        debug!("messages for {} exhausted, skipping fetch", chat_id);
                        return Ok(Page::empty());
                    }
                    Some(page) => page.next_cursor.clone(),
                    None => None,
                }
            }
        };
        let page = self.fetch_messages_page(chat_id, cursor.as_deref()).await?;
        match mode {
            LoadMode::Reset => self.store().set_message_page(chat_id, page.clone()),
            LoadMode::More => self.store().append_message_page(chat_id, page.clone()),
        }
        Ok(page)
    }

    // --- chat mutations ---------------------------------------------------

    /// Create a chat optimistically: a placeholder appears in the store
    /// immediately and is replaced in place by the server-confirmed record,
    /// or rolled back on failure.
    pub async fn create_chat(&self, name: Option<&str>, tags: &[String]) -> Result<Chat, Error> {
        let placeholder = Chat::placeholder(name, tags);
        let placeholder_id = placeholder.id.clone();
        self.store().upsert_chat(placeholder);

        let mut body = json!({});
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        if !tags.is_empty() {
            body["tags"] = json!(tags);
        }
        let key = IdempotencyKey::generate();
        let request = HttpRequest::post("/chats")
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(body);

        let result = match self.session.authorized_request(request).await {
            Ok(response) => response
                .error_for_status()
                .and_then(|r| r.json::<CreateChatResponse>()),
            Err(e) => Err(e),
        };

        match result {
            Ok(created) => {
                let confirmed = Chat {
                    id: created.chat_id,
                    name: name.map(|s| s.to_string()),
                    tags: tags.to_vec(),
                    created_at: Some(Utc::now()),
                    updated_at: None,
                    last_message_at: None,
                    pending: false,
                };
                self.store().replace_chat(&placeholder_id, confirmed.clone());
                Ok(confirmed)
            }
            Err(e) => {
                self.store().remove_chat(&placeholder_id);
                Err(e)
            }
        }
    }

    /// Rename and/or retag a chat.
    pub async fn update_chat(
        &self,
        chat_id: &str,
        name: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<(), Error> {
        let mut body = json!({});
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        if let Some(tags) = tags {
            body["tags"] = json!(tags);
        }
        let key = IdempotencyKey::generate();
        let request = HttpRequest::patch(&format!("/chats/{}", chat_id))
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(body);
        self.session
            .authorized_request(request)
            .await?
            .error_for_status()?;

        if let Some(mut chat) = self.store().chat(chat_id).cloned() {
            if let Some(name) = name {
                chat.name = Some(name.to_string());
            }
            if let Some(tags) = tags {
                chat.tags = tags.to_vec();
            }
            chat.updated_at = Some(Utc::now());
            self.store().upsert_chat(chat);
        }
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), Error> {
        let key = IdempotencyKey::generate();
        let request = HttpRequest::delete(&format!("/chats/{}", chat_id))
            .header(IDEMPOTENCY_HEADER, key.as_str());
        self.session
            .authorized_request(request)
            .await?
            .error_for_status()?;
        self.store().remove_chat(chat_id);
        Ok(())
    }

    // --- sends ------------------------------------------------------------

    /// Non-streaming send. The user message is inserted optimistically and
    /// confirmed on success; the server's reply message is inserted after it.
    pub async fn send_message(&self, chat_id: &str, attempt: &SendAttempt) -> Result<Message, Error> {
        let placeholder = Message::placeholder_user(chat_id, attempt.content());
        let user_id = placeholder.id.clone();
        self.store().insert_message(chat_id, placeholder);

        let request = self.send_request(chat_id, attempt, false);
        let result = match self.session.authorized_request(request).await {
            Ok(response) => response
                .error_for_status()
                .and_then(|r| r.json::<MessageDto>()),
            Err(e) => Err(e),
        };

        match result {
            Ok(dto) => {
                let assistant = dto.into_message(chat_id);
                let mut store = self.store();
                store.confirm_message(chat_id, &user_id);
                store.insert_message(chat_id, assistant.clone());
                Ok(assistant)
            }
            Err(e) => {
                self.store().remove_message(chat_id, &user_id);
                Err(e)
            }
        }
    }

    /// Streaming send.
    ///
    /// Inserts the optimistic user message, POSTs with `response_stream`,
    /// then consumes frames into an empty assistant placeholder. Returns the
    /// terminal [`StreamEnd`]; a pre-stream failure (the POST itself) rolls
    /// back the user message and returns `Err` instead.
    pub async fn send_streaming<S: ChatEventSink>(
        &self,
        chat_id: &str,
        attempt: &SendAttempt,
        abort: &StreamAbort,
        sink: &mut S,
    ) -> Result<StreamEnd, Error> {
        debug!("stream send to {}: {}", chat_id, StreamPhase::Sending);
        let placeholder = Message::placeholder_user(chat_id, attempt.content());
        let user_id = placeholder.id.clone();
        self.store().insert_message(chat_id, placeholder);

        let request = self.send_request(chat_id, attempt, true);
        let response = match self
            .session
            .authorized_request(request)
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(e) => {
                self.store().remove_message(chat_id, &user_id);
                return Err(e);
            }
        };

        // The send was accepted; the user message exists server-side now and
        // survives whatever happens to the stream.
        self.store().confirm_message(chat_id, &user_id);

        let mode = FrameMode::from_content_type(response.content_type.as_deref());
        let mut frames = FrameStream::new(response.into_stream(), mode);

        let assistant = Message::placeholder_assistant(chat_id);
        let assistant_id = assistant.id.clone();
        self.store().insert_message(chat_id, assistant);
        debug!("stream send to {}: {}", chat_id, StreamPhase::Streaming);

        let silence = Duration::from_secs(self.config.stream_silence_secs);
        // Single source of truth for the assistant content: the store is
        // overwritten with the accumulator after every frame, never appended
        // to, so a redelivered frame cannot be applied twice.
        let mut accumulator = String::new();

        let terminal = if let Err(e) = sink.handle(ChatEvent::Started {
            message_id: &assistant_id,
        }) {
            Terminal::Failed(Error::stream(e))
        } else {
            loop {
                let step = tokio::select! {
                    biased;
                    _ = abort.cancelled() => None,
                    result = tokio::time::timeout(silence, frames.next_frame()) => Some(result),
                };

                let frame = match step {
                    None => break Terminal::Cancelled,
                    Some(Err(_elapsed)) => {
                        break Terminal::Failed(Error::stream("no frames within silence window"));
                    }
                    Some(Ok(Err(e))) => break Terminal::Failed(e),
                    Some(Ok(Ok(None))) => {
                        break Terminal::Failed(Error::stream("stream closed before done"));
                    }
                    Some(Ok(Ok(Some(frame)))) => frame,
                };

                match frame.event {
                    FrameEvent::Message => {
                        accumulator.push_str(&frame.data);
                        self.store().patch_message(chat_id, &assistant_id, &accumulator);
                        if let Err(e) = sink.handle(ChatEvent::Delta(&frame.data)) {
                            break Terminal::Failed(Error::stream(e));
                        }
                    }
                    // Arrival alone restarts the silence window.
                    FrameEvent::Heartbeat => {}
                    FrameEvent::Done => {
                        self.store().finalize_message(chat_id, &assistant_id, Utc::now());
                        break Terminal::Completed;
                    }
                    FrameEvent::Error => break Terminal::Failed(Error::Stream(frame.data)),
                    FrameEvent::Other(name) => debug!("ignoring frame event '{}'", name),
                }
            }
        };

        // Dropping the frame stream releases the transport; buffered frames
        // past a cancellation are never processed.
        drop(frames);

        let message = self
            .store()
            .message(chat_id, &assistant_id)
            .cloned()
            .unwrap_or_else(|| {
                let mut synthesized = Message::placeholder_assistant(chat_id);
                synthesized.content = accumulator.clone();
                synthesized
            });

        let end = match terminal {
            Terminal::Completed => StreamEnd::Completed(message),
            Terminal::Cancelled => StreamEnd::Cancelled(message),
            Terminal::Failed(error) => {
                warn!("stream send to {} failed: {}", chat_id, error);
                StreamEnd::Failed { message, error }
            }
        };
        debug!("stream send to {}: {}", chat_id, end.phase());
        // The terminal notification is best-effort; the partial message is
        // already safe in the store.
        let _ = sink.handle(ChatEvent::Ended(end.phase()));
        Ok(end)
    }

    fn send_request(&self, chat_id: &str, attempt: &SendAttempt, stream: bool) -> HttpRequest {
        let mut body = json!({
            "content": attempt.content(),
            "use_rag": attempt.use_rag() && self.config.use_rag,
        });
        if stream {
            body["response_stream"] = json!(true);
        }
        HttpRequest::post(&format!("/chats/{}/messages", chat_id))
            .header(IDEMPOTENCY_HEADER, attempt.key().as_str())
            .json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::stream::CollectingSink;
    use crate::test_support::{MockHttp, json_ok, sse_from_chunks, sse_then_pending, status_only};
    use serde_json::json;

    fn client(http: MockHttp) -> ChatClient<MockHttp> {
        ChatClient::new(
            http,
            Box::new(MemoryCredentialStore::new()),
            ClientConfig::default(),
        )
    }

    fn page_body(ids: &[&str], next_cursor: Option<&str>) -> serde_json::Value {
        json!({
            "items": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
            "next_cursor": next_cursor,
        })
    }

    fn message_page_body(ids: &[&str], next_cursor: Option<&str>) -> serde_json::Value {
        json!({
            "items": ids
                .iter()
                .map(|id| json!({"id": id, "role": "user", "content": format!("msg {}", id)}))
                .collect::<Vec<_>>(),
            "next_cursor": next_cursor,
        })
    }

    fn cursor_of(req: &HttpRequest) -> Option<String> {
        let query = req.path.split_once('?')?.1;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "cursor")
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn test_cursor_idempotence() {
        let http = MockHttp::new(|req| {
            Ok(match cursor_of(req).as_deref() {
                None => json_ok(page_body(&["c1", "c2"], Some("cur-a"))),
                Some("cur-a") => json_ok(page_body(&["c3"], None)),
                Some(other) => panic!("unexpected cursor {}", other),
            })
        });
        let client = client(http);

        let first = client.fetch_chats_page(Some("cur-a")).await.unwrap();
        let second = client.fetch_chats_page(Some("cur-a")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pagination_yields_no_duplicates() {
        let http = MockHttp::new(|req| {
            Ok(match cursor_of(req).as_deref() {
                None => json_ok(message_page_body(&["m1", "m2"], Some("cur-b"))),
                // Server resends the boundary item on page 2.
                Some("cur-b") => json_ok(message_page_body(&["m2", "m3"], None)),
                Some(other) => panic!("unexpected cursor {}", other),
            })
        });
        let client = client(http);

        client.load_messages("c1", LoadMode::Reset).await.unwrap();
        client.load_messages("c1", LoadMode::More).await.unwrap();

        let store = client.store();
        let ids: Vec<&str> = store.messages("c1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_zero_items_cursor_stops_load_more() {
        let http = MockHttp::new(|req| {
            Ok(match cursor_of(req).as_deref() {
                None => json_ok(json!({"items": [], "next_cursor": "zombie"})),
                Some(_) => panic!("load more must not fire after an empty page"),
            })
        });
        let client = client(http);

        let page = client.load_chats(LoadMode::Reset).await.unwrap();
        assert!(!page.has_more);
        // The guard also short-circuits the next load-more.
        let more = client.load_chats(LoadMode::More).await.unwrap();
        assert!(more.items.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_cursor_surfaces_invalid_cursor() {
        let http = MockHttp::new(|req| {
            Ok(if cursor_of(req).is_some() {
                status_only(400)
            } else {
                json_ok(page_body(&["c1"], Some("expired")))
            })
        });
        let client = client(http);

        client.load_chats(LoadMode::Reset).await.unwrap();
        let err = client.load_chats(LoadMode::More).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_cursor");
    }

    #[tokio::test]
    async fn test_optimistic_create_rolls_back_on_failure() {
        let http = MockHttp::new(|req| {
            Ok(match req.path.as_str() {
                p if p.starts_with("/chats?") => json_ok(page_body(&["c1"], None)),
                "/chats" => status_only(500),
                other => panic!("unexpected path {}", other),
            })
        });
        let client = client(http);
        client.load_chats(LoadMode::Reset).await.unwrap();
        let before: Vec<String> = client.store().chats().iter().map(|c| c.id.clone()).collect();

        let err = client.create_chat(Some("doomed"), &[]).await.unwrap_err();
        assert_eq!(err.kind(), "server");

        let after: Vec<String> = client.store().chats().iter().map(|c| c.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_optimistic_create_replaces_placeholder_in_place() {
        let http = MockHttp::new(|req| {
            assert!(req.header_value(IDEMPOTENCY_HEADER).is_some());
            Ok(json_ok(json!({"chat_id": "srv-1"})))
        });
        let client = client(http);

        let chat = client.create_chat(Some("plans"), &[]).await.unwrap();
        assert_eq!(chat.id, "srv-1");

        let store = client.store();
        assert_eq!(store.chats().len(), 1);
        assert_eq!(store.chats()[0].id, "srv-1");
        assert!(!store.chats()[0].pending);
    }

    #[tokio::test]
    async fn test_idempotency_key_stable_across_retry() {
        let http = MockHttp::new(|req| {
            Ok(match req.path.as_str() {
                "/chats/c1/messages" => status_only(503),
                other => panic!("unexpected path {}", other),
            })
        });
        let client = client(http);

        let attempt = SendAttempt::new("hello");
        client.send_message("c1", &attempt).await.unwrap_err();
        client.send_message("c1", &attempt).await.unwrap_err();

        let fresh = SendAttempt::new("hello");
        client.send_message("c1", &fresh).await.unwrap_err();

        let requests = client.session().http().requests();
        let keys: Vec<String> = requests
            .iter()
            .filter_map(|r| r.header_value(IDEMPOTENCY_HEADER).map(|s| s.to_string()))
            .collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], keys[1], "retry of one attempt must reuse its key");
        assert_ne!(keys[1], keys[2], "a new action must get a new key");
    }

    #[tokio::test]
    async fn test_failed_send_rolls_back_user_message() {
        let http = MockHttp::new(|_| Ok(status_only(500)));
        let client = client(http);

        let attempt = SendAttempt::new("hello");
        client.send_message("c1", &attempt).await.unwrap_err();
        assert!(client.store().messages("c1").is_empty());
    }

    #[tokio::test]
    async fn test_streaming_end_to_end() {
        let http = MockHttp::new(|req| {
            assert_eq!(req.path, "/chats/c1/messages");
            assert_eq!(req.body.as_ref().unwrap()["response_stream"], json!(true));
            Ok(sse_from_chunks(&[
                "data: H\n\n",
                "event: heartbeat\ndata: \n\n",
                "data: i!\n\n",
                "event: done\ndata: \n\n",
            ]))
        });
        let client = client(http);

        let attempt = SendAttempt::new("Hi");
        let abort = StreamAbort::new();
        let mut sink = CollectingSink::new();
        let end = client
            .send_streaming("c1", &attempt, &abort, &mut sink)
            .await
            .unwrap();

        let message = match end {
            StreamEnd::Completed(message) => message,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(message.content, "Hi!");
        assert!(message.finalized);
        assert!(message.created_at.is_some());
        assert_eq!(sink.text, "Hi!");
        assert_eq!(sink.ended, Some(StreamPhase::Completed));

        // Exactly two new messages, user then assistant, in order.
        let store = client.store();
        let messages = store.messages("c1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Hi");
        assert!(!messages[0].pending);
        assert_eq!(messages[1].content, "Hi!");
    }

    #[tokio::test]
    async fn test_stream_accumulation_preserves_order() {
        let http = MockHttp::new(|_| {
            Ok(sse_from_chunks(&[
                "data: He\n\ndata: llo\n\n",
                "data:  world\n\nevent: done\ndata: \n\n",
            ]))
        });
        let client = client(http);

        let end = client
            .send_streaming(
                "c1",
                &SendAttempt::new("hi"),
                &StreamAbort::new(),
                &mut CollectingSink::new(),
            )
            .await
            .unwrap();
        assert_eq!(end.message().content, "Hello world");
    }

    #[tokio::test]
    async fn test_error_frame_keeps_partial_message() {
        let http = MockHttp::new(|_| {
            Ok(sse_from_chunks(&[
                "data: partial\n\n",
                "event: error\ndata: model overloaded\n\n",
            ]))
        });
        let client = client(http);

        let end = client
            .send_streaming(
                "c1",
                &SendAttempt::new("hi"),
                &StreamAbort::new(),
                &mut CollectingSink::new(),
            )
            .await
            .unwrap();

        match &end {
            StreamEnd::Failed { message, error } => {
                assert_eq!(message.content, "partial");
                assert_eq!(error.kind(), "stream");
                assert_eq!(error.to_string(), "stream error: model overloaded");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // The partial assistant message stays visible; the user message too.
        let store = client.store();
        let messages = store.messages("c1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "partial");
        assert!(!messages[1].finalized);
    }

    #[tokio::test]
    async fn test_eof_before_done_is_a_stream_failure() {
        let http = MockHttp::new(|_| Ok(sse_from_chunks(&["data: cut\n\n"])));
        let client = client(http);

        let end = client
            .send_streaming(
                "c1",
                &SendAttempt::new("hi"),
                &StreamAbort::new(),
                &mut CollectingSink::new(),
            )
            .await
            .unwrap();
        match end {
            StreamEnd::Failed { message, .. } => assert_eq!(message.content, "cut"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_and_stops_mutation() {
        let http = MockHttp::new(|_| {
            Ok(sse_then_pending(&["data: one\n\n", "data:  two\n\n"]))
        });
        let client = client(http);

        let attempt = SendAttempt::new("hi");
        let abort = StreamAbort::new();
        let trigger = abort.clone();
        let mut sink = CollectingSink::new();

        let (end, _) = tokio::join!(
            client.send_streaming("c1", &attempt, &abort, &mut sink),
            async {
                // Let both buffered frames drain, then abort while the
                // transport is idle.
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.abort();
            }
        );

        let end = end.unwrap();
        let message = match end {
            StreamEnd::Cancelled(message) => message,
            other => panic!("expected cancellation, got {:?}", other),
        };
        assert_eq!(message.content, "one two");
        assert!(!message.finalized);
        assert_eq!(sink.ended, Some(StreamPhase::Cancelled));

        // No further mutation after the abort resolved.
        let content_after = client.store().message("c1", &message.id).unwrap().content.clone();
        assert_eq!(content_after, "one two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_timeout_fails_the_stream() {
        let http = MockHttp::new(|_| Ok(sse_then_pending(&["data: slow\n\n"])));
        let client = client(http);

        let end = client
            .send_streaming(
                "c1",
                &SendAttempt::new("hi"),
                &StreamAbort::new(),
                &mut CollectingSink::new(),
            )
            .await
            .unwrap();

        match end {
            StreamEnd::Failed { message, error } => {
                assert_eq!(message.content, "slow");
                assert_eq!(error.to_string(), "stream error: no frames within silence window");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pre_stream_failure_rolls_back_user_message() {
        let http = MockHttp::new(|_| Ok(status_only(500)));
        let client = client(http);

        let err = client
            .send_streaming(
                "c1",
                &SendAttempt::new("hi"),
                &StreamAbort::new(),
                &mut CollectingSink::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "server");
        assert!(client.store().messages("c1").is_empty());
    }

    #[tokio::test]
    async fn test_line_mode_fallback_for_plain_streams() {
        let http = MockHttp::new(|_| {
            let mut response = sse_from_chunks(&[]);
            response.content_type = Some("application/octet-stream".to_string());
            // Rebuild the body in line framing.
            response.body = crate::http::HttpBody::Stream(Box::pin(futures_util::stream::iter([
                Ok(bytes::Bytes::from_static(b"hel")),
                Ok(bytes::Bytes::from_static(b"lo\n")),
            ])));
            Ok(response)
        });
        let client = client(http);

        // Line mode has no done frame; EOF surfaces as a failure but the
        // accumulated content is intact.
        let end = client
            .send_streaming(
                "c1",
                &SendAttempt::new("hi"),
                &StreamAbort::new(),
                &mut CollectingSink::new(),
            )
            .await
            .unwrap();
        assert_eq!(end.message().content, "hello");
    }
}
