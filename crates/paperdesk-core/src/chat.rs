//! State container for chat sessions over a paper.
//!
//! Sessions are keyed by the backend's session id. Each holds an append-only
//! message log. Sending is a two-step protocol: [`ChatStore::ensure_session`]
//! resolves (or creates) the target session, then the exchange is recorded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ChatApi;
use crate::error::ApiError;
use crate::models::{ChatReply, ChatRequest, HistoryMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn from_wire(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One entry in a session log. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Citations returned with an assistant reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Value>>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<Value>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            timestamp: Utc::now(),
        }
    }

    fn from_history(entry: &HistoryMessage) -> Option<Self> {
        let role = Role::from_wire(&entry.role)?;
        let timestamp = entry
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        Some(Self {
            role,
            content: entry.content.clone(),
            sources: None,
            timestamp,
        })
    }
}

/// Backend timestamps are either RFC 3339 or naive local ISO-8601.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|dt| dt.and_utc())
}

/// A conversation with the assistant about one paper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSession {
    paper_id: String,
    messages: Vec<Message>,
    /// Indices of user messages whose exchange failed.
    failed_sends: Vec<usize>,
}

impl ChatSession {
    fn new(paper_id: &str) -> Self {
        Self {
            paper_id: paper_id.to_string(),
            ..Default::default()
        }
    }

    pub fn paper_id(&self) -> &str {
        &self.paper_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn failed_sends(&self) -> &[usize] {
        &self.failed_sends
    }

    /// Whether the message at `index` is a user message whose send failed.
    pub fn is_failed(&self, index: usize) -> bool {
        self.failed_sends.contains(&index)
    }

    fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }
}

#[derive(Debug, Default)]
struct ChatState {
    sessions: HashMap<String, ChatSession>,
    current: Option<String>,
}

/// Holds every chat session of the running application.
///
/// Invariant: `current`, when set, names an entry in `sessions`.
pub struct ChatStore {
    api: Arc<dyn ChatApi>,
    state: Mutex<ChatState>,
    /// Serializes implicit session creation.
    creating: tokio::sync::Mutex<()>,
}

impl ChatStore {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            state: Mutex::new(ChatState::default()),
            creating: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a backend session for `paper_id`, register it locally with an
    /// empty log and make it current. Nothing is registered on failure.
    pub async fn create_session(&self, paper_id: &str) -> Result<String, ApiError> {
        let created = self.api.create_chat_session(paper_id).await?;
        let session_id = created.session_id;

        let mut state = self.state();
        state
            .sessions
            .insert(session_id.clone(), ChatSession::new(paper_id));
        state.current = Some(session_id.clone());
        tracing::info!(paper_id, session_id = %session_id, "chat session created");

        Ok(session_id)
    }

    /// Resolve the session a message should go to: the given id, else the
    /// current session, else a newly created one.
    ///
    /// An explicit id unknown locally is registered with an empty log.
    /// Concurrent callers with no session share a single creation.
    pub async fn ensure_session(
        &self,
        paper_id: &str,
        session_id: Option<&str>,
    ) -> Result<String, ApiError> {
        if let Some(id) = session_id {
            self.state()
                .sessions
                .entry(id.to_string())
                .or_insert_with(|| ChatSession::new(paper_id));
            return Ok(id.to_string());
        }
        if let Some(id) = self.current_session_id() {
            return Ok(id);
        }

        let _creating = self.creating.lock().await;
        // Another sender may have created one while we waited.
        if let Some(id) = self.current_session_id() {
            return Ok(id);
        }
        self.create_session(paper_id).await
    }

    /// Send a user message and record the exchange.
    ///
    /// The user message is appended before the backend is contacted. On
    /// success the assistant reply is appended and the session becomes
    /// current. On failure the error is returned, the user message stays in
    /// the log and its index is added to [`ChatSession::failed_sends`].
    pub async fn send_message(
        &self,
        paper_id: &str,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ApiError> {
        let sid = self.ensure_session(paper_id, session_id).await?;
        let user_index = self.append(&sid, paper_id, Message::user(message));

        let request = ChatRequest {
            paper_id: paper_id.to_string(),
            message: message.to_string(),
            session_id: Some(sid.clone()),
            stream: false,
        };

        match self.api.chat(paper_id, &request).await {
            Ok(reply) => {
                let content = reply.content_text().unwrap_or_else(|| {
                    tracing::warn!(session_id = %sid, "chat reply carried no content");
                    String::new()
                });
                let mut state = self.state();
                match state.sessions.get_mut(&sid) {
                    Some(session) => {
                        session.push(Message::assistant(content, reply.sources.clone()));
                        state.current = Some(sid);
                    }
                    None => {
                        tracing::debug!(session_id = %sid, "session cleared before reply arrived");
                    }
                }
                Ok(reply)
            }
            Err(e) => {
                if let Some(index) = user_index
                    && let Some(session) = self.state().sessions.get_mut(&sid)
                {
                    session.failed_sends.push(index);
                }
                Err(e)
            }
        }
    }

    /// Append to an existing session; returns the new message's index.
    fn append(&self, session_id: &str, paper_id: &str, message: Message) -> Option<usize> {
        let mut state = self.state();
        match state.sessions.get_mut(session_id) {
            Some(session) => Some(session.push(message)),
            None => {
                tracing::debug!(session_id, paper_id, "append to unknown session dropped");
                None
            }
        }
    }

    /// Ordered log of a session; empty if the session is unknown.
    pub fn get_session_messages(&self, session_id: &str) -> Vec<Message> {
        self.state()
            .sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Drop a session locally. The backend is not contacted.
    pub fn clear_session(&self, session_id: &str) {
        let mut state = self.state();
        state.sessions.remove(session_id);
        if state.current.as_deref() == Some(session_id) {
            state.current = None;
        }
    }

    /// Delete the session on the backend, then drop it locally.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.api.delete_chat_session(session_id).await?;
        self.clear_session(session_id);
        Ok(())
    }

    /// Replace a session's log with the backend's stored history.
    ///
    /// Messages with roles other than user/assistant are skipped. Returns the
    /// number of messages now in the log.
    pub async fn load_history(&self, paper_id: &str, session_id: &str) -> Result<usize, ApiError> {
        let history = self.api.chat_history(session_id).await?;
        let messages: Vec<Message> = history
            .messages
            .iter()
            .filter_map(Message::from_history)
            .collect();
        let count = messages.len();

        let mut state = self.state();
        let session = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| ChatSession::new(paper_id));
        session.messages = messages;
        session.failed_sends.clear();

        Ok(count)
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.state().current.clone()
    }

    /// Make an existing session current. Returns `false` if it is unknown.
    pub fn set_current(&self, session_id: &str) -> bool {
        let mut state = self.state();
        if state.sessions.contains_key(session_id) {
            state.current = Some(session_id.to_string());
            true
        } else {
            false
        }
    }

    /// Snapshot of one session.
    pub fn session(&self, session_id: &str) -> Option<ChatSession> {
        self.state().sessions.get(session_id).cloned()
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
