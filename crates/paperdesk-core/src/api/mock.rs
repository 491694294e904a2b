//! Scripted gateway for testing the state containers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ApiFuture, ChatApi, PaperApi};
use crate::error::ApiError;
use crate::models::{
    Acknowledgement, ChatHistory, ChatReply, ChatRequest, NewSession, Paper, Summary, TaskTicket,
    Translation,
};

/// A scripted response for one endpoint call.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Decoded into the endpoint's payload type.
    Ok(Value),
    Err(ApiError),
}

impl MockReply {
    /// Shorthand for a backend error carrying a `detail` message.
    pub fn backend(status: u16, message: &str) -> Self {
        MockReply::Err(ApiError::Backend {
            status,
            message: message.to_string(),
        })
    }
}

/// A hand-rolled mock implementing [`PaperApi`] and [`ChatApi`].
///
/// Each endpoint has its own queue of replies; calls pop from the front and
/// the last reply repeats once the queue is down to one. Unscripted endpoints
/// fail with a transport error.
#[derive(Default)]
pub struct MockApi {
    replies: Mutex<HashMap<&'static str, Vec<MockReply>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `endpoint` (the trait method name).
    pub fn on(self, endpoint: &'static str, reply: MockReply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push(reply);
        self
    }

    /// Simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `endpoint` has been called.
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == endpoint)
            .count()
    }

    /// Bodies of every chat request sent so far.
    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    fn next_reply(&self, endpoint: &'static str, arg: &str) -> MockReply {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint, arg.to_string()));

        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(endpoint) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => MockReply::Err(ApiError::Transport(format!(
                "no scripted reply for {}",
                endpoint
            ))),
        }
    }

    fn respond<'a, T>(&'a self, endpoint: &'static str, arg: &str) -> ApiFuture<'a, T>
    where
        T: DeserializeOwned + Send + 'a,
    {
        let reply = self.next_reply(endpoint, arg);
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match reply {
                MockReply::Ok(value) => {
                    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
                }
                MockReply::Err(e) => Err(e),
            }
        })
    }
}

impl PaperApi for MockApi {
    fn get_paper<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Paper> {
        self.respond("get_paper", paper_id)
    }

    fn get_translation<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Translation> {
        self.respond("get_translation", paper_id)
    }

    fn get_summary<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Summary> {
        self.respond("get_summary", paper_id)
    }

    fn translate_paper<'a>(
        &'a self,
        paper_id: &'a str,
        _source_lang: &'a str,
        _target_lang: &'a str,
    ) -> ApiFuture<'a, TaskTicket> {
        self.respond("translate_paper", paper_id)
    }

    fn generate_summary<'a>(
        &'a self,
        paper_id: &'a str,
        _summary_type: &'a str,
    ) -> ApiFuture<'a, TaskTicket> {
        self.respond("generate_summary", paper_id)
    }
}

impl ChatApi for MockApi {
    fn create_chat_session<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, NewSession> {
        self.respond("create_chat_session", paper_id)
    }

    fn chat<'a>(
        &'a self,
        paper_id: &'a str,
        request: &'a ChatRequest,
    ) -> ApiFuture<'a, ChatReply> {
        self.chat_requests.lock().unwrap().push(request.clone());
        self.respond("chat", paper_id)
    }

    fn chat_history<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, ChatHistory> {
        self.respond("chat_history", session_id)
    }

    fn delete_chat_session<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, Acknowledgement> {
        self.respond("delete_chat_session", session_id)
    }
}
