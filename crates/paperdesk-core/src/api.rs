//! Gateway traits used by the state containers.
//!
//! [`ApiClient`](crate::client::ApiClient) implements both; tests substitute a
//! scripted mock.

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::pin::Pin;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{
    Acknowledgement, ChatHistory, ChatReply, ChatRequest, NewSession, Paper, Summary, TaskTicket,
    Translation,
};

/// Boxed future returned by the gateway traits.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Paper, translation and summary endpoints.
pub trait PaperApi: Send + Sync {
    fn get_paper<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Paper>;

    fn get_translation<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Translation>;

    fn get_summary<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Summary>;

    fn translate_paper<'a>(
        &'a self,
        paper_id: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> ApiFuture<'a, TaskTicket>;

    fn generate_summary<'a>(
        &'a self,
        paper_id: &'a str,
        summary_type: &'a str,
    ) -> ApiFuture<'a, TaskTicket>;
}

/// Chat session endpoints.
pub trait ChatApi: Send + Sync {
    fn create_chat_session<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, NewSession>;

    fn chat<'a>(&'a self, paper_id: &'a str, request: &'a ChatRequest)
    -> ApiFuture<'a, ChatReply>;

    fn chat_history<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, ChatHistory>;

    fn delete_chat_session<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, Acknowledgement>;
}

impl PaperApi for ApiClient {
    fn get_paper<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Paper> {
        Box::pin(ApiClient::get_paper(self, paper_id))
    }

    fn get_translation<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Translation> {
        Box::pin(ApiClient::get_translation(self, paper_id))
    }

    fn get_summary<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, Summary> {
        Box::pin(ApiClient::get_summary(self, paper_id))
    }

    fn translate_paper<'a>(
        &'a self,
        paper_id: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> ApiFuture<'a, TaskTicket> {
        Box::pin(ApiClient::translate_paper(
            self,
            paper_id,
            source_lang,
            target_lang,
        ))
    }

    fn generate_summary<'a>(
        &'a self,
        paper_id: &'a str,
        summary_type: &'a str,
    ) -> ApiFuture<'a, TaskTicket> {
        Box::pin(ApiClient::generate_summary(self, paper_id, summary_type))
    }
}

impl ChatApi for ApiClient {
    fn create_chat_session<'a>(&'a self, paper_id: &'a str) -> ApiFuture<'a, NewSession> {
        Box::pin(ApiClient::create_chat_session(self, paper_id))
    }

    fn chat<'a>(
        &'a self,
        paper_id: &'a str,
        request: &'a ChatRequest,
    ) -> ApiFuture<'a, ChatReply> {
        Box::pin(ApiClient::chat(self, paper_id, request))
    }

    fn chat_history<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, ChatHistory> {
        Box::pin(ApiClient::chat_history(self, session_id))
    }

    fn delete_chat_session<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, Acknowledgement> {
        Box::pin(ApiClient::delete_chat_session(self, session_id))
    }
}
