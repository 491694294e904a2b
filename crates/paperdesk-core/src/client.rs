//! HTTP gateway to the paper assistant backend.
//!
//! One method per backend endpoint. Successful responses are decoded into the
//! payload types in [`crate::models`]; failures are normalized into a single
//! [`ApiError`] message (see [`crate::error`]).

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, failure_from_body};
use crate::models::{
    Acknowledgement, ChatHistory, ChatReply, ChatRequest, NewSession, Paper, PaperList,
    ParseStatus, Summary, TaskProgress, TaskTicket, Translation, UploadResponse,
};

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default request timeout. Document parsing can take minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

pub const DEFAULT_SOURCE_LANG: &str = "英文";
pub const DEFAULT_TARGET_LANG: &str = "中文";
pub const DEFAULT_SUMMARY_TYPE: &str = "comprehensive";

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The gateway. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        tracing::debug!(call = what, "backend request");
        let result = match req.send().await {
            Ok(resp) => decode_response(resp).await,
            Err(e) => Err(ApiError::from(e)),
        };
        if let Err(ref e) = result {
            tracing::warn!(call = what, status = ?e.status(), error = %e, "backend call failed");
        }
        result
    }

    // ── Upload & parse ──────────────────────────────────────────────────

    /// `POST /upload` with the file as multipart field `file`.
    pub async fn upload_paper(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);
        let req = self.http.post(self.url("/upload")).multipart(form);
        self.send(req, "upload").await
    }

    /// `POST /parse_url?url=...`
    pub async fn parse_url(&self, url: &str) -> Result<UploadResponse, ApiError> {
        let req = self
            .http
            .post(self.url("/parse_url"))
            .query(&[("url", url)]);
        self.send(req, "parse_url").await
    }

    pub async fn parse_status(&self, task_id: &str) -> Result<ParseStatus, ApiError> {
        let path = format!("/parse_status/{}", urlencoding::encode(task_id));
        self.send(self.http.get(self.url(&path)), "parse_status")
            .await
    }

    // ── Papers ──────────────────────────────────────────────────────────

    pub async fn get_paper(&self, paper_id: &str) -> Result<Paper, ApiError> {
        let path = format!("/paper/{}", urlencoding::encode(paper_id));
        self.send(self.http.get(self.url(&path)), "get_paper").await
    }

    pub async fn list_papers(&self) -> Result<PaperList, ApiError> {
        self.send(self.http.get(self.url("/papers/list")), "list_papers")
            .await
    }

    pub async fn delete_paper(&self, paper_id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/paper/{}", urlencoding::encode(paper_id));
        self.send(self.http.delete(self.url(&path)), "delete_paper")
            .await
    }

    // ── Translation ─────────────────────────────────────────────────────

    /// `POST /translate/{paper}?source_lang=..&target_lang=..`
    pub async fn translate_paper(
        &self,
        paper_id: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TaskTicket, ApiError> {
        let path = format!("/translate/{}", urlencoding::encode(paper_id));
        let req = self
            .http
            .post(self.url(&path))
            .query(&[("source_lang", source_lang), ("target_lang", target_lang)]);
        self.send(req, "translate").await
    }

    pub async fn translation_status(&self, task_id: &str) -> Result<TaskProgress, ApiError> {
        let path = format!("/translate/status/{}", urlencoding::encode(task_id));
        self.send(self.http.get(self.url(&path)), "translation_status")
            .await
    }

    pub async fn get_translation(&self, paper_id: &str) -> Result<Translation, ApiError> {
        let path = format!("/translate/result/{}", urlencoding::encode(paper_id));
        self.send(self.http.get(self.url(&path)), "get_translation")
            .await
    }

    // ── Summary ─────────────────────────────────────────────────────────

    /// `POST /summary/{paper}?summary_type=..`
    pub async fn generate_summary(
        &self,
        paper_id: &str,
        summary_type: &str,
    ) -> Result<TaskTicket, ApiError> {
        let path = format!("/summary/{}", urlencoding::encode(paper_id));
        let req = self
            .http
            .post(self.url(&path))
            .query(&[("summary_type", summary_type)]);
        self.send(req, "summarize").await
    }

    pub async fn get_summary(&self, paper_id: &str) -> Result<Summary, ApiError> {
        let path = format!("/summary/{}", urlencoding::encode(paper_id));
        self.send(self.http.get(self.url(&path)), "get_summary")
            .await
    }

    // ── Chat ────────────────────────────────────────────────────────────

    pub async fn create_chat_session(&self, paper_id: &str) -> Result<NewSession, ApiError> {
        let path = format!("/chat/new_session/{}", urlencoding::encode(paper_id));
        self.send(self.http.post(self.url(&path)), "create_chat_session")
            .await
    }

    pub async fn chat(&self, paper_id: &str, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let path = format!("/chat/{}", urlencoding::encode(paper_id));
        let req = self.http.post(self.url(&path)).json(request);
        self.send(req, "chat").await
    }

    pub async fn chat_history(&self, session_id: &str) -> Result<ChatHistory, ApiError> {
        let path = format!("/chat/history/{}", urlencoding::encode(session_id));
        self.send(self.http.get(self.url(&path)), "chat_history")
            .await
    }

    pub async fn delete_chat_session(
        &self,
        session_id: &str,
    ) -> Result<Acknowledgement, ApiError> {
        let path = format!("/chat/session/{}", urlencoding::encode(session_id));
        self.send(self.http.delete(self.url(&path)), "delete_chat_session")
            .await
    }
}

/// Unwrap a backend response: decode the JSON body on success, normalize the
/// error body otherwise.
pub async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await?;

    if !status.is_success() {
        return Err(failure_from_body(status.as_u16(), &body));
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
