//! Wire payloads exchanged with the paper assistant backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of a backend background task (parse, translate, summarize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the task has stopped changing.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Papers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(default)]
    pub paper_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub publication_date: Option<String>,
    /// PDF file name or URL the paper was parsed from.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSection {
    #[serde(default)]
    pub section_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub order: u32,
}

fn default_level() -> u32 {
    1
}

/// A parsed paper as returned by `GET /paper/{id}`.
///
/// Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(default)]
    pub paper_id: String,
    #[serde(default)]
    pub metadata: Option<PaperMetadata>,
    #[serde(default)]
    pub sections: Vec<PaperSection>,
    #[serde(default)]
    pub full_content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of `GET /papers/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummaryRow {
    pub paper_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Seconds since the epoch.
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub modified_at: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperList {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub papers: Vec<PaperSummaryRow>,
}

// ── Tasks ───────────────────────────────────────────────────────────────

/// Response to `POST /upload` and `POST /parse_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: String,
}

/// Response to `GET /parse_status/{task}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseStatus {
    pub task_id: String,
    pub status: TaskStatus,
    /// 0-100.
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub paper_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<PaperMetadata>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Job reference returned when translation or summarization is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTicket {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: String,
}

/// Response to `GET /translate/status/{task}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

// ── Artifacts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSegment {
    pub original: String,
    pub translated: String,
    #[serde(default)]
    pub section_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub paper_id: String,
    #[serde(default)]
    pub segments: Vec<TranslationSegment>,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section_title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub paper_id: String,
    pub overall_summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub methodology: Option<String>,
    #[serde(default)]
    pub contributions: Option<String>,
    #[serde(default)]
    pub section_summaries: Vec<SectionSummary>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ── Chat ────────────────────────────────────────────────────────────────

/// Response to `POST /chat/new_session/{paper}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub session_id: String,
    #[serde(default)]
    pub paper_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /chat/{paper}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub paper_id: String,
    pub message: String,
    pub session_id: Option<String>,
    pub stream: bool,
}

/// Response to `POST /chat/{paper}`.
///
/// The documented shape is `{session_id, message: {role, content, timestamp},
/// sources}`. Older backends answered with a flat `content` or an `answer`
/// field instead; [`ChatReply::content_text`] resolves all three.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub answer: Option<Value>,
    #[serde(default)]
    pub sources: Option<Vec<Value>>,
}

impl ChatReply {
    /// The assistant's reply text.
    ///
    /// Precedence: `message.content`, then `content`, then `answer`. Values that
    /// are not strings are rendered as JSON text. `None` if all are absent.
    pub fn content_text(&self) -> Option<String> {
        let nested = self
            .message
            .as_ref()
            .and_then(|m| m.get("content"))
            .filter(|v| !v.is_null());

        let value = nested
            .or(self.content.as_ref().filter(|v| !v.is_null()))
            .or(self.answer.as_ref().filter(|v| !v.is_null()))?;

        Some(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// One message as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response to `GET /chat/history/{session}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// Generic acknowledgement returned by the delete endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
