//! State container for the currently open paper and its artifacts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::PaperApi;
use crate::client::{DEFAULT_SOURCE_LANG, DEFAULT_SUMMARY_TYPE, DEFAULT_TARGET_LANG};
use crate::error::ApiError;
use crate::models::{Paper, PaperMetadata, Summary, TaskTicket, Translation};

/// Parameters sent when requesting artifact generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOptions {
    pub source_lang: String,
    pub target_lang: String,
    pub summary_type: String,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            source_lang: DEFAULT_SOURCE_LANG.to_string(),
            target_lang: DEFAULT_TARGET_LANG.to_string(),
            summary_type: DEFAULT_SUMMARY_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct PaperState {
    /// Id the current paper was requested under.
    paper_id: Option<String>,
    paper: Option<Paper>,
    metadata: Option<PaperMetadata>,
    translation: Option<Translation>,
    summary: Option<Summary>,
    /// Number of `load_paper` calls in flight.
    loading: usize,
    error: Option<String>,
}

/// Holds one "current" paper plus its translation and summary.
///
/// All methods take `&self`; the lock is never held across a backend call, so
/// concurrent operations interleave only between awaits. Two overlapping
/// `load_paper` calls race: the last one to resolve wins.
pub struct PaperStore {
    api: Arc<dyn PaperApi>,
    options: ArtifactOptions,
    state: Mutex<PaperState>,
}

/// Decrements the in-flight counter however `load_paper` exits.
struct LoadingGuard<'a> {
    store: &'a PaperStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.store.state();
        state.loading = state.loading.saturating_sub(1);
    }
}

impl PaperStore {
    pub fn new(api: Arc<dyn PaperApi>) -> Self {
        Self::with_options(api, ArtifactOptions::default())
    }

    pub fn with_options(api: Arc<dyn PaperApi>, options: ArtifactOptions) -> Self {
        Self {
            api,
            options,
            state: Mutex::new(PaperState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a paper and make it current.
    ///
    /// On failure the message is recorded in [`error`](Self::error) and the
    /// error is returned; the previous paper, if any, stays current.
    pub async fn load_paper(&self, paper_id: &str) -> Result<(), ApiError> {
        {
            let mut state = self.state();
            state.loading += 1;
            state.error = None;
        }
        let _guard = LoadingGuard { store: self };

        match self.api.get_paper(paper_id).await {
            Ok(paper) => {
                let mut state = self.state();
                if state.paper_id.as_deref() != Some(paper_id) {
                    state.translation = None;
                    state.summary = None;
                }
                state.paper_id = Some(paper_id.to_string());
                state.metadata = paper.metadata.clone();
                state.paper = Some(paper);
                tracing::debug!(paper_id, "paper loaded");
                Ok(())
            }
            Err(e) => {
                self.state().error = Some(e.message().to_string());
                Err(e)
            }
        }
    }

    /// Fetch the stored translation. Best effort: failures (including "not
    /// translated yet") are logged and leave the current value untouched.
    ///
    /// Returns whether a translation was stored.
    pub async fn load_translation(&self, paper_id: &str) -> bool {
        match self.api.get_translation(paper_id).await {
            Ok(translation) => {
                self.state().translation = Some(translation);
                true
            }
            Err(e) => {
                tracing::warn!(paper_id, error = %e, "failed to load translation");
                false
            }
        }
    }

    /// Fetch the stored summary. Best effort, like [`load_translation`](Self::load_translation).
    pub async fn load_summary(&self, paper_id: &str) -> bool {
        match self.api.get_summary(paper_id).await {
            Ok(summary) => {
                self.state().summary = Some(summary);
                true
            }
            Err(e) => {
                tracing::warn!(paper_id, error = %e, "failed to load summary");
                false
            }
        }
    }

    /// Ask the backend to translate a paper. Local state is not touched.
    pub async fn request_translation(&self, paper_id: &str) -> Result<TaskTicket, ApiError> {
        self.api
            .translate_paper(
                paper_id,
                &self.options.source_lang,
                &self.options.target_lang,
            )
            .await
    }

    /// Ask the backend to summarize a paper. Local state is not touched.
    pub async fn request_summary(&self, paper_id: &str) -> Result<TaskTicket, ApiError> {
        self.api
            .generate_summary(paper_id, &self.options.summary_type)
            .await
    }

    /// Forget the current paper, its artifacts and any recorded error.
    pub fn clear_paper(&self) {
        let mut state = self.state();
        state.paper_id = None;
        state.paper = None;
        state.metadata = None;
        state.translation = None;
        state.summary = None;
        state.error = None;
    }

    pub fn has_paper(&self) -> bool {
        self.state().paper.is_some()
    }

    pub fn has_translation(&self) -> bool {
        self.state().translation.is_some()
    }

    pub fn has_summary(&self) -> bool {
        self.state().summary.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading > 0
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn current_paper_id(&self) -> Option<String> {
        self.state().paper_id.clone()
    }

    pub fn paper(&self) -> Option<Paper> {
        self.state().paper.clone()
    }

    pub fn metadata(&self) -> Option<PaperMetadata> {
        self.state().metadata.clone()
    }

    pub fn translation(&self) -> Option<Translation> {
        self.state().translation.clone()
    }

    pub fn summary(&self) -> Option<Summary> {
        self.state().summary.clone()
    }

    pub fn options(&self) -> &ArtifactOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockApi, MockReply};
    use serde_json::json;
    use std::time::Duration;

    fn paper_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "paper_id": id,
            "metadata": {"paper_id": id, "title": title},
            "sections": [],
            "full_content": format!("# {title}")
        })
    }

    fn translation_json(id: &str) -> serde_json::Value {
        json!({
            "paper_id": id,
            "segments": [{"original": "Hello", "translated": "你好"}],
            "status": "completed"
        })
    }

    fn summary_json(id: &str) -> serde_json::Value {
        json!({
            "paper_id": id,
            "overall_summary": "short",
            "key_points": ["a"],
            "section_summaries": []
        })
    }

    fn store(mock: MockApi) -> (PaperStore, Arc<MockApi>) {
        let mock = Arc::new(mock);
        (PaperStore::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn load_paper_success_sets_paper_and_metadata() {
        let (store, _) =
            store(MockApi::new().on("get_paper", MockReply::Ok(paper_json("p1", "Attention"))));

        store.load_paper("p1").await.unwrap();

        assert!(store.has_paper());
        assert!(!store.is_loading());
        assert_eq!(store.error(), None);
        assert_eq!(
            store.metadata().and_then(|m| m.title).as_deref(),
            Some("Attention")
        );
        assert_eq!(store.current_paper_id().as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn load_paper_failure_records_and_returns_error() {
        let (store, _) = store(
            MockApi::new().on("get_paper", MockReply::backend(404, "paper does not exist")),
        );

        let err = store.load_paper("missing").await.unwrap_err();

        assert_eq!(err.message(), "paper does not exist");
        assert_eq!(store.error().as_deref(), Some("paper does not exist"));
        assert!(!store.has_paper());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_paper() {
        let (store, _) = store(
            MockApi::new()
                .on("get_paper", MockReply::Ok(paper_json("p1", "First")))
                .on("get_paper", MockReply::backend(500, "boom")),
        );

        store.load_paper("p1").await.unwrap();
        assert!(store.load_paper("p2").await.is_err());

        assert!(store.has_paper());
        assert_eq!(store.current_paper_id().as_deref(), Some("p1"));
        assert_eq!(store.error().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn successful_load_clears_previous_error() {
        let (store, _) = store(
            MockApi::new()
                .on("get_paper", MockReply::backend(500, "boom"))
                .on("get_paper", MockReply::Ok(paper_json("p1", "First"))),
        );

        let _ = store.load_paper("p1").await;
        assert!(store.error().is_some());
        store.load_paper("p1").await.unwrap();
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn loading_flag_is_set_while_in_flight() {
        let (store, _) = store(
            MockApi::new()
                .on("get_paper", MockReply::Ok(paper_json("p1", "Slow")))
                .with_delay(Duration::from_millis(200)),
        );
        let store = Arc::new(store);

        let handle = {
            let store = store.clone();
            tokio::spawn(async move { store.load_paper("p1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_loading());

        handle.await.unwrap().unwrap();
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn loading_a_different_paper_drops_old_artifacts() {
        let (store, _) = store(
            MockApi::new()
                .on("get_paper", MockReply::Ok(paper_json("p1", "First")))
                .on("get_paper", MockReply::Ok(paper_json("p2", "Second")))
                .on("get_translation", MockReply::Ok(translation_json("p1")))
                .on("get_summary", MockReply::Ok(summary_json("p1"))),
        );

        store.load_paper("p1").await.unwrap();
        assert!(store.load_translation("p1").await);
        assert!(store.load_summary("p1").await);
        assert!(store.has_translation());
        assert!(store.has_summary());

        store.load_paper("p2").await.unwrap();
        assert!(!store.has_translation());
        assert!(!store.has_summary());
    }

    #[tokio::test]
    async fn reloading_same_paper_keeps_artifacts() {
        let (store, _) = store(
            MockApi::new()
                .on("get_paper", MockReply::Ok(paper_json("p1", "First")))
                .on("get_translation", MockReply::Ok(translation_json("p1"))),
        );

        store.load_paper("p1").await.unwrap();
        store.load_translation("p1").await;
        store.load_paper("p1").await.unwrap();
        assert!(store.has_translation());
    }

    #[tokio::test]
    async fn missing_translation_is_not_an_error() {
        let (store, mock) = store(
            MockApi::new().on("get_translation", MockReply::backend(404, "translation not found")),
        );

        let loaded = store.load_translation("p1").await;

        assert!(!loaded);
        assert!(!store.has_translation());
        assert_eq!(store.error(), None);
        assert_eq!(mock.call_count("get_translation"), 1);
    }

    #[tokio::test]
    async fn missing_summary_is_not_an_error() {
        let (store, _) =
            store(MockApi::new().on("get_summary", MockReply::backend(404, "summary not found")));

        assert!(!store.load_summary("p1").await);
        assert!(!store.has_summary());
    }

    #[tokio::test]
    async fn requests_return_ticket_without_touching_state() {
        let ticket = json!({"task_id": "p1_translation", "status": "processing", "message": "ok"});
        let (store, _) = store(
            MockApi::new()
                .on("translate_paper", MockReply::Ok(ticket))
                .on(
                    "generate_summary",
                    MockReply::Ok(json!({"task_id": "p1_summary", "status": "processing"})),
                ),
        );

        let t = store.request_translation("p1").await.unwrap();
        let s = store.request_summary("p1").await.unwrap();

        assert_eq!(t.task_id, "p1_translation");
        assert_eq!(s.task_id, "p1_summary");
        assert!(!store.has_translation());
        assert!(!store.has_summary());
        assert!(!store.has_paper());
    }

    #[tokio::test]
    async fn request_errors_propagate() {
        let (store, _) =
            store(MockApi::new().on("translate_paper", MockReply::backend(404, "paper missing")));
        let err = store.request_translation("p1").await.unwrap_err();
        assert_eq!(err.to_string(), "paper missing");
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn clear_paper_resets_everything() {
        let (store, _) = store(
            MockApi::new()
                .on("get_paper", MockReply::Ok(paper_json("p1", "First")))
                .on("get_summary", MockReply::Ok(summary_json("p1"))),
        );
        store.load_paper("p1").await.unwrap();
        store.load_summary("p1").await;

        store.clear_paper();

        assert!(!store.has_paper());
        assert!(!store.has_summary());
        assert!(!store.has_translation());
        assert_eq!(store.metadata(), None);
        assert_eq!(store.current_paper_id(), None);
    }

    #[test]
    fn default_options_match_backend_defaults() {
        let opts = ArtifactOptions::default();
        assert_eq!(opts.source_lang, "英文");
        assert_eq!(opts.target_lang, "中文");
        assert_eq!(opts.summary_type, "comprehensive");
    }
}
