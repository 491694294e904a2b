use std::sync::Arc;

pub mod api;
pub mod chat;
pub mod client;
pub mod config_file;
pub mod error;
pub mod models;
pub mod paper;
pub mod router;

// Re-export for convenience
pub use api::{ChatApi, PaperApi};
pub use chat::{ChatSession, ChatStore, Message, Role};
pub use client::{ApiClient, ClientConfig};
pub use config_file::ConfigFile;
pub use error::ApiError;
pub use paper::{ArtifactOptions, PaperStore};
pub use router::{Route, resolve};

/// Per-session application state: one gateway shared by both containers.
///
/// Construct one per running client and pass it by reference to views.
pub struct AppState {
    pub client: Arc<ApiClient>,
    pub papers: PaperStore,
    pub chat: ChatStore,
}

impl AppState {
    pub fn new(config: &ConfigFile) -> Result<Self, ApiError> {
        let client = Arc::new(ApiClient::new(config.client_config())?);
        Ok(Self::with_client(client, config.artifact_options()))
    }

    pub fn with_client(client: Arc<ApiClient>, options: ArtifactOptions) -> Self {
        Self {
            papers: PaperStore::with_options(client.clone(), options),
            chat: ChatStore::new(client.clone()),
            client,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("base_url", &self.client.base_url())
            .field("current_paper", &self.papers.current_paper_id())
            .field("current_session", &self.chat.current_session_id())
            .finish()
    }
}
