use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::paper::ArtifactOptions;

/// Default interval between task status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default upper bound on how long to wait for a background task.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub translation: Option<TranslationConfig>,
    pub summary: Option<SummaryConfig>,
    pub polling: Option<PollingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub summary_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_secs: Option<u64>,
    pub max_wait_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/paperdesk/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperdesk").join("config.toml"))
}

/// Load config by cascading CWD `.paperdesk.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".paperdesk.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api: Some(ApiConfig {
            base_url: overlay
                .api
                .as_ref()
                .and_then(|a| a.base_url.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.base_url.clone())),
            timeout_secs: overlay
                .api
                .as_ref()
                .and_then(|a| a.timeout_secs)
                .or_else(|| base.api.as_ref().and_then(|a| a.timeout_secs)),
        }),
        translation: Some(TranslationConfig {
            source_lang: overlay
                .translation
                .as_ref()
                .and_then(|t| t.source_lang.clone())
                .or_else(|| {
                    base.translation
                        .as_ref()
                        .and_then(|t| t.source_lang.clone())
                }),
            target_lang: overlay
                .translation
                .as_ref()
                .and_then(|t| t.target_lang.clone())
                .or_else(|| {
                    base.translation
                        .as_ref()
                        .and_then(|t| t.target_lang.clone())
                }),
        }),
        summary: Some(SummaryConfig {
            summary_type: overlay
                .summary
                .as_ref()
                .and_then(|s| s.summary_type.clone())
                .or_else(|| base.summary.as_ref().and_then(|s| s.summary_type.clone())),
        }),
        polling: Some(PollingConfig {
            interval_secs: overlay
                .polling
                .as_ref()
                .and_then(|p| p.interval_secs)
                .or_else(|| base.polling.as_ref().and_then(|p| p.interval_secs)),
            max_wait_secs: overlay
                .polling
                .as_ref()
                .and_then(|p| p.max_wait_secs)
                .or_else(|| base.polling.as_ref().and_then(|p| p.max_wait_secs)),
        }),
    }
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content = to_toml(config)?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}

/// Render a config as it would be written to disk.
pub fn to_toml(config: &ConfigFile) -> Result<String, String> {
    toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))
}

impl ConfigFile {
    /// Gateway settings, falling back to the built-in defaults.
    pub fn client_config(&self) -> ClientConfig {
        let api = self.api.clone().unwrap_or_default();
        ClientConfig {
            base_url: api.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: api
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        }
    }

    /// Artifact request parameters, falling back to the backend's defaults.
    pub fn artifact_options(&self) -> ArtifactOptions {
        let defaults = ArtifactOptions::default();
        let translation = self.translation.clone().unwrap_or_default();
        let summary = self.summary.clone().unwrap_or_default();
        ArtifactOptions {
            source_lang: translation.source_lang.unwrap_or(defaults.source_lang),
            target_lang: translation.target_lang.unwrap_or(defaults.target_lang),
            summary_type: summary.summary_type.unwrap_or(defaults.summary_type),
        }
    }

    /// `(interval, max_wait)` for task polling.
    pub fn polling(&self) -> (Duration, Duration) {
        let polling = self.polling.clone().unwrap_or_default();
        (
            polling
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            polling
                .max_wait_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MAX_WAIT),
        )
    }
}
