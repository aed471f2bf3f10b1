//! Client configuration.
//!
//! Every field has a default so a partial (or absent) TOML file works.

use crate::error::Error;
use crate::stream::STREAM_SILENCE_TIMEOUT_SECS;
use serde::Deserialize;

/// Engine configuration, typically loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the chat backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Items requested per page fetch.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Default retrieval-augmented generation toggle for sends.
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    /// Stream silence window in seconds before a send is failed.
    #[serde(default = "default_stream_silence_secs")]
    pub stream_silence_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_page_size() -> usize {
    50
}

fn default_use_rag() -> bool {
    true
}

fn default_stream_silence_secs() -> u64 {
    STREAM_SILENCE_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            use_rag: default_use_rag(),
            stream_silence_secs: default_stream_silence_secs(),
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document; missing fields fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }
}
