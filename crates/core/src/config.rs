use crate::error::{BuildError, CapabilityError};
use crate::models::ResultType;
use crate::net::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

fn default_source_extension() -> String {
    "pdf".to_string()
}

fn default_top_k() -> usize {
    4
}

/// Service configuration loaded from a JSON file at startup.
///
/// Missing required fields fail deserialization, which surfaces as a
/// startup-time fatal rather than a runtime error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory the vector store persists collections under.
    pub storage_path: PathBuf,
    /// Name of the collection inside the storage directory.
    pub collection_name: String,
    /// Extraction fidelity mode.
    pub result_type: ResultType,
    /// Folder holding the source documents.
    pub data_dir: PathBuf,
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, BuildError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            BuildError::InvalidInput(format!(
                "config file {} is unreadable: {error}",
                path.display()
            ))
        })?;
        let config: ServiceConfig = serde_json::from_str(&raw).map_err(|error| {
            BuildError::InvalidInput(format!(
                "config file {} is missing required fields: {error}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.collection_name.trim().is_empty() {
            return Err(BuildError::InvalidInput(
                "collection_name must not be empty".to_string(),
            ));
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(BuildError::InvalidInput(
                "storage_path must not be empty".to_string(),
            ));
        }
        if self.source_extension.trim().is_empty() {
            return Err(BuildError::InvalidInput(
                "source_extension must not be empty".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(BuildError::InvalidInput(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the OpenAI-compatible embedding and generation
/// services.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimensions: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            embedding_dimensions: 1536,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl OpenAiConfig {
    /// Base URL with a trailing slash, so `Url::join` appends rather than
    /// replaces the last path segment.
    pub(crate) fn base_url(&self) -> Result<Url, CapabilityError> {
        let mut base = Url::parse(&self.api_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }
}
