use crate::error::{BuildError, CapabilityError};
use crate::models::{Document, ResultType, META_FILE_NAME, META_PAGE_NUMBER};
use crate::net::{with_retry, RetryPolicy};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Capability that converts a source file into normalized document records,
/// one per readable page.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        path: &Path,
        result_type: ResultType,
    ) -> Result<Vec<Document>, BuildError>;
}

const HEADING_PATTERN: &str = r"^(?:\d+(?:\.\d+)*\s+)?[A-Z][A-Z0-9][A-Z0-9 \-:]{2,}$";

fn file_name_of(path: &Path) -> Result<String, BuildError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| BuildError::Extraction {
            path: path.to_path_buf(),
            reason: "path has no file name".to_string(),
        })
}

fn page_document(path: &Path, file_name: &str, page: u32, text: String) -> Document {
    let mut metadata = BTreeMap::new();
    metadata.insert(META_FILE_NAME.to_string(), file_name.to_string());
    metadata.insert(META_PAGE_NUMBER.to_string(), page.to_string());
    Document {
        source_path: path.to_string_lossy().to_string(),
        text,
        metadata,
    }
}

/// Local extraction backend built on `lopdf`.
#[derive(Default)]
pub struct LopdfExtractor;

fn render_markdown(text: &str, heading_re: &Regex) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim();
            if heading_re.is_match(trimmed) {
                format!("## {trimmed}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl TextExtractor for LopdfExtractor {
    async fn extract(
        &self,
        path: &Path,
        result_type: ResultType,
    ) -> Result<Vec<Document>, BuildError> {
        // Missing files keep their io classification so the builder can tell
        // an empty corpus apart from a broken one.
        fs::metadata(path)?;

        let parsed = lopdf::Document::load(path).map_err(|error| BuildError::Extraction {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let file_name = file_name_of(path)?;
        let heading_re = Regex::new(HEADING_PATTERN)?;
        let mut documents = Vec::new();

        for (page_no, _object_id) in parsed.get_pages() {
            let text = parsed
                .extract_text(&[page_no])
                .map_err(|error| BuildError::Extraction {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                })?;

            if text.trim().is_empty() {
                continue;
            }

            let text = match result_type {
                ResultType::Text => text,
                ResultType::Markdown => render_markdown(&text, &heading_re),
            };

            documents.push(page_document(path, &file_name, page_no, text));
        }

        if documents.is_empty() {
            return Err(BuildError::Extraction {
                path: path.to_path_buf(),
                reason: "pdf had no readable page text".to_string(),
            });
        }

        Ok(documents)
    }
}

/// Connection settings for a remote parse service.
#[derive(Debug, Clone)]
pub struct RemoteParseConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ParseRequest {
    file_base64: String,
    file_name: String,
    result_type: ResultType,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    pages: Option<Vec<ParsedPage>>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParsedPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Extraction backend that delegates parsing to an HTTP service accepting
/// base64 file payloads.
pub struct RemoteParseExtractor {
    config: RemoteParseConfig,
    endpoint: Url,
    client: reqwest::Client,
}

impl RemoteParseExtractor {
    pub fn new(config: RemoteParseConfig) -> Result<Self, CapabilityError> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    async fn parse_once(&self, payload: &ParseRequest) -> Result<ParseResponse, CapabilityError> {
        let mut request = self.client.post(self.endpoint.clone()).json(payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CapabilityError::Backend {
                service: "parse",
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

fn response_to_documents(payload: &ParseResponse, path: &Path, file_name: &str) -> Vec<Document> {
    if let Some(listed) = &payload.pages {
        let documents: Vec<Document> = listed
            .iter()
            .filter_map(|parsed| {
                let text = parsed.text.as_deref().map(str::trim)?;
                if text.is_empty() {
                    return None;
                }
                let page = parsed.page.unwrap_or(1);
                Some(page_document(path, file_name, page, text.to_string()))
            })
            .collect();

        if !documents.is_empty() {
            return documents;
        }
    }

    if let Some(raw_text) = &payload.text {
        return raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, piece)| {
                let trimmed = piece.trim();
                if trimmed.is_empty() {
                    return None;
                }
                Some(page_document(
                    path,
                    file_name,
                    (index + 1) as u32,
                    trimmed.to_string(),
                ))
            })
            .collect();
    }

    Vec::new()
}

#[async_trait]
impl TextExtractor for RemoteParseExtractor {
    async fn extract(
        &self,
        path: &Path,
        result_type: ResultType,
    ) -> Result<Vec<Document>, BuildError> {
        let bytes = fs::read(path)?;
        let file_name = file_name_of(path)?;
        let payload = ParseRequest {
            file_base64: STANDARD.encode(bytes),
            file_name: file_name.clone(),
            result_type,
        };

        let parsed = with_retry(self.config.retry, || self.parse_once(&payload))
            .await
            .map_err(|error| BuildError::Extraction {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        let documents = response_to_documents(&parsed, path, &file_name);
        if documents.is_empty() {
            return Err(BuildError::Extraction {
                path: path.to_path_buf(),
                reason: "parse service returned no readable text".to_string(),
            });
        }

        Ok(documents)
    }
}
