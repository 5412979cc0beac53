use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Metadata key under which extractors record the originating file name.
pub const META_FILE_NAME: &str = "file_name";
/// Metadata key under which extractors record the source page number.
pub const META_PAGE_NUMBER: &str = "page_number";

/// The one recognized `output_type` marker for answers that fall outside the
/// indexed corpus.
pub const OUTPUT_TYPE_NOT_IN_DB: &str = "not_in_db";

/// A unit of extracted content, immutable once produced by an extractor.
///
/// Extraction yields one record per readable page, so page provenance
/// survives all the way into query citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_path: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(META_FILE_NAME).map(String::as_str)
    }

    pub fn page_number(&self) -> Option<u32> {
        self.metadata
            .get(META_PAGE_NUMBER)
            .and_then(|value| value.parse().ok())
    }
}

/// Extraction fidelity mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Plain page text.
    Text,
    /// Structure-preserving text with headings rendered as markdown.
    Markdown,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Text => "text",
            ResultType::Markdown => "markdown",
        }
    }
}

impl FromStr for ResultType {
    type Err = BuildError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(ResultType::Text),
            "markdown" => Ok(ResultType::Markdown),
            other => Err(BuildError::InvalidInput(format!(
                "unrecognized result type: {other}"
            ))),
        }
    }
}

/// One indexed slice of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub source_path: String,
    pub file_name: String,
    pub page_number: Option<u32>,
    pub chunk_index: u64,
    pub text: String,
}

/// The structured answer contract returned to callers.
///
/// `response` is mandatory; everything else is provided by the model when it
/// can ground the answer. `output_type == "not_in_db"` marks an answer that
/// came from outside the indexed corpus.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub response: String,
    pub reference_link: Option<String>,
    pub image_link: Option<String>,
    pub page_number: Option<u32>,
    pub output_type: Option<String>,
}

impl QueryResponse {
    pub fn is_not_in_db(&self) -> bool {
        self.output_type.as_deref() == Some(OUTPUT_TYPE_NOT_IN_DB)
    }
}
