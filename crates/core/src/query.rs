use crate::embed::Embedder;
use crate::error::QueryError;
use crate::generate::Generator;
use crate::index::{Index, RetrievedChunk};
use crate::models::QueryResponse;
use std::fmt::Write;

/// Answers free-text questions against a loaded index: retrieve, augment,
/// generate, then validate the structured reply.
pub struct QueryEngine<'a> {
    embedder: &'a dyn Embedder,
    generator: &'a dyn Generator,
    top_k: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(embedder: &'a dyn Embedder, generator: &'a dyn Generator, top_k: usize) -> Self {
        Self {
            embedder,
            generator,
            top_k: top_k.max(1),
        }
    }

    pub async fn answer(&self, index: &Index, question: &str) -> Result<QueryResponse, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::Retrieval("question is empty".to_string()));
        }

        let query_vector = self
            .embedder
            .embed(question)
            .await
            .map_err(QueryError::Embedding)?;
        let hits = index.retrieve(&query_vector, self.top_k)?;

        let prompt = build_prompt(question, &hits);
        let raw = self
            .generator
            .complete(&prompt)
            .await
            .map_err(QueryError::Generation)?;

        parse_response(&raw)
    }
}

fn build_prompt(question: &str, hits: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for (position, hit) in hits.iter().enumerate() {
        let _ = write!(context, "[{}] {}", position + 1, hit.chunk.file_name);
        if let Some(page) = hit.chunk.page_number {
            let _ = write!(context, ", page {page}");
        }
        let _ = write!(context, "\n{}\n---\n", hit.chunk.text);
    }

    format!(
        "You are an assistant that answers questions about an indexed document collection.\n\
         Answer from the numbered context passages below whenever they cover the question.\n\
         Do not answer if the question is not safe for work.\n\
         \n\
         Context passages:\n\
         {context}\n\
         User asks: \"{question}\"\n\
         \n\
         Reply with a single JSON object and nothing else, using these fields:\n\
         - \"response\": the answer text, ideally referring to headings or figures from the source.\n\
         - \"reference_link\": the source document name (or a link) the answer came from.\n\
         - \"image_link\": a link to a relevant image, when one exists.\n\
         - \"page_number\": the page number where the answer was found, as a number.\n\
         If the question falls outside the context passages, also set \"output_type\" to \"not_in_db\" \
         and answer from general knowledge when it is safe to do so.\n"
    )
}

/// Validates the generation output against the structured answer contract.
/// A reply that does not parse is a hard error; no repair or re-prompt loop.
fn parse_response(raw: &str) -> Result<QueryResponse, QueryError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|error| QueryError::MalformedResponse(error.to_string()))
}

/// Models frequently wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
