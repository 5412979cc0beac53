use crate::error::QueryError;
use crate::models::DocChunk;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chunk together with its embedding, as persisted in a segment file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk: DocChunk,
    pub vector: Vec<f32>,
}

/// A retrieval hit, scored by cosine similarity.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: DocChunk,
    pub score: f32,
}

/// In-memory handle over one persisted collection generation.
///
/// Built fresh by `VectorIndexStore::build_index` or reconstructed from
/// durable state by `load_index`; read-only either way once constructed.
#[derive(Debug, Clone)]
pub struct Index {
    generation: Uuid,
    dimensions: usize,
    document_count: usize,
    chunks: Vec<StoredChunk>,
}

impl Index {
    pub(crate) fn new(
        generation: Uuid,
        dimensions: usize,
        document_count: usize,
        chunks: Vec<StoredChunk>,
    ) -> Self {
        Self {
            generation,
            dimensions,
            document_count,
            chunks,
        }
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn stored_chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    /// Ranks all chunks against `query_vector` and returns the `top_k` best.
    pub fn retrieve(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, QueryError> {
        if query_vector.len() != self.dimensions {
            return Err(QueryError::Retrieval(format!(
                "query vector dimension {} does not match index dimension {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .map(|stored| RetrievedChunk {
                chunk: stored.chunk.clone(),
                score: cosine_similarity(query_vector, &stored.vector),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut left_norm = 0f32;
    let mut right_norm = 0f32;

    for (l, r) in left.iter().zip(right) {
        dot += l * r;
        left_norm += l * l;
        right_norm += r * r;
    }

    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}
