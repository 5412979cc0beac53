use crate::chunking::ChunkingOptions;
use crate::embed::Embedder;
use crate::error::BuildError;
use crate::extract::TextExtractor;
use crate::index::Index;
use crate::models::{Document, ResultType};
use crate::store::VectorIndexStore;
use std::io;
use std::path::PathBuf;
use tracing::info;

/// Orchestrates extraction, embedding and persistence into one full rebuild.
///
/// Borrows the store and the capabilities it composes; holds no state of its
/// own beyond the chunking bounds.
pub struct IndexBuilder<'a> {
    store: &'a VectorIndexStore,
    extractor: &'a dyn TextExtractor,
    embedder: &'a dyn Embedder,
    chunking: ChunkingOptions,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        store: &'a VectorIndexStore,
        extractor: &'a dyn TextExtractor,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            store,
            extractor,
            embedder,
            chunking: ChunkingOptions::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingOptions) -> Self {
        self.chunking = chunking;
        self
    }

    /// Reprocesses every supplied source from scratch and persists the
    /// resulting index. There is no incremental path.
    pub async fn rebuild(
        &self,
        result_type: ResultType,
        sources: &[PathBuf],
    ) -> Result<Index, BuildError> {
        if sources.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let mut documents: Vec<Document> = Vec::new();
        for path in sources {
            let extracted = self
                .extractor
                .extract(path, result_type)
                .await
                .map_err(classify_build_error)?;
            documents.extend(extracted);
        }

        info!(
            sources = sources.len(),
            documents = documents.len(),
            collection = %self.store.collection_name(),
            "building index"
        );

        let index = self
            .store
            .build_index(&documents, &self.chunking, self.embedder)
            .await?;
        self.store.persist(&index)?;

        Ok(index)
    }
}

/// Missing-file-class failures mean the corpus is gone rather than broken,
/// which callers treat as an operator-recoverable condition.
fn classify_build_error(error: BuildError) -> BuildError {
    match error {
        BuildError::Io(io_error) if io_error.kind() == io::ErrorKind::NotFound => {
            BuildError::EmptyCorpus
        }
        other => other,
    }
}
