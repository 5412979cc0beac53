use crate::chunking::{chunk_text, normalize_whitespace, ChunkingOptions};
use crate::embed::Embedder;
use crate::error::{BuildError, QueryError};
use crate::index::{Index, StoredChunk};
use crate::models::{DocChunk, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Durable description of the active collection generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub collection_name: String,
    pub generation: Uuid,
    pub dimensions: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

/// Persistent named collection under a storage directory.
///
/// Opening the same `(storage_path, collection_name)` twice resolves to the
/// same durable data. Each rebuild writes a fresh generation segment and
/// atomically repoints the manifest at it; an `Index` loaded from the
/// previous generation keeps answering until it is dropped.
pub struct VectorIndexStore {
    storage_path: PathBuf,
    collection_name: String,
}

impl VectorIndexStore {
    pub fn open(
        storage_path: impl Into<PathBuf>,
        collection_name: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let storage_path = storage_path.into();
        let collection_name = collection_name.into();

        if collection_name.trim().is_empty() {
            return Err(BuildError::InvalidInput(
                "collection name must not be empty".to_string(),
            ));
        }

        let store = Self {
            storage_path,
            collection_name,
        };
        fs::create_dir_all(store.collection_dir())?;
        Ok(store)
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn collection_dir(&self) -> PathBuf {
        self.storage_path.join(&self.collection_name)
    }

    fn manifest_path(&self) -> PathBuf {
        self.collection_dir().join("manifest.json")
    }

    fn segment_path(&self, generation: Uuid) -> PathBuf {
        self.collection_dir().join(format!("segment-{generation}.json"))
    }

    /// Chunks and embeds `documents` into a fresh in-memory generation.
    /// Any embedding failure aborts the whole build; nothing is committed
    /// until `persist` runs.
    pub async fn build_index(
        &self,
        documents: &[Document],
        options: &ChunkingOptions,
        embedder: &dyn Embedder,
    ) -> Result<Index, BuildError> {
        if documents.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let chunks = chunk_documents(documents, options);
        if chunks.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let inputs: Vec<String> = chunks
            .iter()
            .map(|chunk| normalize_whitespace(&chunk.text))
            .collect();
        let vectors = embedder
            .embed_batch(&inputs)
            .await
            .map_err(BuildError::Embedding)?;

        if vectors.len() != chunks.len() {
            return Err(BuildError::Failure(format!(
                "embedding count {} does not match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = embedder.dimensions();
        for vector in &vectors {
            if vector.len() != dimensions {
                return Err(BuildError::Failure(format!(
                    "embedding dimension {} does not match configured {dimensions}",
                    vector.len()
                )));
            }
        }

        let document_count = documents
            .iter()
            .map(|document| document.source_path.as_str())
            .collect::<HashSet<_>>()
            .len();

        let stored = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredChunk { chunk, vector })
            .collect();

        Ok(Index::new(Uuid::new_v4(), dimensions, document_count, stored))
    }

    /// Flushes the index to durable storage: segment first, then the
    /// manifest repoint, both via temp-file + rename.
    pub fn persist(&self, index: &Index) -> Result<(), BuildError> {
        fs::create_dir_all(self.collection_dir())?;

        let segment = serde_json::to_vec(index.stored_chunks())?;
        write_atomic(&self.segment_path(index.generation()), &segment)?;

        let manifest = CollectionManifest {
            collection_name: self.collection_name.clone(),
            generation: index.generation(),
            dimensions: index.dimensions(),
            document_count: index.document_count(),
            chunk_count: index.len(),
            built_at: Utc::now(),
        };
        write_atomic(&self.manifest_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        self.remove_stale_segments(index.generation());

        info!(
            collection = %self.collection_name,
            generation = %index.generation(),
            chunks = index.len(),
            "collection persisted"
        );
        Ok(())
    }

    /// Reconstructs the active generation purely from durable state.
    pub fn load_index(&self) -> Result<Index, QueryError> {
        let raw = match fs::read(self.manifest_path()) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(QueryError::NotFound {
                    path: self.storage_path.clone(),
                    collection: self.collection_name.clone(),
                });
            }
            Err(error) => return Err(QueryError::Storage(error.to_string())),
        };

        let manifest: CollectionManifest = serde_json::from_slice(&raw)
            .map_err(|error| QueryError::Storage(format!("manifest unreadable: {error}")))?;

        let segment = fs::read(self.segment_path(manifest.generation)).map_err(|error| {
            QueryError::Storage(format!(
                "segment missing for generation {}: {error}",
                manifest.generation
            ))
        })?;
        let chunks: Vec<StoredChunk> = serde_json::from_slice(&segment)
            .map_err(|error| QueryError::Storage(format!("segment unreadable: {error}")))?;

        if chunks
            .iter()
            .any(|stored| stored.vector.len() != manifest.dimensions)
        {
            return Err(QueryError::Storage(
                "segment vectors do not match manifest dimensions".to_string(),
            ));
        }

        Ok(Index::new(
            manifest.generation,
            manifest.dimensions,
            manifest.document_count,
            chunks,
        ))
    }

    fn remove_stale_segments(&self, keep: Uuid) {
        let keep_name = format!("segment-{keep}.json");
        let Ok(entries) = fs::read_dir(self.collection_dir()) else {
            return;
        };

        for entry in entries.filter_map(|entry| entry.ok()) {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with("segment-") && name.ends_with(".json") && name != keep_name {
                if let Err(error) = fs::remove_file(entry.path()) {
                    warn!(
                        path = %entry.path().display(),
                        error = %error,
                        "could not remove stale segment"
                    );
                }
            }
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

fn chunk_documents(documents: &[Document], options: &ChunkingOptions) -> Vec<DocChunk> {
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for document in documents {
        let document_id = derive_document_id(&document.source_path);
        let file_name = document
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| file_name_from_path(&document.source_path));
        let page_number = document.page_number();

        for piece in chunk_text(&document.text, options) {
            let chunk_id = derive_chunk_id(&document_id, page_number, cursor, &piece);
            chunks.push(DocChunk {
                chunk_id,
                document_id: document_id.clone(),
                source_path: document.source_path.clone(),
                file_name: file_name.clone(),
                page_number,
                chunk_index: cursor,
                text: piece,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    chunks
}

fn file_name_from_path(source_path: &str) -> String {
    Path::new(source_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source_path)
        .to_string()
}

fn derive_document_id(source_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn derive_chunk_id(document_id: &str, page: Option<u32>, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::models::{META_FILE_NAME, META_PAGE_NUMBER};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn page(source: &str, file_name: &str, page: u32, text: &str) -> Document {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_FILE_NAME.to_string(), file_name.to_string());
        metadata.insert(META_PAGE_NUMBER.to_string(), page.to_string());
        Document {
            source_path: source.to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            page(
                "/data/policy.pdf",
                "policy.pdf",
                1,
                "Refund policy: 30 days from the date of purchase.",
            ),
            page(
                "/data/manual.pdf",
                "manual.pdf",
                3,
                "The relief valve opens at 8 bar of pressure.",
            ),
        ]
    }

    #[tokio::test]
    async fn open_is_idempotent_for_the_same_collection() {
        let dir = tempdir().unwrap();
        let first = VectorIndexStore::open(dir.path(), "docs").unwrap();
        let second = VectorIndexStore::open(dir.path(), "docs").unwrap();
        assert_eq!(first.collection_dir(), second.collection_dir());
        assert!(first.collection_dir().is_dir());
    }

    #[tokio::test]
    async fn build_persist_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = VectorIndexStore::open(dir.path(), "docs").unwrap();
        let embedder = HashEmbedder::default();

        let built = store
            .build_index(&corpus(), &ChunkingOptions::default(), &embedder)
            .await
            .unwrap();
        store.persist(&built).unwrap();

        let loaded = store.load_index().unwrap();
        assert_eq!(loaded.generation(), built.generation());
        assert_eq!(loaded.len(), built.len());
        assert_eq!(loaded.document_count(), 2);

        // the loaded index answers literal corpus content
        let query = embedder.embed("refund 30 days").await.unwrap();
        let hits = loaded.retrieve(&query, 1).unwrap();
        assert!(hits[0].chunk.text.contains("30 days"));
        assert_eq!(hits[0].chunk.file_name, "policy.pdf");
    }

    #[tokio::test]
    async fn load_without_prior_build_is_not_found() {
        let dir = tempdir().unwrap();
        let store = VectorIndexStore::open(dir.path(), "docs").unwrap();

        let error = store.load_index().unwrap_err();
        assert!(matches!(error, QueryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rebuild_repoints_one_collection_and_drops_stale_segments() {
        let dir = tempdir().unwrap();
        let store = VectorIndexStore::open(dir.path(), "docs").unwrap();
        let embedder = HashEmbedder::default();
        let options = ChunkingOptions::default();

        let first = store
            .build_index(&corpus(), &options, &embedder)
            .await
            .unwrap();
        store.persist(&first).unwrap();

        let second = store
            .build_index(&corpus(), &options, &embedder)
            .await
            .unwrap();
        store.persist(&second).unwrap();

        assert_ne!(first.generation(), second.generation());
        assert_eq!(store.load_index().unwrap().generation(), second.generation());

        // exactly one collection directory, holding one segment and no temp files
        let collections: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .collect();
        assert_eq!(collections.len(), 1);

        let names: Vec<String> = fs::read_dir(store.collection_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names
                .iter()
                .filter(|name| name.starts_with("segment-"))
                .count(),
            1
        );
        assert!(names.iter().all(|name| !name.ends_with(".tmp")));
    }

    #[tokio::test]
    async fn building_from_no_documents_is_an_empty_corpus() {
        let dir = tempdir().unwrap();
        let store = VectorIndexStore::open(dir.path(), "docs").unwrap();

        let error = store
            .build_index(&[], &ChunkingOptions::default(), &HashEmbedder::default())
            .await
            .unwrap_err();
        assert!(matches!(error, BuildError::EmptyCorpus));
    }

    #[tokio::test]
    async fn blank_documents_are_an_empty_corpus() {
        let dir = tempdir().unwrap();
        let store = VectorIndexStore::open(dir.path(), "docs").unwrap();
        let blank = vec![page("/data/blank.pdf", "blank.pdf", 1, "   ")];

        let error = store
            .build_index(&blank, &ChunkingOptions::default(), &HashEmbedder::default())
            .await
            .unwrap_err();
        assert!(matches!(error, BuildError::EmptyCorpus));
    }

    #[test]
    fn chunk_ids_are_stable_per_content() {
        let options = ChunkingOptions::default();
        let first = chunk_documents(&corpus(), &options);
        let second = chunk_documents(&corpus(), &options);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].chunk_id, second[0].chunk_id);
        assert_ne!(first[0].chunk_id, first[1].chunk_id);
    }
}
