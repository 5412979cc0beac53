use crate::builder::IndexBuilder;
use crate::chunking::ChunkingOptions;
use crate::config::ServiceConfig;
use crate::embed::Embedder;
use crate::error::{BuildError, QueryError};
use crate::extract::TextExtractor;
use crate::generate::Generator;
use crate::index::Index;
use crate::models::QueryResponse;
use crate::query::QueryEngine;
use crate::sources::list_sources;
use crate::store::VectorIndexStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// The service context: configuration, capabilities and the shared index
/// handle, constructed once at startup and passed by reference.
///
/// Queries run concurrently against the current index; rebuilds are
/// serialized and swap the shared pointer only for the instant of the write
/// lock, so in-flight queries finish against the generation they started on.
pub struct QaService {
    config: ServiceConfig,
    store: VectorIndexStore,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    chunking: ChunkingOptions,
    current: RwLock<Option<Arc<Index>>>,
    rebuild_gate: Mutex<()>,
}

impl QaService {
    pub fn new(
        config: ServiceConfig,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        let store = VectorIndexStore::open(&config.storage_path, &config.collection_name)?;

        Ok(Self {
            config,
            store,
            extractor,
            embedder,
            generator,
            chunking: ChunkingOptions::default(),
            current: RwLock::new(None),
            rebuild_gate: Mutex::new(()),
        })
    }

    pub fn with_chunking(mut self, chunking: ChunkingOptions) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Startup flow: load the persisted index when one exists, build it
    /// from the data folder on first boot.
    pub async fn start(&self) -> Result<(), BuildError> {
        match self.store.load_index() {
            Ok(index) => {
                info!(
                    collection = %self.config.collection_name,
                    generation = %index.generation(),
                    chunks = index.len(),
                    "loaded persisted index"
                );
                *self.current.write().await = Some(Arc::new(index));
                Ok(())
            }
            Err(QueryError::NotFound { .. }) => self.rebuild().await.map(|_| ()),
            Err(error) => Err(BuildError::Failure(error.to_string())),
        }
    }

    /// Full rebuild from the configured data folder. Serialized: a second
    /// caller waits for the first to finish rather than racing the store.
    pub async fn rebuild(&self) -> Result<Arc<Index>, BuildError> {
        let _gate = self.rebuild_gate.lock().await;

        let sources = list_sources(&self.config.data_dir, &self.config.source_extension)?;
        if sources.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let builder = IndexBuilder::new(
            &self.store,
            self.extractor.as_ref(),
            self.embedder.as_ref(),
        )
        .with_chunking(self.chunking);
        let index = Arc::new(builder.rebuild(self.config.result_type, &sources).await?);

        *self.current.write().await = Some(index.clone());
        info!(
            collection = %self.config.collection_name,
            generation = %index.generation(),
            documents = index.document_count(),
            chunks = index.len(),
            "index rebuilt"
        );
        Ok(index)
    }

    /// Answers one question against the current index.
    pub async fn answer(&self, question: &str) -> Result<QueryResponse, QueryError> {
        // clone the Arc and release the lock before any network-bound work
        let index = self.current.read().await.clone().ok_or_else(|| {
            QueryError::NotFound {
                path: self.config.storage_path.clone(),
                collection: self.config.collection_name.clone(),
            }
        })?;

        let engine = QueryEngine::new(
            self.embedder.as_ref(),
            self.generator.as_ref(),
            self.config.top_k,
        );
        engine.answer(&index, question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::error::CapabilityError;
    use crate::models::{Document, ResultType, META_FILE_NAME, META_PAGE_NUMBER};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct CountingExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextExtractor for CountingExtractor {
        async fn extract(
            &self,
            path: &Path,
            _result_type: ResultType,
        ) -> Result<Vec<Document>, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();
            let mut metadata = BTreeMap::new();
            metadata.insert(META_FILE_NAME.to_string(), file_name);
            metadata.insert(META_PAGE_NUMBER.to_string(), "1".to_string());

            Ok(vec![Document {
                source_path: path.to_string_lossy().to_string(),
                text: "Refund policy: 30 days from purchase.".to_string(),
                metadata,
            }])
        }
    }

    struct FakeGenerator {
        reply: String,
        seen_prompt: StdMutex<String>,
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
            *self.seen_prompt.lock().unwrap() = prompt.to_string();
            Ok(self.reply.clone())
        }
    }

    fn config(storage: &Path, data: &Path) -> ServiceConfig {
        ServiceConfig {
            storage_path: storage.to_path_buf(),
            collection_name: "docs".to_string(),
            result_type: ResultType::Text,
            data_dir: data.to_path_buf(),
            source_extension: "pdf".to_string(),
            top_k: 2,
        }
    }

    fn service(storage: &Path, data: &Path, reply: &str) -> (QaService, Arc<CountingExtractor>) {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
        });
        let generator = Arc::new(FakeGenerator {
            reply: reply.to_string(),
            seen_prompt: StdMutex::new(String::new()),
        });
        let service = QaService::new(
            config(storage, data),
            extractor.clone(),
            Arc::new(HashEmbedder::default()),
            generator,
        )
        .unwrap();
        (service, extractor)
    }

    fn seed_data_dir(data: &Path) {
        std::fs::create_dir_all(data).unwrap();
        std::fs::write(data.join("policy.pdf"), b"%PDF-1.4\n%placeholder").unwrap();
    }

    const ANSWER: &str =
        r#"{"response": "The refund window is 30 days.", "reference_link": "policy.pdf", "page_number": 1}"#;

    #[tokio::test]
    async fn first_boot_builds_then_restart_loads_without_extraction() {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("index");
        let data = dir.path().join("data");
        seed_data_dir(&data);

        let (first_boot, extractor) = service(&storage, &data, ANSWER);
        first_boot.start().await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        let answer = first_boot.answer("What is the refund window?").await.unwrap();
        assert!(answer.response.contains("30 days"));

        // a fresh process over the same storage loads instead of rebuilding
        let (second_boot, extractor) = service(&storage, &data, ANSWER);
        second_boot.start().await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);

        let answer = second_boot.answer("What is the refund window?").await.unwrap();
        assert_eq!(answer.reference_link.as_deref(), Some("policy.pdf"));
    }

    #[tokio::test]
    async fn answer_before_any_build_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("index");
        let data = dir.path().join("data");
        seed_data_dir(&data);

        let (service, _extractor) = service(&storage, &data, ANSWER);
        let error = service.answer("anything").await.unwrap_err();
        assert!(matches!(error, QueryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rebuild_on_an_empty_folder_reports_empty_corpus() {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("index");
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();

        let (service, _extractor) = service(&storage, &data, ANSWER);
        let error = service.rebuild().await.unwrap_err();
        assert!(matches!(error, BuildError::EmptyCorpus));
    }

    #[tokio::test]
    async fn repeated_rebuilds_swap_generations_in_place() {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("index");
        let data = dir.path().join("data");
        seed_data_dir(&data);

        let (service, _extractor) = service(&storage, &data, ANSWER);
        let first = service.rebuild().await.unwrap();
        let second = service.rebuild().await.unwrap();

        assert_ne!(first.generation(), second.generation());
        // queries keep working across the swap
        let answer = service.answer("What is the refund window?").await.unwrap();
        assert!(answer.response.contains("30 days"));
    }

    #[tokio::test]
    async fn retrieval_feeds_literal_corpus_text_into_the_prompt() {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("index");
        let data = dir.path().join("data");
        seed_data_dir(&data);

        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
        });
        let generator = Arc::new(FakeGenerator {
            reply: ANSWER.to_string(),
            seen_prompt: StdMutex::new(String::new()),
        });
        let service = QaService::new(
            config(&storage, &data),
            extractor,
            Arc::new(HashEmbedder::default()),
            generator.clone(),
        )
        .unwrap();

        service.start().await.unwrap();
        service.answer("What is the refund window?").await.unwrap();

        let prompt = generator.seen_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Refund policy: 30 days"));
        assert!(prompt.contains("policy.pdf"));
    }
}
