pub mod builder;
pub mod chunking;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod models;
pub mod net;
pub mod query;
pub mod service;
pub mod sources;
pub mod store;

pub use builder::IndexBuilder;
pub use chunking::{chunk_text, normalize_whitespace, ChunkingOptions};
pub use config::{OpenAiConfig, ServiceConfig};
pub use embed::{Embedder, HashEmbedder, OpenAiEmbedder, DEFAULT_HASH_DIMENSIONS};
pub use error::{BuildError, CapabilityError, QueryError};
pub use extract::{LopdfExtractor, RemoteParseConfig, RemoteParseExtractor, TextExtractor};
pub use generate::{Generator, OpenAiGenerator};
pub use index::{Index, RetrievedChunk, StoredChunk};
pub use models::{
    DocChunk, Document, QueryResponse, ResultType, META_FILE_NAME, META_PAGE_NUMBER,
    OUTPUT_TYPE_NOT_IN_DB,
};
pub use net::RetryPolicy;
pub use query::QueryEngine;
pub use service::QaService;
pub use sources::list_sources;
pub use store::{CollectionManifest, VectorIndexStore};
