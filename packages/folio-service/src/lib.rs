pub mod fusion;
pub mod lexical;
pub mod policy;
pub mod retriever;
pub mod snapshot;
pub mod vector;

mod error;

pub use error::{Error, Result};
pub use fusion::RankFuser;
pub use lexical::{Bm25Params, LexicalIndex};
pub use policy::{LowConfidence, RetryPolicy};
pub use retriever::{AdaptiveRetriever, RetrieveRequest};
pub use snapshot::IndexHandle;
pub use vector::VectorIndex;

use std::{future::Future, pin::Pin, sync::Arc};

use folio_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use folio_providers::{embedding, rephrase};
use folio_storage::qdrant::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turns text into a fixed-length vector.
pub trait Embedder
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// Nearest-neighbor lookup returning `(chunk_id, similarity)` pairs, most similar first.
pub trait AnnBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: usize,
		document_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<(String, f32)>>>;
}

/// Proposes an alternate query after a weak first attempt. `None` means no suggestion.
pub trait Rephraser
where
	Self: Send + Sync,
{
	fn rephrase<'a>(
		&'a self,
		query: &'a str,
		reason: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedder: Arc<dyn Embedder>,
	pub ann: Arc<dyn AnnBackend>,
	pub rephraser: Option<Arc<dyn Rephraser>>,
}
impl Providers {
	pub fn new(
		embedder: Arc<dyn Embedder>,
		ann: Arc<dyn AnnBackend>,
		rephraser: Option<Arc<dyn Rephraser>>,
	) -> Self {
		Self { embedder, ann, rephraser }
	}

	/// HTTP embedder, Qdrant backend and, when configured, the HTTP rephraser.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let store = QdrantStore::new(&cfg.storage.qdrant).map_err(|err| {
			Error::invalid_configuration(format!("Failed to build Qdrant client: {err}"))
		})?;
		let rephraser = cfg.providers.rephraser.clone().map(|cfg| {
			let rephraser: Arc<dyn Rephraser> = Arc::new(HttpRephraser::new(cfg));

			rephraser
		});

		Ok(Self {
			embedder: Arc::new(HttpEmbedder::new(cfg.providers.embedding.clone())),
			ann: Arc::new(store),
			rephraser,
		})
	}
}

/// OpenAI-compatible `/embeddings` client.
pub struct HttpEmbedder {
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbedder {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}

impl Embedder for HttpEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			let mut vectors = embedding::embed(&self.cfg, &[text.to_string()])
				.await
				.map_err(|err| Error::EmbeddingUnavailable { message: err.to_string() })?;
			let vector = vectors.pop().ok_or_else(|| Error::EmbeddingUnavailable {
				message: "Embedding response is empty.".to_string(),
			})?;

			if vector.len() != self.cfg.dimensions as usize {
				return Err(Error::EmbeddingUnavailable {
					message: format!(
						"Embedding has {} dimensions; expected {}.",
						vector.len(),
						self.cfg.dimensions
					),
				});
			}

			Ok(vector)
		})
	}
}

/// OpenAI-compatible `/chat/completions` client.
pub struct HttpRephraser {
	cfg: LlmProviderConfig,
}
impl HttpRephraser {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}
}

impl Rephraser for HttpRephraser {
	fn rephrase<'a>(
		&'a self,
		query: &'a str,
		reason: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			rephrase::rephrase(&self.cfg, query, reason)
				.await
				.map_err(|err| Error::RephraseUnavailable { message: err.to_string() })
		})
	}
}

impl AnnBackend for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: usize,
		document_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<(String, f32)>>> {
		Box::pin(async move {
			let hits = QdrantStore::search(self, vector, k, document_id).await?;

			Ok(hits.into_iter().map(|hit| (hit.chunk_id, hit.similarity)).collect())
		})
	}
}
