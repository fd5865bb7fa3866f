use std::{cmp::Ordering, sync::Arc};

use ahash::AHashSet;

use crate::{AnnBackend, Embedder, Error, Result};
use folio_domain::{ScoredCandidate, SourceKind};

/// Semantic ranking: embeds the query text, then asks the ANN backend for neighbors.
#[derive(Clone)]
pub struct VectorIndex {
	embedder: Arc<dyn Embedder>,
	ann: Arc<dyn AnnBackend>,
}
impl VectorIndex {
	pub fn new(embedder: Arc<dyn Embedder>, ann: Arc<dyn AnnBackend>) -> Self {
		Self { embedder, ann }
	}

	pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredCandidate>> {
		self.query_scoped(text, k, None).await
	}

	/// Top `k` chunks by descending similarity, optionally restricted to one document.
	///
	/// Any embedder or backend failure is reported as the vector backend being unavailable.
	pub async fn query_scoped(
		&self,
		text: &str,
		k: usize,
		document_id: Option<&str>,
	) -> Result<Vec<ScoredCandidate>> {
		if k == 0 {
			return Err(Error::invalid_input("k must be greater than zero."));
		}
		if text.trim().is_empty() {
			return Ok(Vec::new());
		}

		let vector = self.embedder.embed(text).await.map_err(unavailable)?;

		if vector.is_empty() {
			return Err(Error::backend(SourceKind::Vector, "Embedder returned an empty vector."));
		}

		let mut hits = self.ann.search(&vector, k, document_id).await.map_err(unavailable)?;

		// Stable, so equal similarities keep the backend's order.
		hits.sort_by(|left, right| cmp_f32_desc(left.1, right.1));

		let mut seen = AHashSet::with_capacity(hits.len());

		hits.retain(|(chunk_id, _)| seen.insert(chunk_id.clone()));
		hits.truncate(k);

		Ok(ScoredCandidate::ranked(SourceKind::Vector, hits))
	}
}

fn unavailable(err: Error) -> Error {
	match err {
		Error::BackendUnavailable { .. } => err,
		other => Error::backend(SourceKind::Vector, other.to_string()),
	}
}

fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
