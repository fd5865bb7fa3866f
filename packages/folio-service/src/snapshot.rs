use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::{
	Result,
	lexical::{Bm25Params, LexicalIndex},
};
use folio_domain::Chunk;

/// Publishes immutable [`LexicalIndex`] snapshots.
///
/// Readers hold the `Arc` they loaded for as long as they need it, so a publish never affects a
/// query already in flight.
#[derive(Debug)]
pub struct IndexHandle {
	current: ArcSwapOption<LexicalIndex>,
}
impl IndexHandle {
	pub fn new() -> Self {
		Self { current: ArcSwapOption::empty() }
	}

	pub fn with_index(index: LexicalIndex) -> Self {
		let handle = Self::new();

		handle.publish(index);

		handle
	}

	/// Swaps in `index` and returns the snapshot it replaced.
	pub fn publish(&self, index: LexicalIndex) -> Option<Arc<LexicalIndex>> {
		self.install(Arc::new(index))
	}

	/// Builds a fresh index from `corpus` and publishes it. The current snapshot stays live when
	/// the build fails.
	pub fn rebuild(&self, corpus: &[Chunk], params: Bm25Params) -> Result<Arc<LexicalIndex>> {
		let index = Arc::new(LexicalIndex::build(corpus, params)?);

		self.install(index.clone());

		Ok(index)
	}

	pub fn snapshot(&self) -> Option<Arc<LexicalIndex>> {
		self.current.load_full()
	}

	pub fn clear(&self) -> Option<Arc<LexicalIndex>> {
		self.current.swap(None)
	}

	fn install(&self, index: Arc<LexicalIndex>) -> Option<Arc<LexicalIndex>> {
		tracing::info!(
			chunks = index.len(),
			fingerprint = %index.fingerprint(),
			"Published lexical index snapshot."
		);

		self.current.swap(Some(index))
	}
}
impl Default for IndexHandle {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(id: &str, text: &str) -> Chunk {
		Chunk {
			chunk_id: id.to_string(),
			document_id: "doc".to_string(),
			section_id: String::new(),
			text: text.to_string(),
			token_count: 0,
		}
	}

	#[test]
	fn readers_keep_their_snapshot_across_publish() {
		let handle = IndexHandle::new();

		assert!(handle.snapshot().is_none());

		handle
			.rebuild(&[chunk("a", "golden sandals")], Bm25Params::default())
			.expect("Rebuild failed.");

		let before = handle.snapshot().expect("Expected a snapshot.");

		handle.rebuild(&[chunk("b", "silver bow")], Bm25Params::default()).expect("Rebuild failed.");

		let after = handle.snapshot().expect("Expected a snapshot.");

		assert_eq!(before.query("sandals", 5).expect("Query failed.")[0].chunk_id, "a");
		assert!(after.query("sandals", 5).expect("Query failed.").is_empty());
		assert_eq!(after.query("bow", 5).expect("Query failed.")[0].chunk_id, "b");
	}

	#[test]
	fn failed_rebuild_keeps_current_snapshot() {
		let handle = IndexHandle::new();

		handle
			.rebuild(&[chunk("a", "golden sandals")], Bm25Params::default())
			.expect("Rebuild failed.");

		let fingerprint = handle.snapshot().expect("Expected a snapshot.").fingerprint().to_string();
		let duplicate = [chunk("x", "one"), chunk("x", "two")];

		assert!(handle.rebuild(&duplicate, Bm25Params::default()).is_err());
		assert_eq!(handle.snapshot().expect("Expected a snapshot.").fingerprint(), fingerprint);
	}

	#[test]
	fn clear_unpublishes() {
		let handle = IndexHandle::with_index(
			LexicalIndex::build(&[chunk("a", "text")], Bm25Params::default()).expect("Build failed."),
		);

		assert!(handle.clear().is_some());
		assert!(handle.snapshot().is_none());
	}
}
