use std::sync::Arc;

use folio_domain::Chunk;
use folio_service::{
	AdaptiveRetriever, BoxFuture, Bm25Params, Embedder, IndexHandle, Providers, Result,
	RetrieveRequest,
};
use folio_storage::qdrant::QdrantStore;
use folio_testkit::{SeedPoint, TestCollection};

const VECTOR_DIM: u32 = 4;

/// Maps a handful of known phrases onto fixed axes.
struct AxisEmbedder;
impl Embedder for AxisEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		let axis = if text.contains("giant") {
			0
		} else if text.contains("sandals") {
			1
		} else {
			3
		};
		let mut vector = vec![0.0; VECTOR_DIM as usize];

		vector[axis] = 1.0;

		Box::pin(async move { Ok(vector) })
	}
}

fn chunk(id: &str, document_id: &str, text: &str) -> Chunk {
	Chunk {
		chunk_id: id.to_string(),
		document_id: document_id.to_string(),
		section_id: String::new(),
		text: text.to_string(),
		token_count: 0,
	}
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set FOLIO_QDRANT_URL to run."]
async fn qdrant_backend_feeds_hybrid_retrieval() {
	let Some(url) = folio_testkit::env_qdrant_url() else {
		eprintln!("Skipping qdrant_backend_feeds_hybrid_retrieval; set FOLIO_QDRANT_URL to run.");

		return;
	};
	let collection =
		TestCollection::new(&url, VECTOR_DIM).await.expect("Failed to create test collection.");

	collection
		.seed(vec![
			SeedPoint { chunk_id: "ody_9_1", document_id: "ody", vector: vec![1.0, 0.0, 0.0, 0.0] },
			SeedPoint { chunk_id: "ody_1_4", document_id: "ody", vector: vec![0.0, 1.0, 0.0, 0.0] },
			SeedPoint { chunk_id: "aiw_1_1", document_id: "aiw", vector: vec![0.7, 0.0, 0.7, 0.0] },
		])
		.await
		.expect("Failed to seed test collection.");

	let store = QdrantStore::new(&collection.qdrant_config()).expect("Failed to build store.");
	let index = Arc::new(IndexHandle::new());

	index
		.rebuild(
			&[
				chunk("ody_9_1", "ody", "The Cyclops Polyphemus traps Odysseus in his cave."),
				chunk("ody_1_4", "ody", "Athena binds on her golden sandals."),
				chunk("aiw_1_1", "aiw", "Alice follows the white rabbit."),
			],
			Bm25Params::default(),
		)
		.expect("Failed to build lexical index.");

	let providers = Providers::new(Arc::new(AxisEmbedder), Arc::new(store), None);
	let retriever = AdaptiveRetriever::new(folio_config::Search::default(), index, providers)
		.expect("Failed to build retriever.");
	let outcome = retriever
		.retrieve(RetrieveRequest::new("one-eyed giant Cyclops"))
		.await
		.expect("Retrieval failed.");

	assert_eq!(outcome.results[0].chunk_id, "ody_9_1");
	assert_eq!(outcome.results[0].vector_rank, Some(1));
	assert_eq!(outcome.results[0].lexical_rank, Some(1));
	assert!(!outcome.degraded);

	let scoped = retriever
		.retrieve(RetrieveRequest::new("one-eyed giant").document_id("aiw"))
		.await
		.expect("Scoped retrieval failed.");

	assert_eq!(scoped.chunk_ids(), vec!["aiw_1_1"]);

	collection.cleanup().await.expect("Failed to clean up test collection.");
}
