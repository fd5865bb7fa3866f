use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	qdrant::{
		Condition, Filter, PointId, Query, QueryPointsBuilder, ScoredPoint, Value,
		point_id::PointIdOptions, value::Kind,
	},
};
use uuid::Uuid;

use crate::{Error, Result};

pub const DENSE_VECTOR_NAME: &str = "dense";
pub const CHUNK_ID_KEY: &str = "chunk_id";
pub const DOCUMENT_ID_KEY: &str = "document_id";

/// A nearest-neighbor hit resolved to its chunk id.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnHit {
	pub chunk_id: String,
	pub similarity: f32,
}

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &folio_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Returns up to `limit` hits ordered by descending similarity.
	///
	/// Points without a `chunk_id` payload are skipped.
	pub async fn search(
		&self,
		vector: &[f32],
		limit: usize,
		document_id: Option<&str>,
	) -> Result<Vec<AnnHit>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions; collection {} expects {}.",
				vector.len(),
				self.collection,
				self.vector_dim
			)));
		}
		if limit == 0 {
			return Ok(Vec::new());
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.limit(limit as u64)
			.with_payload(true);

		if let Some(document_id) = document_id {
			search = search
				.filter(Filter::must([Condition::matches(DOCUMENT_ID_KEY, document_id.to_string())]));
		}

		let response = self.client.query(search).await?;

		Ok(collect_hits(response.result))
	}
}

/// Stable point id for a chunk id, so re-ingesting a chunk overwrites its point.
pub fn point_id_for(chunk_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

pub fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn collect_hits(points: Vec<ScoredPoint>) -> Vec<AnnHit> {
	let mut hits = Vec::with_capacity(points.len());

	for point in points {
		let Some(chunk_id) = payload_string(&point.payload, CHUNK_ID_KEY) else {
			tracing::warn!(
				point_id = ?point.id.as_ref().and_then(point_id_to_uuid),
				"Qdrant point is missing chunk_id payload."
			);

			continue;
		};

		hits.push(AnnHit { chunk_id, similarity: point.score });
	}

	hits
}
