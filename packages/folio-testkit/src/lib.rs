mod error;

pub use error::{Error, Result};

use std::{collections::HashMap, env, thread, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, Vector,
		VectorParamsBuilder, VectorsConfigBuilder,
	},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

use folio_storage::qdrant::{CHUNK_ID_KEY, DENSE_VECTOR_NAME, DOCUMENT_ID_KEY, point_id_for};

/// A point to seed into a test collection.
pub struct SeedPoint<'a> {
	pub chunk_id: &'a str,
	pub document_id: &'a str,
	pub vector: Vec<f32>,
}

/// A uniquely named Qdrant collection that is deleted on cleanup or drop.
pub struct TestCollection {
	url: String,
	client: Qdrant,
	name: String,
	vector_dim: u32,
	cleaned: bool,
}
impl TestCollection {
	pub async fn new(url: &str, vector_dim: u32) -> Result<Self> {
		let client = build_client(url)?;
		let name = format!("folio_test_{}", Uuid::new_v4().simple());
		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(vector_dim.into(), Distance::Cosine),
		);

		time::timeout(
			Duration::from_secs(10),
			client.create_collection(
				CreateCollectionBuilder::new(name.clone()).vectors_config(vectors_config),
			),
		)
		.await
		.map_err(|_| Error::Message("Qdrant create_collection timed out.".to_string()))??;

		Ok(Self { url: url.to_string(), client, name, vector_dim, cleaned: false })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn qdrant_config(&self) -> folio_config::Qdrant {
		folio_config::Qdrant {
			url: self.url.clone(),
			collection: self.name.clone(),
			vector_dim: self.vector_dim,
		}
	}

	/// Upserts points with the payload layout the storage layer reads back.
	pub async fn seed(&self, points: Vec<SeedPoint<'_>>) -> Result<()> {
		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			if point.vector.len() != self.vector_dim as usize {
				return Err(Error::Message(format!(
					"Seed vector for {} has {} dimensions; expected {}.",
					point.chunk_id,
					point.vector.len(),
					self.vector_dim
				)));
			}

			let mut payload = Payload::new();
			let mut vectors = HashMap::new();

			payload.insert(CHUNK_ID_KEY, point.chunk_id.to_string());
			payload.insert(DOCUMENT_ID_KEY, point.document_id.to_string());
			vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(point.vector));

			structs.push(PointStruct::new(
				point_id_for(point.chunk_id).to_string(),
				vectors,
				payload,
			));
		}

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.name.clone(), structs).wait(true))
			.await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner().await
	}

	async fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		delete_collection(&self.client, &self.name).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let name = self.name.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};
			let result = runtime.block_on(async {
				let client = build_client(&url)?;

				delete_collection(&client, &name).await
			});

			if let Err(err) = result {
				eprintln!("Test collection cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("FOLIO_QDRANT_URL").ok()
}

fn build_client(url: &str) -> Result<Qdrant> {
	Qdrant::from_url(url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))
}

async fn delete_collection(client: &Qdrant, name: &str) -> Result<()> {
	let max_attempts = 4;
	let mut backoff = Duration::from_millis(100);

	for attempt in 1..=max_attempts {
		let result =
			time::timeout(Duration::from_secs(10), client.delete_collection(name.to_string())).await;

		match result {
			Ok(Ok(_)) => return Ok(()),
			Ok(Err(err)) =>
				if attempt == max_attempts {
					return Err(Error::Message(format!(
						"Failed to delete Qdrant collection {name:?} after {attempt} attempts: {err}."
					)));
				},
			Err(_) =>
				if attempt == max_attempts {
					return Err(Error::Message(format!(
						"Timed out deleting Qdrant collection {name:?} after {attempt} attempts."
					)));
				},
		}

		time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
	}

	Ok(())
}
