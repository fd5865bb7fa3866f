use serde::{Deserialize, Serialize};

/// A retrievable unit of text. Produced by ingestion and read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
	/// Unique within the retrieval scope.
	#[serde(alias = "id")]
	pub chunk_id: String,
	pub document_id: String,
	#[serde(default)]
	pub section_id: String,
	pub text: String,
	#[serde(default)]
	pub token_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
	Lexical,
	Vector,
}
impl SourceKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lexical => "lexical",
			Self::Vector => "vector",
		}
	}
}

impl std::fmt::Display for SourceKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One entry of a single source's ranking. Ranks are 1-based and dense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
	pub chunk_id: String,
	pub rank: u32,
	pub score: f32,
	pub source: SourceKind,
}
impl ScoredCandidate {
	/// Assigns dense ranks to an already ordered `(chunk_id, score)` sequence.
	pub fn ranked<I>(source: SourceKind, ordered: I) -> Vec<Self>
	where
		I: IntoIterator<Item = (String, f32)>,
	{
		ordered
			.into_iter()
			.enumerate()
			.map(|(idx, (chunk_id, score))| Self { chunk_id, rank: idx as u32 + 1, score, source })
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
	pub chunk_id: String,
	pub fused_score: f64,
	pub rank: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lexical_rank: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub vector_rank: Option<u32>,
}
impl FusedResult {
	/// The better of the two source ranks.
	pub fn best_source_rank(&self) -> Option<u32> {
		match (self.lexical_rank, self.vector_rank) {
			(Some(lexical), Some(vector)) => Some(lexical.min(vector)),
			(lexical, vector) => lexical.or(vector),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
	pub results: Vec<FusedResult>,
	pub confidence: f64,
	pub retried: bool,
	pub degraded: bool,
	pub original_query: String,
	pub rephrased_query: Option<String>,
	pub num_results: usize,
}
impl RetrievalOutcome {
	pub fn new(
		original_query: impl Into<String>,
		results: Vec<FusedResult>,
		confidence: f64,
	) -> Self {
		let num_results = results.len();

		Self {
			results,
			confidence,
			retried: false,
			degraded: false,
			original_query: original_query.into(),
			rephrased_query: None,
			num_results,
		}
	}

	pub fn empty(original_query: impl Into<String>) -> Self {
		Self::new(original_query, Vec::new(), 0.0)
	}

	pub fn chunk_ids(&self) -> Vec<&str> {
		self.results.iter().map(|result| result.chunk_id.as_str()).collect()
	}
}
