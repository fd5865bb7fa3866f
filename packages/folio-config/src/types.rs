use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Optional. Without a rephraser, low-confidence results are accepted as-is.
	pub rephraser: Option<LlmProviderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_rephrase_max_tokens")]
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Search {
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default = "default_candidate_multiplier")]
	pub candidate_multiplier: u32,
	#[serde(default = "default_true")]
	pub retry_enabled: bool,
	#[serde(default)]
	pub lexical: SearchLexical,
	#[serde(default)]
	pub fusion: SearchFusion,
	#[serde(default)]
	pub retry: SearchRetry,
	#[serde(default)]
	pub timeouts: SearchTimeouts,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchLexical {
	/// Term-frequency saturation.
	#[serde(default = "default_k1")]
	pub k1: f32,
	/// Document-length normalization, 0.0 disables it.
	#[serde(default = "default_b")]
	pub b: f32,
	/// Drop question and stop words from the lexical query before scoring.
	#[serde(default = "default_true")]
	pub strip_stopwords: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchFusion {
	/// Weight of the vector term; the lexical term gets `1 - alpha`.
	#[serde(default = "default_alpha")]
	pub alpha: f64,
	/// Reciprocal rank fusion smoothing constant.
	#[serde(default = "default_rrf_k")]
	pub rrf_k: f64,
	#[serde(default)]
	pub dynamic: SearchFusionDynamic,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchFusionDynamic {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_question_alpha")]
	pub question_alpha: f64,
	#[serde(default = "default_keyword_alpha")]
	pub keyword_alpha: f64,
	#[serde(default = "default_descriptive_alpha")]
	pub descriptive_alpha: f64,
	#[serde(default = "default_keyword_max_terms")]
	pub keyword_max_terms: u32,
	#[serde(default = "default_descriptive_min_terms")]
	pub descriptive_min_terms: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchRetry {
	#[serde(default = "default_min_results")]
	pub min_results: u32,
	/// Floor for the normalized top fused score, in the range 0.0-1.0.
	#[serde(default = "default_min_confidence")]
	pub min_confidence: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchTimeouts {
	#[serde(default = "default_lexical_ms")]
	pub lexical_ms: u64,
	#[serde(default = "default_vector_ms")]
	pub vector_ms: u64,
	#[serde(default = "default_rephrase_ms")]
	pub rephrase_ms: u64,
	#[serde(default = "default_total_ms")]
	pub total_ms: u64,
}

impl Default for Search {
	fn default() -> Self {
		Self {
			top_k: default_top_k(),
			candidate_multiplier: default_candidate_multiplier(),
			retry_enabled: true,
			lexical: SearchLexical::default(),
			fusion: SearchFusion::default(),
			retry: SearchRetry::default(),
			timeouts: SearchTimeouts::default(),
		}
	}
}

impl Default for SearchLexical {
	fn default() -> Self {
		Self { k1: default_k1(), b: default_b(), strip_stopwords: true }
	}
}

impl Default for SearchFusion {
	fn default() -> Self {
		Self {
			alpha: default_alpha(),
			rrf_k: default_rrf_k(),
			dynamic: SearchFusionDynamic::default(),
		}
	}
}

impl Default for SearchFusionDynamic {
	fn default() -> Self {
		Self {
			enabled: false,
			question_alpha: default_question_alpha(),
			keyword_alpha: default_keyword_alpha(),
			descriptive_alpha: default_descriptive_alpha(),
			keyword_max_terms: default_keyword_max_terms(),
			descriptive_min_terms: default_descriptive_min_terms(),
		}
	}
}

impl Default for SearchRetry {
	fn default() -> Self {
		Self { min_results: default_min_results(), min_confidence: default_min_confidence() }
	}
}

impl Default for SearchTimeouts {
	fn default() -> Self {
		Self {
			lexical_ms: default_lexical_ms(),
			vector_ms: default_vector_ms(),
			rephrase_ms: default_rephrase_ms(),
			total_ms: default_total_ms(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_rephrase_max_tokens() -> u32 {
	50
}

fn default_top_k() -> u32 {
	5
}

fn default_candidate_multiplier() -> u32 {
	3
}

fn default_k1() -> f32 {
	1.5
}

fn default_b() -> f32 {
	0.75
}

fn default_alpha() -> f64 {
	0.7
}

fn default_rrf_k() -> f64 {
	60.0
}

fn default_question_alpha() -> f64 {
	0.5
}

fn default_keyword_alpha() -> f64 {
	0.2
}

fn default_descriptive_alpha() -> f64 {
	0.8
}

fn default_keyword_max_terms() -> u32 {
	3
}

fn default_descriptive_min_terms() -> u32 {
	9
}

fn default_min_results() -> u32 {
	1
}

fn default_min_confidence() -> f64 {
	0.2
}

fn default_lexical_ms() -> u64 {
	2_000
}

fn default_vector_ms() -> u64 {
	5_000
}

fn default_rephrase_ms() -> u64 {
	5_000
}

fn default_total_ms() -> u64 {
	15_000
}
