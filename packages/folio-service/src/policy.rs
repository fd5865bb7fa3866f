//! Pure retry and weighting decisions for the adaptive retriever.

use std::fmt;

use folio_domain::{
	FusedResult,
	text::{self, QueryProfile},
};

/// Why a fused result set was judged insufficient.
#[derive(Clone, Debug, PartialEq)]
pub enum LowConfidence {
	NoResults,
	TooFewResults { found: usize, required: usize },
	BelowFloor { confidence: f64, floor: f64 },
}
impl fmt::Display for LowConfidence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoResults => f.write_str("no results"),
			Self::TooFewResults { found, required } =>
				write!(f, "only {found} results, expected at least {required}"),
			Self::BelowFloor { confidence, floor } =>
				write!(f, "confidence {confidence:.2} is below {floor:.2}"),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
	pub min_results: usize,
	pub min_confidence: f64,
}
impl RetryPolicy {
	pub fn from_config(cfg: &folio_config::SearchRetry) -> Self {
		Self { min_results: cfg.min_results as usize, min_confidence: cfg.min_confidence }
	}

	/// `None` means the results are good enough to return as they are.
	pub fn assess(&self, results: &[FusedResult], confidence: f64) -> Option<LowConfidence> {
		if results.is_empty() {
			return Some(LowConfidence::NoResults);
		}
		if results.len() < self.min_results {
			return Some(LowConfidence::TooFewResults {
				found: results.len(),
				required: self.min_results,
			});
		}
		if confidence < self.min_confidence {
			return Some(LowConfidence::BelowFloor { confidence, floor: self.min_confidence });
		}

		None
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { min_results: 1, min_confidence: 0.2 }
	}
}

/// Top fused score relative to the best score any chunk can reach (rank 1 in both sources).
///
/// Lies in `[0, 1]`; an empty result set has confidence 0.
pub fn confidence(results: &[FusedResult], rrf_k: f64) -> f64 {
	let Some(top) = results.first() else {
		return 0.0;
	};

	(top.fused_score * (rrf_k + 1.0)).clamp(0.0, 1.0)
}

/// Whether the retry round's results should replace the first round's.
pub fn prefer_retry(first_confidence: f64, retry_confidence: f64) -> bool {
	retry_confidence >= first_confidence
}

/// Fusion weight for `query`. An explicit per-call weight always wins; otherwise the query
/// profile picks one when dynamic weighting is enabled.
pub fn select_alpha(query: &str, explicit: Option<f64>, cfg: &folio_config::SearchFusion) -> f64 {
	if let Some(alpha) = explicit {
		return alpha;
	}

	let dynamic = &cfg.dynamic;

	if !dynamic.enabled {
		return cfg.alpha;
	}

	match text::profile_query(query, dynamic.keyword_max_terms, dynamic.descriptive_min_terms) {
		QueryProfile::Question => dynamic.question_alpha,
		QueryProfile::Keyword => dynamic.keyword_alpha,
		QueryProfile::Descriptive => dynamic.descriptive_alpha,
		QueryProfile::Standard => cfg.alpha,
	}
}

/// Cleans a rephraser reply. Blank replies and replies equal to the original query are unusable.
pub fn accept_rephrase(original: &str, candidate: Option<String>) -> Option<String> {
	let candidate = candidate?;
	let cleaned = candidate.trim().trim_matches(|c| c == '"' || c == '\'').trim();

	if cleaned.is_empty() || text::same_query(original, cleaned) {
		return None;
	}

	Some(cleaned.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(chunk_id: &str, fused_score: f64) -> FusedResult {
		FusedResult {
			chunk_id: chunk_id.to_string(),
			fused_score,
			rank: 1,
			lexical_rank: None,
			vector_rank: Some(1),
		}
	}

	#[test]
	fn confidence_is_normalized_top_score() {
		assert_eq!(confidence(&[], 60.0), 0.0);
		assert!((confidence(&[result("a", 0.7 / 61.0)], 60.0) - 0.7).abs() < 1e-12);
		assert!((confidence(&[result("a", 1.0 / 61.0)], 60.0) - 1.0).abs() < 1e-12);
	}

	#[test]
	fn assess_flags_each_low_confidence_reason() {
		let policy = RetryPolicy { min_results: 2, min_confidence: 0.5 };

		assert_eq!(policy.assess(&[], 0.0), Some(LowConfidence::NoResults));
		assert_eq!(
			policy.assess(&[result("a", 0.01)], 0.9),
			Some(LowConfidence::TooFewResults { found: 1, required: 2 })
		);
		assert_eq!(
			policy.assess(&[result("a", 0.01), result("b", 0.01)], 0.3),
			Some(LowConfidence::BelowFloor { confidence: 0.3, floor: 0.5 })
		);
		assert_eq!(policy.assess(&[result("a", 0.01), result("b", 0.01)], 0.7), None);
	}

	#[test]
	fn low_confidence_reasons_read_as_prose() {
		assert_eq!(LowConfidence::NoResults.to_string(), "no results");
		assert_eq!(
			LowConfidence::BelowFloor { confidence: 0.1, floor: 0.2 }.to_string(),
			"confidence 0.10 is below 0.20"
		);
	}

	#[test]
	fn retry_wins_unless_strictly_worse() {
		assert!(prefer_retry(0.0, 0.0));
		assert!(prefer_retry(0.1, 0.6));
		assert!(!prefer_retry(0.6, 0.1));
	}

	#[test]
	fn explicit_alpha_overrides_dynamic_profile() {
		let mut cfg = folio_config::SearchFusion::default();

		cfg.dynamic.enabled = true;

		assert_eq!(select_alpha("Odysseus Cyclops", Some(0.9), &cfg), 0.9);
		assert_eq!(select_alpha("Odysseus Cyclops", None, &cfg), cfg.dynamic.keyword_alpha);
		assert_eq!(select_alpha("Who blinded the Cyclops?", None, &cfg), cfg.dynamic.question_alpha);
		assert_eq!(select_alpha("golden sandals of the goddess", None, &cfg), cfg.alpha);
	}

	#[test]
	fn disabled_dynamic_alpha_uses_configured_weight() {
		let cfg = folio_config::SearchFusion::default();

		assert_eq!(select_alpha("Odysseus Cyclops", None, &cfg), cfg.alpha);
	}

	#[test]
	fn rephrase_acceptance_rejects_blank_and_identical_text() {
		assert_eq!(accept_rephrase("foo", None), None);
		assert_eq!(accept_rephrase("foo", Some("  ".to_string())), None);
		assert_eq!(accept_rephrase("foo", Some("\"FOO\"".to_string())), None);
		assert_eq!(accept_rephrase("foo", Some(" \"bar\" ".to_string())), Some("bar".to_string()));
	}
}
