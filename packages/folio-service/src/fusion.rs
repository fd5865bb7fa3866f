use std::cmp::Ordering;

use ahash::AHashMap;

use crate::{Error, Result};
use folio_domain::{FusedResult, ScoredCandidate, SourceKind};

/// Weighted reciprocal rank fusion of one lexical and one vector ranking.
///
/// A chunk at lexical rank `r1` and vector rank `r2` scores
/// `(1 - alpha) / (rrf_k + r1) + alpha / (rrf_k + r2)`, with the term for a missing source
/// omitted. Equal scores fall back to the better single-source rank, then to chunk id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankFuser {
	alpha: f64,
	rrf_k: f64,
}
impl RankFuser {
	pub fn new(alpha: f64, rrf_k: f64) -> Result<Self> {
		if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
			return Err(Error::invalid_configuration(format!(
				"Fusion alpha must be in the range 0.0-1.0; got {alpha}."
			)));
		}
		if !rrf_k.is_finite() || rrf_k <= 0.0 {
			return Err(Error::invalid_configuration(format!(
				"Fusion rrf_k must be a finite number greater than zero; got {rrf_k}."
			)));
		}

		Ok(Self { alpha, rrf_k })
	}

	pub fn from_config(cfg: &folio_config::SearchFusion) -> Result<Self> {
		Self::new(cfg.alpha, cfg.rrf_k)
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn rrf_k(&self) -> f64 {
		self.rrf_k
	}

	/// Same constant, different weight.
	pub fn with_alpha(&self, alpha: f64) -> Result<Self> {
		Self::new(alpha, self.rrf_k)
	}

	/// Fuses both lists and keeps the top `k`. Either list may be empty.
	///
	/// A chunk listed more than once by the same source keeps its best rank there.
	pub fn fuse(
		&self,
		lexical: &[ScoredCandidate],
		vector: &[ScoredCandidate],
		k: usize,
	) -> Vec<FusedResult> {
		if k == 0 {
			return Vec::new();
		}

		let mut ranks: AHashMap<&str, (Option<u32>, Option<u32>)> = AHashMap::new();

		for candidate in lexical.iter().chain(vector) {
			let entry = ranks.entry(candidate.chunk_id.as_str()).or_insert((None, None));
			let slot = match candidate.source {
				SourceKind::Lexical => &mut entry.0,
				SourceKind::Vector => &mut entry.1,
			};

			*slot = Some(slot.map_or(candidate.rank, |rank| rank.min(candidate.rank)));
		}

		let mut fused: Vec<FusedResult> = ranks
			.into_iter()
			.map(|(chunk_id, (lexical_rank, vector_rank))| FusedResult {
				chunk_id: chunk_id.to_string(),
				fused_score: self.score(lexical_rank, vector_rank),
				rank: 0,
				lexical_rank,
				vector_rank,
			})
			.collect();

		fused.sort_by(|left, right| {
			cmp_f64_desc(left.fused_score, right.fused_score)
				.then_with(|| rank_asc(left.best_source_rank(), right.best_source_rank()))
				.then_with(|| left.chunk_id.cmp(&right.chunk_id))
		});
		fused.truncate(k);

		for (idx, result) in fused.iter_mut().enumerate() {
			result.rank = idx as u32 + 1;
		}

		fused
	}

	pub fn score(&self, lexical_rank: Option<u32>, vector_rank: Option<u32>) -> f64 {
		let lexical =
			lexical_rank.map_or(0.0, |rank| (1.0 - self.alpha) / (self.rrf_k + rank as f64));
		let vector = vector_rank.map_or(0.0, |rank| self.alpha / (self.rrf_k + rank as f64));

		lexical + vector
	}
}
impl Default for RankFuser {
	fn default() -> Self {
		Self { alpha: 0.7, rrf_k: 60.0 }
	}
}

fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn rank_asc(a: Option<u32>, b: Option<u32>) -> Ordering {
	match (a, b) {
		(Some(a), Some(b)) => a.cmp(&b),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}
