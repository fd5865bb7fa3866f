use std::cmp::Ordering;

use ahash::{AHashMap, AHashSet};

use crate::{Error, Result};
use folio_domain::{Chunk, ScoredCandidate, SourceKind, text};

/// Okapi BM25 saturation and length-normalization parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
}
impl Bm25Params {
	pub fn new(k1: f32, b: f32) -> Result<Self> {
		if !k1.is_finite() || k1 < 0.0 {
			return Err(Error::invalid_configuration(
				"BM25 k1 must be a finite number zero or greater.",
			));
		}
		if !(0.0..=1.0).contains(&b) {
			return Err(Error::invalid_configuration("BM25 b must be in the range 0.0-1.0."));
		}

		Ok(Self { k1, b })
	}

	pub fn from_config(cfg: &folio_config::SearchLexical) -> Result<Self> {
		Self::new(cfg.k1, cfg.b)
	}
}
impl Default for Bm25Params {
	fn default() -> Self {
		Self { k1: 1.5, b: 0.75 }
	}
}

#[derive(Debug)]
struct IndexedChunk {
	chunk_id: String,
	document_id: String,
	len: u32,
}

#[derive(Clone, Copy, Debug)]
struct Posting {
	doc: u32,
	tf: u32,
}

/// An immutable BM25 index over a fixed chunk corpus.
#[derive(Debug)]
pub struct LexicalIndex {
	params: Bm25Params,
	chunks: Vec<IndexedChunk>,
	postings: AHashMap<String, Vec<Posting>>,
	avg_len: f64,
	fingerprint: String,
}
impl LexicalIndex {
	pub fn build(corpus: &[Chunk], params: Bm25Params) -> Result<Self> {
		let mut seen = AHashSet::with_capacity(corpus.len());
		let mut chunks = Vec::with_capacity(corpus.len());
		let mut postings: AHashMap<String, Vec<Posting>> = AHashMap::new();
		let mut hasher = blake3::Hasher::new();
		let mut total_len = 0_u64;

		for (idx, chunk) in corpus.iter().enumerate() {
			if !seen.insert(chunk.chunk_id.as_str()) {
				return Err(Error::invalid_input(format!(
					"Duplicate chunk id {:?} in lexical corpus.",
					chunk.chunk_id
				)));
			}

			let tokens = text::tokenize(&chunk.text);
			let mut counts: AHashMap<String, u32> = AHashMap::new();

			for token in &tokens {
				*counts.entry(token.clone()).or_insert(0) += 1;
			}
			for (term, tf) in counts {
				postings.entry(term).or_default().push(Posting { doc: idx as u32, tf });
			}

			hasher.update(chunk.chunk_id.as_bytes());
			hasher.update(&[0]);
			hasher.update(chunk.text.as_bytes());
			hasher.update(&[0]);

			total_len += tokens.len() as u64;

			chunks.push(IndexedChunk {
				chunk_id: chunk.chunk_id.clone(),
				document_id: chunk.document_id.clone(),
				len: tokens.len() as u32,
			});
		}

		let avg_len = if chunks.is_empty() { 0.0 } else { total_len as f64 / chunks.len() as f64 };
		let fingerprint = hasher.finalize().to_hex().to_string();

		Ok(Self { params, chunks, postings, avg_len, fingerprint })
	}

	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	pub fn params(&self) -> Bm25Params {
		self.params
	}

	/// Content hash of the indexed corpus, stable across rebuilds of the same chunks.
	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}

	pub fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredCandidate>> {
		self.query_scoped(text, k, None)
	}

	/// Top `k` chunks by BM25 score, optionally restricted to one document.
	///
	/// Chunks that share no term with the query are never returned.
	pub fn query_scoped(
		&self,
		text: &str,
		k: usize,
		document_id: Option<&str>,
	) -> Result<Vec<ScoredCandidate>> {
		if k == 0 {
			return Err(Error::invalid_input("k must be greater than zero."));
		}

		let terms = text::tokenize(text);

		if terms.is_empty() || self.chunks.is_empty() {
			return Ok(Vec::new());
		}

		let mut scores: AHashMap<u32, f64> = AHashMap::new();

		for term in &terms {
			let Some(postings) = self.postings.get(term) else {
				continue;
			};
			let idf = self.idf(postings.len());

			for posting in postings {
				let chunk = &self.chunks[posting.doc as usize];

				if document_id.is_some_and(|scope| scope != chunk.document_id) {
					continue;
				}

				*scores.entry(posting.doc).or_insert(0.0) +=
					idf * self.saturate(posting.tf, chunk.len);
			}
		}

		let mut ranked: Vec<(u32, f64)> =
			scores.into_iter().filter(|(_, score)| *score > 0.0).collect();

		ranked.sort_by(|left, right| {
			right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal).then_with(|| left.0.cmp(&right.0))
		});
		ranked.truncate(k);

		Ok(ScoredCandidate::ranked(
			SourceKind::Lexical,
			ranked
				.into_iter()
				.map(|(doc, score)| (self.chunks[doc as usize].chunk_id.clone(), score as f32)),
		))
	}

	fn idf(&self, df: usize) -> f64 {
		let n = self.chunks.len() as f64;
		let df = df as f64;

		((n - df + 0.5) / (df + 0.5) + 1.0).ln()
	}

	fn saturate(&self, tf: u32, len: u32) -> f64 {
		let k1 = self.params.k1 as f64;
		let b = self.params.b as f64;
		let tf = tf as f64;
		let norm = if self.avg_len > 0.0 { len as f64 / self.avg_len } else { 0.0 };

		tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * norm))
	}
}
