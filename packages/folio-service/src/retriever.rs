use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
	Error, Providers, Rephraser, Result,
	fusion::RankFuser,
	policy::{self, LowConfidence, RetryPolicy},
	snapshot::IndexHandle,
	vector::VectorIndex,
};
use folio_domain::{FusedResult, RetrievalOutcome, ScoredCandidate, SourceKind, text};

/// One call to [`AdaptiveRetriever::retrieve`].
///
/// Unset fields fall back to the `[search]` configuration the retriever was built with.
#[derive(Clone, Debug, Default)]
pub struct RetrieveRequest {
	pub query: String,
	pub k: Option<usize>,
	pub alpha: Option<f64>,
	pub retry_enabled: Option<bool>,
	pub document_id: Option<String>,
	pub cancel: Option<CancellationToken>,
}
impl RetrieveRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}

	pub fn k(mut self, k: usize) -> Self {
		self.k = Some(k);

		self
	}

	pub fn alpha(mut self, alpha: f64) -> Self {
		self.alpha = Some(alpha);

		self
	}

	pub fn retry_enabled(mut self, enabled: bool) -> Self {
		self.retry_enabled = Some(enabled);

		self
	}

	pub fn document_id(mut self, document_id: impl Into<String>) -> Self {
		self.document_id = Some(document_id.into());

		self
	}

	pub fn cancel(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);

		self
	}
}

/// Fans a query out to both indexes, fuses, and retries once with a rephrased query when the
/// fused result is weak.
pub struct AdaptiveRetriever {
	search: folio_config::Search,
	fuser: RankFuser,
	policy: RetryPolicy,
	lexical: Arc<IndexHandle>,
	vector: VectorIndex,
	rephraser: Option<Arc<dyn Rephraser>>,
}
impl AdaptiveRetriever {
	pub fn new(
		search: folio_config::Search,
		lexical: Arc<IndexHandle>,
		providers: Providers,
	) -> Result<Self> {
		folio_config::validate_search(&search)
			.map_err(|err| Error::invalid_configuration(err.to_string()))?;

		let fuser = RankFuser::from_config(&search.fusion)?;
		let policy = RetryPolicy::from_config(&search.retry);
		let vector = VectorIndex::new(providers.embedder, providers.ann);

		Ok(Self { search, fuser, policy, lexical, vector, rephraser: providers.rephraser })
	}

	pub fn from_config(cfg: &folio_config::Config, lexical: Arc<IndexHandle>) -> Result<Self> {
		Self::new(cfg.search.clone(), lexical, Providers::from_config(cfg)?)
	}

	pub fn index(&self) -> &Arc<IndexHandle> {
		&self.lexical
	}

	/// Runs one retrieval attempt and at most one rephrased retry.
	///
	/// Only invalid input, an invalid per-call weight, and both backends failing in either round
	/// are errors. Everything else comes back as an outcome whose `degraded` and `retried` flags
	/// say what happened.
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrievalOutcome> {
		let started = Instant::now();
		let outcome = self.run(req).await;

		match &outcome {
			Ok(outcome) => tracing::info!(
				num_results = outcome.num_results,
				confidence = outcome.confidence,
				retried = outcome.retried,
				degraded = outcome.degraded,
				elapsed_ms = started.elapsed().as_millis() as u64,
				"Retrieval finished."
			),
			Err(err) => tracing::warn!(
				error = %err,
				elapsed_ms = started.elapsed().as_millis() as u64,
				"Retrieval failed."
			),
		}

		outcome
	}

	async fn run(&self, req: RetrieveRequest) -> Result<RetrievalOutcome> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::invalid_input("Query must be non-empty."));
		}

		let k = req.k.unwrap_or(self.search.top_k as usize);

		if k == 0 {
			return Err(Error::invalid_input("k must be greater than zero."));
		}

		let alpha = policy::select_alpha(query, req.alpha, &self.search.fusion);
		let fuser = self.fuser.with_alpha(alpha)?;
		let retry_enabled = req.retry_enabled.unwrap_or(self.search.retry_enabled);
		let cancel = req.cancel.unwrap_or_default();
		let deadline = Instant::now() + Duration::from_millis(self.search.timeouts.total_ms);
		let scope =
			Scope { k, fuser, document_id: req.document_id.as_deref(), deadline, cancel: &cancel };

		tracing::debug!(k, alpha, retry_enabled, "Starting retrieval.");

		let first = self.search_round(query, &scope).await?;
		let interrupted = first.interrupted;
		let mut outcome = first.into_outcome(query, fuser.rrf_k());

		if interrupted {
			return Ok(outcome);
		}

		let Some(low) = self.policy.assess(&outcome.results, outcome.confidence) else {
			return Ok(outcome);
		};

		if !retry_enabled {
			tracing::debug!(reason = %low, "Low confidence; retry disabled.");

			return Ok(outcome);
		}

		let Some(rephraser) = self.rephraser.as_ref() else {
			tracing::debug!(reason = %low, "Low confidence; no rephraser configured.");

			return Ok(outcome);
		};

		if cancel.is_cancelled() {
			outcome.degraded = true;

			return Ok(outcome);
		}

		let rephrased = match self.rephrase(rephraser.as_ref(), query, &low, &scope).await {
			Ok(Some(rephrased)) => rephrased,
			Ok(None) => return Ok(outcome),
			Err(interrupt) => {
				tracing::info!(reason = %interrupt, "Retrieval interrupted before retry.");

				outcome.degraded = true;

				return Ok(outcome);
			},
		};

		tracing::info!(reason = %low, rephrased = %rephrased, "Retrying with rephrased query.");

		outcome.retried = true;
		outcome.rephrased_query = Some(rephrased.clone());

		let retry = self.search_round(&rephrased, &scope).await?;

		if retry.interrupted {
			tracing::info!("Retry round interrupted; keeping first round results.");

			outcome.degraded = true;

			return Ok(outcome);
		}

		let retry_outcome = retry.into_outcome(query, fuser.rrf_k());

		if policy::prefer_retry(outcome.confidence, retry_outcome.confidence) {
			outcome.results = retry_outcome.results;
			outcome.confidence = retry_outcome.confidence;
			outcome.degraded = retry_outcome.degraded;
			outcome.num_results = retry_outcome.num_results;
		} else {
			tracing::debug!(
				first = outcome.confidence,
				retry = retry_outcome.confidence,
				"Retry was less confident; keeping first round results."
			);
		}

		Ok(outcome)
	}

	/// Queries both sources concurrently and fuses whatever came back.
	async fn search_round(&self, query: &str, scope: &Scope<'_>) -> Result<Round> {
		let pool = scope.k.saturating_mul(self.search.candidate_multiplier as usize);
		let timeouts = &self.search.timeouts;
		let lexical_query = if self.search.lexical.strip_stopwords {
			text::preprocess_query(query)
		} else {
			query.to_string()
		};
		let (lexical, vector) = tokio::join!(
			bounded(
				self.lexical_source(lexical_query, pool, scope.document_id),
				Duration::from_millis(timeouts.lexical_ms),
				scope,
			),
			bounded(
				self.vector.query_scoped(query, pool, scope.document_id),
				Duration::from_millis(timeouts.vector_ms),
				scope,
			),
		);

		match (lexical, vector) {
			(Ok(lexical), Ok(vector)) => Ok(Round {
				results: scope.fuser.fuse(&lexical, &vector, scope.k),
				degraded: false,
				interrupted: false,
			}),
			(Ok(lexical), Err(failure)) =>
				Ok(Round::degraded(scope, SourceKind::Vector, &lexical, &[], &failure)),
			(Err(failure), Ok(vector)) =>
				Ok(Round::degraded(scope, SourceKind::Lexical, &[], &vector, &failure)),
			(Err(lexical), Err(vector)) => {
				if lexical.is_interruption() || vector.is_interruption() {
					return Ok(Round { results: Vec::new(), degraded: true, interrupted: true });
				}

				Err(Error::BackendsUnavailable {
					lexical: lexical.to_string(),
					vector: vector.to_string(),
				})
			},
		}
	}

	async fn lexical_source(
		&self,
		text: String,
		pool: usize,
		document_id: Option<&str>,
	) -> Result<Vec<ScoredCandidate>> {
		let Some(index) = self.lexical.snapshot() else {
			return Err(Error::backend(
				SourceKind::Lexical,
				"No lexical index snapshot has been published.",
			));
		};
		let document_id = document_id.map(str::to_string);

		tokio::task::spawn_blocking(move || index.query_scoped(&text, pool, document_id.as_deref()))
			.await
			.map_err(|err| Error::backend(SourceKind::Lexical, err.to_string()))?
	}

	async fn rephrase(
		&self,
		rephraser: &dyn Rephraser,
		query: &str,
		low: &LowConfidence,
		scope: &Scope<'_>,
	) -> std::result::Result<Option<String>, SourceFailure> {
		let reason = low.to_string();
		let timeout = Duration::from_millis(self.search.timeouts.rephrase_ms);

		match bounded(rephraser.rephrase(query, &reason), timeout, scope).await {
			Ok(candidate) => {
				let accepted = policy::accept_rephrase(query, candidate);

				if accepted.is_none() {
					tracing::debug!("Rephraser returned nothing usable.");
				}

				Ok(accepted)
			},
			Err(failure) if failure.is_interruption() => Err(failure),
			Err(failure) => {
				tracing::warn!(error = %failure, "Rephraser unavailable; skipping retry.");

				Ok(None)
			},
		}
	}
}

struct Scope<'a> {
	k: usize,
	fuser: RankFuser,
	document_id: Option<&'a str>,
	deadline: Instant,
	cancel: &'a CancellationToken,
}

struct Round {
	results: Vec<FusedResult>,
	degraded: bool,
	interrupted: bool,
}
impl Round {
	fn degraded(
		scope: &Scope<'_>,
		failed: SourceKind,
		lexical: &[ScoredCandidate],
		vector: &[ScoredCandidate],
		failure: &SourceFailure,
	) -> Self {
		tracing::warn!(
			source = %failed,
			error = %failure,
			"Retrieval source unavailable; degrading."
		);

		Self {
			results: scope.fuser.fuse(lexical, vector, scope.k),
			degraded: true,
			interrupted: failure.is_interruption(),
		}
	}

	fn into_outcome(self, query: &str, rrf_k: f64) -> RetrievalOutcome {
		let confidence = policy::confidence(&self.results, rrf_k);
		let mut outcome = RetrievalOutcome::new(query, self.results, confidence);

		outcome.degraded = self.degraded;

		outcome
	}
}

#[derive(Debug)]
enum SourceFailure {
	Failed(Error),
	TimedOut(Duration),
	Cancelled,
	OutOfBudget,
}
impl SourceFailure {
	fn is_interruption(&self) -> bool {
		matches!(self, Self::Cancelled | Self::OutOfBudget)
	}
}

impl fmt::Display for SourceFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Failed(err) => write!(f, "{err}"),
			Self::TimedOut(timeout) => write!(f, "timed out after {} ms", timeout.as_millis()),
			Self::Cancelled => f.write_str("cancelled"),
			Self::OutOfBudget => f.write_str("overall time budget exhausted"),
		}
	}
}

/// Runs `fut` under its own timeout, the call's overall deadline, and the call's cancellation.
async fn bounded<T, F>(
	fut: F,
	timeout: Duration,
	scope: &Scope<'_>,
) -> std::result::Result<T, SourceFailure>
where
	F: Future<Output = Result<T>>,
{
	let call_deadline = (Instant::now() + timeout).min(scope.deadline);

	tokio::select! {
		biased;
		_ = scope.cancel.cancelled() => Err(SourceFailure::Cancelled),
		res = time::timeout_at(call_deadline, fut) => match res {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err)) => Err(SourceFailure::Failed(err)),
			Err(_) if call_deadline >= scope.deadline => Err(SourceFailure::OutOfBudget),
			Err(_) => Err(SourceFailure::TimedOut(timeout)),
		},
	}
}
