use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::EnvFilter;

use folio_config::Config;
use folio_domain::Chunk;
use folio_service::{AdaptiveRetriever, Bm25Params, IndexHandle, RetrieveRequest};

const CUTOFFS: [usize; 2] = [5, 7];

#[derive(Debug, Parser)]
#[command(
	version = folio_cli::VERSION,
	rename_all = "kebab",
	styles = folio_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSON array of chunks to index lexically.
	#[arg(long, value_name = "FILE")]
	pub corpus: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Retrieval depth; never lower than the largest reported cutoff.
	#[arg(long, value_name = "N")]
	pub top_k: Option<usize>,
	#[arg(long, value_name = "FLOAT")]
	pub alpha: Option<f64>,
	#[arg(long)]
	pub no_retry: bool,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	gold_id: String,
	document_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	generated_at: String,
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: Option<String>,
	query_count: usize,
	chunk_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	corpus_path: String,
	top_k: usize,
	alpha: Option<f64>,
	retry_enabled: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct CutoffMetrics {
	k: usize,
	hit_rate: f64,
	mrr: f64,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	metrics: Vec<CutoffMetrics>,
	retried: usize,
	degraded: usize,
	failed: usize,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	gold_id: String,
	retrieved_ids: Vec<String>,
	/// 1-based position of the gold chunk, when retrieved.
	gold_rank: Option<usize>,
	confidence: f64,
	retried: bool,
	degraded: bool,
	rephrased_query: Option<String>,
	latency_ms: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = folio_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let corpus = load_corpus(&args.corpus)?;
	let dataset = load_dataset(&args.dataset)?;
	let output = eval(&config, &corpus, dataset, &args).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_corpus(path: &Path) -> color_eyre::Result<Vec<Chunk>> {
	let raw = fs::read_to_string(path)?;
	let corpus: Vec<Chunk> = serde_json::from_str(&raw)?;

	if corpus.is_empty() {
		return Err(eyre::eyre!("Corpus must include at least one chunk."));
	}

	Ok(corpus)
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn eval(
	config: &Config,
	corpus: &[Chunk],
	dataset: EvalDataset,
	args: &Args,
) -> color_eyre::Result<EvalOutput> {
	let index = Arc::new(IndexHandle::new());

	index.rebuild(corpus, Bm25Params::from_config(&config.search.lexical)?)?;

	let retriever = AdaptiveRetriever::from_config(config, index)?;
	let top_k = retrieval_depth(args.top_k.unwrap_or(config.search.top_k as usize));
	let retry_enabled = config.search.retry_enabled && !args.no_retry;
	let query_count = dataset.queries.len();

	let mut reports = Vec::with_capacity(query_count);
	let mut latencies_ms = Vec::with_capacity(query_count);

	for (idx, item) in dataset.queries.into_iter().enumerate() {
		let mut req = RetrieveRequest::new(item.query.clone()).k(top_k).retry_enabled(retry_enabled);

		if let Some(alpha) = args.alpha {
			req = req.alpha(alpha);
		}
		if let Some(document_id) = item.document_id.clone() {
			req = req.document_id(document_id);
		}

		let started = Instant::now();
		let result = retriever.retrieve(req).await;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let id = item.id.unwrap_or_else(|| format!("q{}", idx + 1));

		latencies_ms.push(latency_ms);

		let report = match result {
			Ok(outcome) => {
				let retrieved_ids: Vec<String> =
					outcome.results.iter().map(|r| r.chunk_id.clone()).collect();
				let gold_rank = gold_rank(&retrieved_ids, &item.gold_id);

				QueryReport {
					id,
					query: item.query,
					gold_id: item.gold_id,
					retrieved_ids,
					gold_rank,
					confidence: outcome.confidence,
					retried: outcome.retried,
					degraded: outcome.degraded,
					rephrased_query: outcome.rephrased_query,
					latency_ms,
					error: None,
				}
			},
			Err(err) => {
				tracing::warn!(error = %err, query_id = %id, "Query failed during evaluation.");

				QueryReport {
					id,
					query: item.query,
					gold_id: item.gold_id,
					retrieved_ids: Vec::new(),
					gold_rank: None,
					confidence: 0.0,
					retried: false,
					degraded: false,
					rephrased_query: None,
					latency_ms,
					error: Some(err.to_string()),
				}
			},
		};

		reports.push(report);
	}

	let summary = summarize(&reports, &latencies_ms);

	Ok(EvalOutput {
		generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
		dataset: EvalDatasetInfo { name: dataset.name, query_count, chunk_count: corpus.len() },
		settings: EvalSettings {
			config_path: args.config.display().to_string(),
			corpus_path: args.corpus.display().to_string(),
			top_k,
			alpha: args.alpha,
			retry_enabled,
		},
		summary,
		queries: reports,
	})
}

fn retrieval_depth(requested: usize) -> usize {
	requested.max(CUTOFFS.iter().copied().max().unwrap_or(1))
}

fn gold_rank(retrieved: &[String], gold_id: &str) -> Option<usize> {
	retrieved.iter().position(|id| id == gold_id).map(|idx| idx + 1)
}

fn cutoff_metrics(ranks: &[Option<usize>], k: usize) -> CutoffMetrics {
	let count = ranks.len().max(1) as f64;
	let within: Vec<usize> = ranks.iter().flatten().copied().filter(|rank| *rank <= k).collect();
	let hit_rate = within.len() as f64 / count;
	let mrr = within.iter().map(|rank| 1.0 / *rank as f64).sum::<f64>() / count;

	CutoffMetrics { k, hit_rate, mrr }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let ranks: Vec<Option<usize>> = reports.iter().map(|r| r.gold_rank).collect();
	let metrics = CUTOFFS.iter().map(|k| cutoff_metrics(&ranks, *k)).collect();

	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

	EvalSummary {
		metrics,
		retried: reports.iter().filter(|r| r.retried).count(),
		degraded: reports.iter().filter(|r| r.degraded).count(),
		failed: reports.iter().filter(|r| r.error.is_some()).count(),
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let pos = percentile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
