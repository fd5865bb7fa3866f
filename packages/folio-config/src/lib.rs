mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Providers, Qdrant, Search, SearchFusion,
	SearchFusionDynamic, SearchLexical, SearchRetry, SearchTimeouts, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	let mut keys = vec![("embedding", &cfg.providers.embedding.api_key)];

	if let Some(rephraser) = cfg.providers.rephraser.as_ref() {
		keys.push(("rephraser", &rephraser.api_key));

		if !rephraser.temperature.is_finite() || rephraser.temperature < 0.0 {
			return Err(Error::Validation {
				message: "providers.rephraser.temperature must be a finite number zero or greater."
					.to_string(),
			});
		}
		if rephraser.max_tokens == 0 {
			return Err(Error::Validation {
				message: "providers.rephraser.max_tokens must be greater than zero.".to_string(),
			});
		}
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	validate_search(&cfg.search)
}

/// Checks the `[search]` section on its own, for callers that build it without [`load`].
pub fn validate_search(search: &Search) -> Result<()> {
	if search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if search.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "search.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if !search.lexical.k1.is_finite() || search.lexical.k1 < 0.0 {
		return Err(Error::Validation {
			message: "search.lexical.k1 must be a finite number zero or greater.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&search.lexical.b) {
		return Err(Error::Validation {
			message: "search.lexical.b must be in the range 0.0-1.0.".to_string(),
		});
	}

	check_weight("search.fusion.alpha", search.fusion.alpha)?;

	if !search.fusion.rrf_k.is_finite() || search.fusion.rrf_k <= 0.0 {
		return Err(Error::Validation {
			message: "search.fusion.rrf_k must be a finite number greater than zero.".to_string(),
		});
	}

	let dynamic = &search.fusion.dynamic;

	if dynamic.enabled {
		check_weight("search.fusion.dynamic.question_alpha", dynamic.question_alpha)?;
		check_weight("search.fusion.dynamic.keyword_alpha", dynamic.keyword_alpha)?;
		check_weight("search.fusion.dynamic.descriptive_alpha", dynamic.descriptive_alpha)?;

		if dynamic.keyword_max_terms >= dynamic.descriptive_min_terms {
			return Err(Error::Validation {
				message: "search.fusion.dynamic.keyword_max_terms must be less than search.fusion.dynamic.descriptive_min_terms."
					.to_string(),
			});
		}
	}

	check_weight("search.retry.min_confidence", search.retry.min_confidence)?;

	let timeouts = &search.timeouts;

	for (label, value) in [
		("search.timeouts.lexical_ms", timeouts.lexical_ms),
		("search.timeouts.vector_ms", timeouts.vector_ms),
		("search.timeouts.rephrase_ms", timeouts.rephrase_ms),
		("search.timeouts.total_ms", timeouts.total_ms),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	let slowest = timeouts.lexical_ms.max(timeouts.vector_ms).max(timeouts.rephrase_ms);

	if timeouts.total_ms < slowest {
		return Err(Error::Validation {
			message: "search.timeouts.total_ms must not be less than any per-call timeout."
				.to_string(),
		});
	}

	Ok(())
}

fn check_weight(label: &str, value: f64) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation { message: format!("{label} must be in the range 0.0-1.0.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.providers
		.rephraser
		.as_ref()
		.map(|rephraser| rephraser.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.rephraser = None;
	}

	cfg.service.log_level = cfg.service.log_level.trim().to_string();
}
