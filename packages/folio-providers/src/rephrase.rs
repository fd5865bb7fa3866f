use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a search query optimizer for a passage retrieval system. \
Rephrase the user's query to improve search results. Use simpler terms, synonyms or related \
terms, remove stop words, and focus on key concepts. Return ONLY the rephrased query, no \
explanation.";

pub async fn rephrase(
	cfg: &folio_config::LlmProviderConfig,
	query: &str,
	reason: &str,
) -> Result<Option<String>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": build_rephrase_messages(query, reason),
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rephrase_response(json)
}

pub fn build_rephrase_messages(query: &str, reason: &str) -> Vec<Value> {
	let user_prompt = format!(
		"The following search query returned weak results ({reason}):\n\"{query}\"\nRephrase this search query."
	);

	vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

fn parse_rephrase_response(json: Value) -> Result<Option<String>> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rephrase response is missing message content.".to_string(),
		})?;
	let cleaned = content.trim().trim_matches(|ch| ch == '"' || ch == '\'').trim();

	if cleaned.is_empty() {
		return Ok(None);
	}

	Ok(Some(cleaned.to_string()))
}
