use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use folio_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn table<'a>(root: &'a mut toml::Table, path: &[&str]) -> &'a mut toml::Table {
	let mut current = root;

	for key in path {
		current = current
			.get_mut(*key)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{}].", path.join(".")));
	}

	current
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("folio_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_error(payload: String) -> String {
	let path = write_temp_config(payload);
	let result = folio_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");

	err.to_string()
}

#[test]
fn sample_config_loads() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = folio_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must load.");

	assert_eq!(cfg.search.top_k, 5);
	assert_eq!(cfg.search.fusion.alpha, 0.7);
	assert_eq!(cfg.search.fusion.rrf_k, 60.0);
	assert!(cfg.providers.rephraser.is_some());
}

#[test]
fn search_sections_fall_back_to_defaults() {
	let payload = sample_toml_with(|root| {
		let search = table(root, &["search"]);

		search.remove("lexical");
		search.remove("fusion");
		search.remove("retry");
		search.remove("timeouts");
	});
	let cfg: Config = toml::from_str(&payload).expect("Failed to parse test config.");

	assert_eq!(cfg.search.lexical.k1, 1.5);
	assert_eq!(cfg.search.lexical.b, 0.75);
	assert!(cfg.search.lexical.strip_stopwords);
	assert_eq!(cfg.search.fusion.alpha, 0.7);
	assert_eq!(cfg.search.fusion.rrf_k, 60.0);
	assert!(!cfg.search.fusion.dynamic.enabled);
	assert_eq!(cfg.search.fusion.dynamic.question_alpha, 0.5);
	assert_eq!(cfg.search.fusion.dynamic.keyword_alpha, 0.2);
	assert_eq!(cfg.search.fusion.dynamic.descriptive_alpha, 0.8);
	assert_eq!(cfg.search.retry.min_results, 1);
	assert_eq!(cfg.search.timeouts.total_ms, 15_000);
	assert!(folio_config::validate(&cfg).is_ok());
}

#[test]
fn alpha_must_be_a_unit_weight() {
	let payload = sample_toml_with(|root| {
		table(root, &["search", "fusion"]).insert("alpha".to_string(), Value::Float(1.5));
	});
	let message = load_error(payload);

	assert!(
		message.contains("search.fusion.alpha must be in the range 0.0-1.0."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn rrf_k_must_be_positive() {
	let payload = sample_toml_with(|root| {
		table(root, &["search", "fusion"]).insert("rrf_k".to_string(), Value::Float(0.0));
	});
	let message = load_error(payload);

	assert!(
		message.contains("search.fusion.rrf_k must be a finite number greater than zero."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let payload = sample_toml_with(|root| {
		table(root, &["storage", "qdrant"]).insert("vector_dim".to_string(), Value::Integer(768));
	});
	let message = load_error(payload);

	assert!(
		message.contains("providers.embedding.dimensions must match storage.qdrant.vector_dim."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn total_timeout_must_cover_each_call() {
	let payload = sample_toml_with(|root| {
		table(root, &["search", "timeouts"]).insert("total_ms".to_string(), Value::Integer(1_000));
	});
	let message = load_error(payload);

	assert!(
		message.contains("search.timeouts.total_ms must not be less than any per-call timeout."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn dynamic_alpha_term_bounds_must_be_ordered() {
	let payload = sample_toml_with(|root| {
		let dynamic = table(root, &["search", "fusion", "dynamic"]);

		dynamic.insert("enabled".to_string(), Value::Boolean(true));
		dynamic.insert("keyword_max_terms".to_string(), Value::Integer(9));
	});
	let message = load_error(payload);

	assert!(
		message.contains("keyword_max_terms must be less than"),
		"Unexpected error message: {message}"
	);
}

#[test]
fn rephraser_api_key_must_be_non_empty() {
	let payload = sample_toml_with(|root| {
		table(root, &["providers", "rephraser"])
			.insert("api_key".to_string(), Value::String("  ".to_string()));
	});
	let message = load_error(payload);

	assert!(
		message.contains("Provider rephraser api_key must be non-empty."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn blank_rephraser_base_disables_rephrasing() {
	let payload = sample_toml_with(|root| {
		table(root, &["providers", "rephraser"])
			.insert("api_base".to_string(), Value::String(String::new()));
	});
	let path = write_temp_config(payload);
	let result = folio_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Config must load.");

	assert!(cfg.providers.rephraser.is_none());
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("folio_config_test_missing.toml");
	let err = folio_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}

#[test]
fn search_section_validates_without_a_full_config() {
	let mut search = folio_config::Search::default();

	assert!(folio_config::validate_search(&search).is_ok());

	search.fusion.dynamic.enabled = true;
	search.fusion.dynamic.question_alpha = -0.1;

	let err = folio_config::validate_search(&search).expect_err("Expected validation error.");

	assert!(err.to_string().contains("search.fusion.dynamic.question_alpha"));
}
