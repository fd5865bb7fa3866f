use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Dropped from both indexed text and lexical queries.
pub const INDEX_STOPWORDS: [&str; 7] = ["the", "a", "an", "and", "of", "in", "to"];

/// Question and function words removed from lexical queries only.
pub const QUERY_STOPWORDS: [&str; 33] = [
	"what", "when", "where", "who", "why", "how", "does", "do", "did", "is", "are", "was", "were",
	"the", "a", "an", "about", "in", "on", "at", "to", "for", "of", "with", "by", "from", "this",
	"that", "these", "those", "and", "or", "but",
];

const MIN_QUERY_TERM_CHARS: usize = 3;

static PUNCTUATION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\w\s-]").ok());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryProfile {
	/// Ends in, or contains, a question mark.
	Question,
	/// A few bare keywords.
	Keyword,
	/// A long natural-language description.
	Descriptive,
	Standard,
}

/// Lowercased Unicode words with index stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
	let normalized: String = text.nfkc().collect::<String>().to_lowercase();

	normalized
		.unicode_words()
		.filter(|word| !INDEX_STOPWORDS.contains(word))
		.map(str::to_string)
		.collect()
}

/// Reduces a natural-language query to its content words for lexical matching.
///
/// Returns the query unchanged when every word would be removed.
pub fn preprocess_query(query: &str) -> String {
	let lowered = query.to_lowercase();
	let cleaned = match PUNCTUATION.as_ref() {
		Some(re) => re.replace_all(&lowered, " ").into_owned(),
		None => lowered,
	};
	let kept: Vec<&str> = cleaned
		.split_whitespace()
		.filter(|word| {
			!QUERY_STOPWORDS.contains(word) && word.chars().count() >= MIN_QUERY_TERM_CHARS
		})
		.collect();

	if kept.is_empty() {
		return query.to_string();
	}

	kept.join(" ")
}

pub fn profile_query(
	query: &str,
	keyword_max_terms: u32,
	descriptive_min_terms: u32,
) -> QueryProfile {
	if query.contains('?') {
		return QueryProfile::Question;
	}

	let terms = query.split_whitespace().count();

	if terms <= keyword_max_terms as usize {
		return QueryProfile::Keyword;
	}
	if terms >= descriptive_min_terms as usize {
		return QueryProfile::Descriptive;
	}

	QueryProfile::Standard
}

/// Trims and compares case-insensitively.
pub fn same_query(left: &str, right: &str) -> bool {
	left.trim().to_lowercase() == right.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tokenize_lowercases_and_drops_stopwords() {
		assert_eq!(tokenize("The Cyclops and Odysseus"), vec!["cyclops", "odysseus"]);
	}

	#[test]
	fn tokenize_folds_compatibility_forms() {
		assert_eq!(tokenize("ＡＢＣ ﬁle"), vec!["abc", "file"]);
	}

	#[test]
	fn preprocess_strips_question_words_and_punctuation() {
		assert_eq!(
			preprocess_query("What does Telemachus feel about the suitors?"),
			"telemachus feel suitors"
		);
	}

	#[test]
	fn preprocess_keeps_hyphenated_terms() {
		assert_eq!(preprocess_query("well-known golden sandals"), "well-known golden sandals");
	}

	#[test]
	fn preprocess_falls_back_to_original_when_everything_is_dropped() {
		assert_eq!(preprocess_query("Who is it?"), "Who is it?");
	}

	#[test]
	fn profile_classifies_by_shape() {
		assert_eq!(profile_query("Why did Ulysses lie?", 3, 9), QueryProfile::Question);
		assert_eq!(profile_query("Odysseus Cyclops", 3, 9), QueryProfile::Keyword);
		assert_eq!(
			profile_query("the long journey home across the wine dark sea after war", 3, 9),
			QueryProfile::Descriptive
		);
		assert_eq!(profile_query("golden sandals of the goddess", 3, 9), QueryProfile::Standard);
	}

	#[test]
	fn same_query_ignores_case_and_padding() {
		assert!(same_query(" Golden Sandals ", "golden sandals"));
		assert!(!same_query("golden sandals", "silver sandals"));
	}
}
