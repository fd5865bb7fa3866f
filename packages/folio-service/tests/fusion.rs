use folio_domain::{ScoredCandidate, SourceKind};
use folio_service::{Error, RankFuser};

fn list(source: SourceKind, ids: &[&str]) -> Vec<ScoredCandidate> {
	ScoredCandidate::ranked(source, ids.iter().map(|id| (id.to_string(), 0.0)))
}

fn fuser() -> RankFuser {
	RankFuser::new(0.7, 60.0).expect("Default fusion parameters must be valid.")
}

#[test]
fn worked_example_orders_b_c_a() {
	let fused = fuser().fuse(
		&list(SourceKind::Lexical, &["A", "B", "C"]),
		&list(SourceKind::Vector, &["B", "C", "A"]),
		5,
	);
	let order: Vec<&str> = fused.iter().map(|r| r.chunk_id.as_str()).collect();

	assert_eq!(order, vec!["B", "C", "A"]);
	assert!((fused[0].fused_score - 0.016314).abs() < 1e-6);
	assert!((fused[1].fused_score - 0.016052).abs() < 1e-6);
	assert!((fused[2].fused_score - 0.016029).abs() < 1e-6);
	assert_eq!(fused.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
	assert_eq!(fused[0].lexical_rank, Some(2));
	assert_eq!(fused[0].vector_rank, Some(1));
}

#[test]
fn vector_only_chunks_score_alpha_over_rank() {
	let fused = fuser().fuse(&[], &list(SourceKind::Vector, &["x", "y", "z"]), 5);

	for result in &fused {
		let rank = result.vector_rank.expect("Vector rank must be recorded.");

		assert_eq!(result.fused_score, 0.7 / (60.0 + rank as f64));
		assert_eq!(result.lexical_rank, None);
	}
}

#[test]
fn two_source_chunks_sum_both_terms() {
	let fused = fuser().fuse(
		&list(SourceKind::Lexical, &["p", "q", "shared"]),
		&list(SourceKind::Vector, &["shared"]),
		5,
	);
	let shared = fused.iter().find(|r| r.chunk_id == "shared").expect("Shared chunk must fuse.");

	assert_eq!(shared.fused_score, (1.0 - 0.7) / 63.0 + 0.7 / 61.0);
}

#[test]
fn fusion_is_deterministic() {
	let lexical = list(SourceKind::Lexical, &["d", "a", "c", "f", "b"]);
	let vector = list(SourceKind::Vector, &["b", "e", "a", "g"]);
	let first = fuser().fuse(&lexical, &vector, 10);

	for _ in 0..20 {
		assert_eq!(fuser().fuse(&lexical, &vector, 10), first);
	}
}

#[test]
fn chunks_absent_from_both_lists_never_appear() {
	let fused = fuser().fuse(
		&list(SourceKind::Lexical, &["a"]),
		&list(SourceKind::Vector, &["b"]),
		10,
	);

	assert_eq!(fused.len(), 2);
}

#[test]
fn invalid_parameters_fail_at_construction() {
	let err = RankFuser::new(1.01, 60.0).expect_err("Expected invalid alpha.");

	assert!(matches!(err, Error::InvalidConfiguration { .. }));

	let err = RankFuser::new(0.7, 0.0).expect_err("Expected invalid rrf_k.");

	assert!(matches!(err, Error::InvalidConfiguration { .. }));
}
