//! Score fusion for hybrid retrieval.

use std::{cmp::Ordering, collections::HashSet};

use unicode_segmentation::UnicodeSegmentation;

use voxa_config::DistanceMetric;
use voxa_storage::models::DocumentHit;

use crate::SearchResult;

/// Maps a raw distance into `[0, 1]`, where 0 is identical.
pub fn normalized_distance(metric: DistanceMetric, distance: f64) -> f64 {
	if !distance.is_finite() {
		return 1.0;
	}

	let normalized = match metric {
		DistanceMetric::Euclidean => {
			let d = distance.max(0.0);

			d / (1.0 + d)
		},
		DistanceMetric::Cosine => distance / 2.0,
	};

	normalized.clamp(0.0, 1.0)
}

pub fn vector_score(metric: DistanceMetric, distance: f64) -> f64 {
	1.0 - normalized_distance(metric, distance)
}

/// Squashes an unbounded full-text rank into `[0, 1)`.
pub fn text_score_from_rank(rank: f64) -> f64 {
	if !rank.is_finite() || rank <= 0.0 {
		return 0.0;
	}

	rank / (rank + 1.0)
}

pub fn fuse(text_score: f64, vector_score: f64, weight: f64) -> f64 {
	(1.0 - weight) * text_score + weight * vector_score
}

/// Counts occurrences of query terms in `content`, case-insensitively.
///
/// Stands in for `ts_rank_cd` where no Postgres text search is available; it neither stems nor
/// drops stop words.
pub fn term_frequency_rank(query: &str, content: &str) -> f64 {
	let terms = query.unicode_words().map(str::to_lowercase).collect::<HashSet<_>>();

	if terms.is_empty() {
		return 0.0;
	}

	content.unicode_words().filter(|word| terms.contains(&word.to_lowercase())).count() as f64
}

/// Fused score of a hybrid candidate.
pub fn hit_score(hit: &DocumentHit, metric: DistanceMetric, weight: f64) -> f64 {
	let text = hit.text_score.unwrap_or(0.0).clamp(0.0, 1.0);

	fuse(text, vector_score(metric, hit.distance), weight)
}

/// Orders hybrid candidates by descending fused score, then ascending distance, then ascending id.
pub fn sort_hits(hits: &mut [DocumentHit], metric: DistanceMetric, weight: f64) {
	hits.sort_by(|a, b| {
		cmp_f64(hit_score(b, metric, weight), hit_score(a, metric, weight))
			.then_with(|| cmp_f64(a.distance, b.distance))
			.then_with(|| a.id.cmp(&b.id))
	});
}

/// Turns hybrid candidates into results in fused order, each carrying its fused score.
pub fn rank_hybrid(
	mut hits: Vec<DocumentHit>,
	metric: DistanceMetric,
	weight: f64,
) -> Vec<SearchResult> {
	sort_hits(&mut hits, metric, weight);

	hits.into_iter()
		.map(|hit| {
			let fused = hit_score(&hit, metric, weight);

			SearchResult::from_hit(hit, Some(fused))
		})
		.collect()
}

/// Orders pure vector results by ascending distance, then ascending id.
pub fn sort_by_distance(results: &mut [SearchResult]) {
	results.sort_by(|a, b| {
		cmp_f64(a.distance.unwrap_or(f64::INFINITY), b.distance.unwrap_or(f64::INFINITY))
			.then_with(|| a.id.cmp(&b.id))
	});
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
	a.total_cmp(&b)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn hit(id: &str, distance: f64, text_score: f64) -> DocumentHit {
		DocumentHit {
			id: id.to_string(),
			document: format!("doc {id}"),
			cmetadata: json!({}),
			distance,
			text_score: Some(text_score),
		}
	}

	fn ids(results: &[SearchResult]) -> Vec<&str> {
		results.iter().map(|result| result.id.as_str()).collect()
	}

	fn candidates() -> Vec<DocumentHit> {
		vec![
			hit("a", 0.9, 0.80),
			hit("b", 0.1, 0.10),
			hit("c", 0.5, 0.50),
			hit("d", 0.3, 0.65),
			hit("e", 1.4, 0.0),
		]
	}

	#[test]
	fn normalizes_distances_into_unit_range() {
		assert_eq!(normalized_distance(DistanceMetric::Euclidean, 0.0), 0.0);
		assert_eq!(normalized_distance(DistanceMetric::Euclidean, 1.0), 0.5);
		assert_eq!(normalized_distance(DistanceMetric::Cosine, 1.0), 0.5);
		assert_eq!(normalized_distance(DistanceMetric::Cosine, 2.5), 1.0);
		assert_eq!(normalized_distance(DistanceMetric::Euclidean, f64::NAN), 1.0);
	}

	#[test]
	fn rank_squashing_matches_normalization_flag_32() {
		assert_eq!(text_score_from_rank(0.0), 0.0);
		assert_eq!(text_score_from_rank(1.0), 0.5);
		assert_eq!(text_score_from_rank(3.0), 0.75);
	}

	#[test]
	fn weight_zero_reproduces_full_text_order() {
		let ranked = rank_hybrid(candidates(), DistanceMetric::Euclidean, 0.0);

		assert_eq!(ids(&ranked), vec!["a", "d", "c", "b", "e"]);
	}

	#[test]
	fn weight_one_reproduces_vector_order() {
		let ranked = rank_hybrid(candidates(), DistanceMetric::Euclidean, 1.0);
		let mut by_distance = rank_hybrid(candidates(), DistanceMetric::Euclidean, 0.5);

		sort_by_distance(&mut by_distance);

		assert_eq!(ids(&ranked), vec!["b", "d", "c", "a", "e"]);
		assert_eq!(ids(&ranked), ids(&by_distance));
	}

	#[test]
	fn ordering_is_monotonic_in_weight() {
		let text_favoured = hit("text", 0.9, 0.8);
		let vector_favoured = hit("vector", 0.1, 0.1);
		let mut vector_ahead = false;

		for step in 0..=20 {
			let weight = f64::from(step) / 20.0;
			let ranked = rank_hybrid(
				vec![text_favoured.clone(), vector_favoured.clone()],
				DistanceMetric::Euclidean,
				weight,
			);
			let first = ranked[0].id.as_str();

			if vector_ahead {
				assert_eq!(first, "vector", "vector-favoured doc fell back at weight {weight}");
			}
			if first == "vector" {
				vector_ahead = true;
			}
		}

		assert!(vector_ahead);
	}

	#[test]
	fn ties_break_by_distance_then_id() {
		let ranked = rank_hybrid(
			vec![hit("b", 0.2, 0.5), hit("a", 0.2, 0.5), hit("c", 0.1, 0.5)],
			DistanceMetric::Euclidean,
			0.0,
		);

		assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
	}

	#[test]
	fn term_frequency_ignores_case_and_punctuation() {
		assert_eq!(term_frequency_rank("Brake pads", "brake PADS, brake fluid."), 3.0);
		assert_eq!(term_frequency_rank("", "brake pads"), 0.0);
		assert_eq!(term_frequency_rank("rotors", "brake pads"), 0.0);
	}
}
