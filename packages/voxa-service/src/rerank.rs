use tokio::time::{self, Instant};

use voxa_config::ProviderConfig;

use crate::{Error, Result, RetrievalEngine, SearchResult};

impl RetrievalEngine {
	/// Reorders `results` by reranker score. Any rerank failure leaves the input order untouched.
	pub(crate) async fn rerank_or_keep(
		&self,
		query: &str,
		results: Vec<SearchResult>,
		deadline: Option<Instant>,
	) -> Vec<SearchResult> {
		let Some(cfg) = self.cfg.providers.rerank.as_ref() else {
			return results;
		};

		if results.len() < 2 {
			return results;
		}

		match self.try_rerank(cfg, query, &results, deadline).await {
			Ok(scores) => apply_scores(results, &scores),
			Err(err) => {
				tracing::warn!(error = %err, results = results.len(), "Keeping pre-rerank order.");

				results
			},
		}
	}

	async fn try_rerank(
		&self,
		cfg: &ProviderConfig,
		query: &str,
		results: &[SearchResult],
		deadline: Option<Instant>,
	) -> Result<Vec<f32>> {
		let docs = results.iter().map(|result| result.content.clone()).collect::<Vec<_>>();
		let call = self.providers.rerank.rerank(cfg, query, &docs);
		let scores = match deadline {
			Some(deadline) => time::timeout_at(deadline, call).await.map_err(|_| {
				Error::RerankUnavailable { message: "Rerank did not finish before the deadline.".to_string() }
			})?,
			None => call.await,
		}
		.map_err(|err| Error::RerankUnavailable { message: err.to_string() })?;

		if scores.len() != results.len() {
			return Err(Error::RerankUnavailable {
				message: format!(
					"Reranker returned {} scores for {} documents.",
					scores.len(),
					results.len()
				),
			});
		}

		Ok(scores)
	}
}

/// Attaches `scores` and stably sorts by descending score, so equal scores keep their prior order.
/// Non-finite scores mark documents the reranker left out; they sort last with no score attached.
pub(crate) fn apply_scores(results: Vec<SearchResult>, scores: &[f32]) -> Vec<SearchResult> {
	let mut scored = results
		.into_iter()
		.zip(scores.iter().copied())
		.map(|(mut result, score)| {
			result.rerank_score = score.is_finite().then(|| f64::from(score));

			result
		})
		.collect::<Vec<_>>();

	scored.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));

	scored
}

fn sort_key(result: &SearchResult) -> f64 {
	match result.rerank_score {
		Some(score) if !score.is_nan() => score,
		_ => f64::NEG_INFINITY,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn result(id: &str) -> SearchResult {
		SearchResult {
			id: id.to_string(),
			content: format!("doc {id}"),
			metadata: Map::new(),
			score: None,
			distance: None,
			rerank_score: None,
		}
	}

	#[test]
	fn sorts_by_descending_score_with_stable_ties() {
		let reranked =
			apply_scores(vec![result("a"), result("b"), result("c"), result("d")], &[0.2, 0.9, 0.2, 0.5]);
		let ids = reranked.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();

		assert_eq!(ids, vec!["b", "d", "a", "c"]);
		assert_eq!(reranked[0].rerank_score, Some(f64::from(0.9_f32)));
	}

	#[test]
	fn unscored_documents_sort_after_negative_scores() {
		let reranked = apply_scores(
			vec![result("a"), result("b"), result("c")],
			&[-2.0, f32::NEG_INFINITY, -5.0],
		);
		let ids = reranked.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();

		assert_eq!(ids, vec!["a", "c", "b"]);
		assert_eq!(reranked[2].rerank_score, None);
	}
}
