use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::{self, Instant};

use voxa_storage::models::DocumentHit;

use crate::{
	Error, FilterCriteria, Result, RetrievalEngine,
	filter::compile_filter,
	ranking,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
	pub id: String,
	pub content: String,
	pub metadata: Map<String, Value>,
	/// `-distance` for vector search, the fused figure for hybrid search.
	pub score: Option<f64>,
	pub distance: Option<f64>,
	pub rerank_score: Option<f64>,
}
impl SearchResult {
	pub fn from_hit(hit: DocumentHit, score: Option<f64>) -> Self {
		let metadata = match hit.cmetadata {
			Value::Object(map) => map,
			_ => Map::new(),
		};

		Self {
			id: hit.id,
			content: hit.document,
			metadata,
			score,
			distance: Some(hit.distance),
			rerank_score: None,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimilarityRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default)]
	pub filter: FilterCriteria,
	pub k: Option<u32>,
	/// Overrides `search.rerank_by_default`.
	pub rerank: Option<bool>,
	pub timeout_ms: Option<u64>,
}
impl SimilarityRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HybridRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default)]
	pub filter: FilterCriteria,
	pub k: Option<u32>,
	/// Share of the vector score in the fused figure. Defaults to `search.default_weight`.
	pub weight: Option<f64>,
	#[serde(default)]
	pub use_entities: bool,
	pub rerank: Option<bool>,
	pub timeout_ms: Option<u64>,
}
impl HybridRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
	at: Instant,
	timeout_ms: u64,
}
impl Deadline {
	pub(crate) fn from_timeout(timeout_ms: Option<u64>) -> Option<Self> {
		timeout_ms.map(|timeout_ms| Self {
			at: Instant::now() + Duration::from_millis(timeout_ms),
			timeout_ms,
		})
	}
}

impl RetrievalEngine {
	/// Nearest documents to `query` among those matching the filter, closest first.
	pub async fn similarity_search(&self, req: SimilarityRequest) -> Result<Vec<SearchResult>> {
		let predicates = compile_filter(&req.filter)?;
		let k = self.resolve_k(req.k)?;

		if k == 0 {
			return Ok(Vec::new());
		}

		let deadline = Deadline::from_timeout(req.timeout_ms);
		let hits = within(deadline, async {
			let vector = self.embed_query(&req.query).await?;

			self.backend.nearest(&vector, &predicates, k).await
		})
		.await?;
		let mut results = hits
			.into_iter()
			.map(|hit| {
				let score = -hit.distance;

				SearchResult::from_hit(hit, Some(score))
			})
			.collect::<Vec<_>>();

		ranking::sort_by_distance(&mut results);

		let candidates = results.len();
		let results = self.maybe_rerank(&req.query, results, req.rerank, deadline).await;

		tracing::info!(k, filters = predicates.len(), candidates, "Similarity search completed.");

		Ok(results)
	}

	/// Documents ranked by a weighted blend of full-text and vector relevance.
	pub async fn hybrid_search(&self, req: HybridRequest) -> Result<Vec<SearchResult>> {
		let weight = req.weight.unwrap_or(self.cfg.search.default_weight);

		validate_weight(weight)?;

		let predicates = compile_filter(&req.filter)?;
		let k = self.resolve_k(req.k)?;

		if k == 0 {
			return Ok(Vec::new());
		}

		let deadline = Deadline::from_timeout(req.timeout_ms);
		let (query, hits) = within(deadline, async {
			let query = if req.use_entities {
				self.rewrite_with_entities(&req.query).await
			} else {
				req.query.clone()
			};
			let vector = self.embed_query(&query).await?;
			let hits = self.backend.hybrid(&vector, &query, &predicates, k, weight).await?;

			Ok((query, hits))
		})
		.await?;
		let results = ranking::rank_hybrid(hits, self.backend.metric(), weight);
		let candidates = results.len();
		let results = self.maybe_rerank(&query, results, req.rerank, deadline).await;

		tracing::info!(
			k,
			weight,
			use_entities = req.use_entities,
			filters = predicates.len(),
			candidates,
			"Hybrid search completed."
		);

		Ok(results)
	}

	fn resolve_k(&self, k: Option<u32>) -> Result<u32> {
		let k = k.unwrap_or(self.cfg.search.default_k);

		if k > self.cfg.search.max_k {
			return Err(Error::InvalidRequest {
				message: format!("k must be at most {}; got {k}.", self.cfg.search.max_k),
			});
		}

		Ok(k)
	}

	async fn maybe_rerank(
		&self,
		query: &str,
		results: Vec<SearchResult>,
		rerank: Option<bool>,
		deadline: Option<Deadline>,
	) -> Vec<SearchResult> {
		if !rerank.unwrap_or(self.cfg.search.rerank_by_default) {
			return results;
		}

		self.rerank_or_keep(query, results, deadline.map(|deadline| deadline.at)).await
	}
}

fn validate_weight(weight: f64) -> Result<()> {
	if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
		return Err(Error::InvalidWeight {
			message: format!("weight must be within [0, 1]; got {weight}."),
		});
	}

	Ok(())
}

/// Runs `fut` under the deadline, dropping it and reporting `DeadlineExceeded` on expiry.
pub(crate) async fn within<T, F>(deadline: Option<Deadline>, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match deadline {
		Some(Deadline { at, timeout_ms }) => time::timeout_at(at, fut)
			.await
			.map_err(|_| Error::DeadlineExceeded { timeout_ms })?,
		None => fut.await,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn weights_outside_unit_range_are_rejected() {
		for weight in [-0.1, 1.1, f64::NAN, f64::INFINITY] {
			assert!(matches!(validate_weight(weight), Err(Error::InvalidWeight { .. })), "{weight}");
		}
		for weight in [0.0, 0.5, 1.0] {
			assert!(validate_weight(weight).is_ok(), "{weight}");
		}
	}

	#[test]
	fn hit_metadata_becomes_a_map() {
		let hit = DocumentHit {
			id: "a".to_string(),
			document: "Oil change".to_string(),
			cmetadata: json!({ "type": "service" }),
			distance: 0.25,
			text_score: None,
		};
		let result = SearchResult::from_hit(hit, Some(-0.25));

		assert_eq!(result.metadata.get("type"), Some(&json!("service")));
		assert_eq!(result.distance, Some(0.25));
		assert_eq!(result.score, Some(-0.25));
	}

	#[test]
	fn requests_default_missing_fields() {
		let req: HybridRequest =
			serde_json::from_value(json!({ "query": "brake pads" })).expect("parse failed");

		assert_eq!(req.query, "brake pads");
		assert!(req.filter.is_empty());
		assert_eq!(req.k, None);
		assert_eq!(req.weight, None);
		assert!(!req.use_entities);
	}

	#[tokio::test]
	async fn expired_deadline_reports_timeout() {
		let deadline = Deadline::from_timeout(Some(5));
		let result = within(deadline, async {
			time::sleep(Duration::from_secs(5)).await;

			Ok(())
		})
		.await;

		assert!(matches!(result, Err(Error::DeadlineExceeded { timeout_ms: 5 })));
	}
}
