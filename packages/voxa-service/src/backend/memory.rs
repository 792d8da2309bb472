use std::{collections::BTreeMap, sync::RwLock};

use serde_json::{Map, Value};

use voxa_config::DistanceMetric;
use voxa_storage::{
	models::{DocumentHit, DocumentUpsert, InventoryRecord},
	sql::Predicate,
};

use crate::{
	BoxFuture, Error, Result,
	backend::{InventoryBackend, VectorBackend},
	ranking,
};

#[derive(Debug, Clone)]
struct StoredDocument {
	content: String,
	metadata: Map<String, Value>,
	embedding: Vec<f32>,
}

/// Exact-search document index held in process memory.
pub struct MemoryBackend {
	metric: DistanceMetric,
	docs: RwLock<BTreeMap<String, StoredDocument>>,
}
impl MemoryBackend {
	pub fn new(metric: DistanceMetric) -> Self {
		Self { metric, docs: RwLock::new(BTreeMap::new()) }
	}

	pub fn len(&self) -> usize {
		self.docs.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn scan(&self, vector: &[f32], predicates: &[Predicate]) -> Result<Vec<DocumentHit>> {
		let docs = self.docs.read().unwrap_or_else(|err| err.into_inner());
		let mut hits = Vec::new();

		for (id, doc) in docs.iter() {
			if !predicates.iter().all(|predicate| predicate.evaluate(&doc.metadata)) {
				continue;
			}

			let distance = distance(self.metric, vector, &doc.embedding).ok_or_else(|| {
				Error::RetrievalUnavailable {
					message: format!(
						"Document {id} has {} dimensions; query has {}.",
						doc.embedding.len(),
						vector.len()
					),
				}
			})?;

			hits.push(DocumentHit {
				id: id.clone(),
				document: doc.content.clone(),
				cmetadata: Value::Object(doc.metadata.clone()),
				distance,
				text_score: None,
			});
		}

		Ok(hits)
	}
}
impl VectorBackend for MemoryBackend {
	fn metric(&self) -> DistanceMetric {
		self.metric
	}

	fn nearest<'a>(
		&'a self,
		vector: &'a [f32],
		predicates: &'a [Predicate],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<DocumentHit>>> {
		Box::pin(async move {
			let mut hits = self.scan(vector, predicates)?;

			hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
			hits.truncate(k as usize);

			Ok(hits)
		})
	}

	fn hybrid<'a>(
		&'a self,
		vector: &'a [f32],
		query: &'a str,
		predicates: &'a [Predicate],
		k: u32,
		weight: f64,
	) -> BoxFuture<'a, Result<Vec<DocumentHit>>> {
		Box::pin(async move {
			let mut hits = self.scan(vector, predicates)?;

			for hit in &mut hits {
				let rank = ranking::term_frequency_rank(query, &hit.document);

				hit.text_score = Some(ranking::text_score_from_rank(rank));
			}

			ranking::sort_hits(&mut hits, self.metric, weight);
			hits.truncate(k as usize);

			Ok(hits)
		})
	}

	fn upsert<'a>(&'a self, doc: &'a DocumentUpsert) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let metadata = match &doc.cmetadata {
				Value::Object(map) => map.clone(),
				Value::Null => Map::new(),
				_ => {
					return Err(Error::InvalidRequest {
						message: format!("Metadata of document {} must be an object.", doc.id),
					});
				},
			};
			let mut docs = self.docs.write().unwrap_or_else(|err| err.into_inner());

			docs.insert(
				doc.id.clone(),
				StoredDocument {
					content: doc.document.clone(),
					metadata,
					embedding: doc.embedding.clone(),
				},
			);

			Ok(())
		})
	}
}

/// Inventory rows held in process memory, filtered with the same predicate semantics as SQL.
pub struct MemoryInventory {
	records: Vec<InventoryRecord>,
}
impl MemoryInventory {
	pub fn new(records: Vec<InventoryRecord>) -> Self {
		Self { records }
	}
}
impl InventoryBackend for MemoryInventory {
	fn select<'a>(
		&'a self,
		predicates: &'a [Predicate],
	) -> BoxFuture<'a, Result<Vec<InventoryRecord>>> {
		Box::pin(async move {
			let mut rows = Vec::new();

			for record in &self.records {
				let Value::Object(row) = serde_json::to_value(record).map_err(|err| {
					Error::RetrievalUnavailable { message: format!("Failed to encode row: {err}.") }
				})?
				else {
					continue;
				};

				if predicates.iter().all(|predicate| predicate.evaluate(&row)) {
					rows.push(record.clone());
				}
			}

			rows.sort_by(|a, b| {
				match (a.date_in_stock, b.date_in_stock) {
					(Some(a), Some(b)) => a.cmp(&b),
					(Some(_), None) => std::cmp::Ordering::Less,
					(None, Some(_)) => std::cmp::Ordering::Greater,
					(None, None) => std::cmp::Ordering::Equal,
				}
				.then_with(|| a.vin.cmp(&b.vin))
			});

			Ok(rows)
		})
	}
}

/// Distance under `metric`, or `None` when the dimensions differ.
fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> Option<f64> {
	if a.len() != b.len() {
		return None;
	}

	match metric {
		DistanceMetric::Euclidean => Some(
			a.iter()
				.zip(b)
				.map(|(x, y)| {
					let d = f64::from(*x) - f64::from(*y);

					d * d
				})
				.sum::<f64>()
				.sqrt(),
		),
		DistanceMetric::Cosine => {
			let mut dot = 0.0_f64;
			let mut norm_a = 0.0_f64;
			let mut norm_b = 0.0_f64;

			for (x, y) in a.iter().zip(b) {
				let (x, y) = (f64::from(*x), f64::from(*y));

				dot += x * y;
				norm_a += x * x;
				norm_b += y * y;
			}

			if norm_a == 0.0 || norm_b == 0.0 {
				return Some(1.0);
			}

			Some(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt()))
		},
	}
}
