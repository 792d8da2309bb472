use voxa_config::{DistanceMetric, Index};
use voxa_storage::{
	db::Db,
	documents, inventory,
	models::{DocumentHit, DocumentUpsert, InventoryRecord},
	sql::Predicate,
};

use crate::{
	BoxFuture, Error, Result,
	backend::{InventoryBackend, VectorBackend},
};

/// pgvector-backed document index.
pub struct PgVectorBackend {
	db: Db,
	index: Index,
	metric: DistanceMetric,
}
impl PgVectorBackend {
	/// Reads the operator class of the embedding index so a metric mismatch surfaces at startup.
	/// Tables without an ANN index are assumed to use the configured metric.
	pub async fn connect(db: Db, index: Index) -> Result<Self> {
		let detected = documents::index_metric(&db, &index.table).await?;
		let metric = match detected {
			Some(metric) => metric,
			None => {
				tracing::warn!(
					table = %index.table,
					metric = index.metric.as_str(),
					"No vector index found; assuming the configured metric."
				);

				index.metric
			},
		};

		Ok(Self { db, index, metric })
	}
}
impl VectorBackend for PgVectorBackend {
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
			documents::nearest(&self.db, &self.index, vector, predicates, k)
				.await
				.map_err(Error::from)
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
			documents::hybrid(&self.db, &self.index, vector, query, predicates, k, weight)
				.await
				.map_err(Error::from)
		})
	}

	fn upsert<'a>(&'a self, doc: &'a DocumentUpsert) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			documents::upsert(&self.db, &self.index, doc).await.map_err(Error::from)
		})
	}
}

pub struct PgInventory {
	db: Db,
	table: String,
}
impl PgInventory {
	pub fn new(db: Db, table: impl Into<String>) -> Self {
		Self { db, table: table.into() }
	}
}
impl InventoryBackend for PgInventory {
	fn select<'a>(
		&'a self,
		predicates: &'a [Predicate],
	) -> BoxFuture<'a, Result<Vec<InventoryRecord>>> {
		Box::pin(async move {
			inventory::select(&self.db, &self.table, predicates).await.map_err(Error::from)
		})
	}
}
