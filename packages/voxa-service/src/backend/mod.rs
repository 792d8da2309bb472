//! Storage backends behind the engine.

mod memory;
mod postgres;

pub use memory::{MemoryBackend, MemoryInventory};
pub use postgres::{PgInventory, PgVectorBackend};

use voxa_config::DistanceMetric;
use voxa_storage::{
	models::{DocumentHit, DocumentUpsert, InventoryRecord},
	sql::Predicate,
};

use crate::{BoxFuture, Result};

/// Nearest-neighbour and hybrid retrieval over the document index.
pub trait VectorBackend
where
	Self: Send + Sync,
{
	/// Metric the backing index ranks by.
	fn metric(&self) -> DistanceMetric;

	fn nearest<'a>(
		&'a self,
		vector: &'a [f32],
		predicates: &'a [Predicate],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<DocumentHit>>>;

	/// Candidates carrying a `text_score` in `[0, 1]`, limited to the best `k` by fused score.
	fn hybrid<'a>(
		&'a self,
		vector: &'a [f32],
		query: &'a str,
		predicates: &'a [Predicate],
		k: u32,
		weight: f64,
	) -> BoxFuture<'a, Result<Vec<DocumentHit>>>;

	fn upsert<'a>(&'a self, doc: &'a DocumentUpsert) -> BoxFuture<'a, Result<()>>;
}

/// Read-only access to the structured vehicle inventory.
pub trait InventoryBackend
where
	Self: Send + Sync,
{
	/// Rows matching every predicate, oldest stock first.
	fn select<'a>(&'a self, predicates: &'a [Predicate]) -> BoxFuture<'a, Result<Vec<InventoryRecord>>>;
}
