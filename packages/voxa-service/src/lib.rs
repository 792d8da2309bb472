pub mod backend;
pub mod filter;
pub mod ranking;
pub mod window;

mod context;
mod entities;
mod error;
mod ingest;
mod inventory;
mod rerank;
mod search;

use std::{future::Future, pin::Pin, sync::Arc};

use voxa_config::{Config, EmbeddingProviderConfig, IndexBackend, LlmProviderConfig, ProviderConfig};
use voxa_providers::{embedding, extractor, rerank as rerank_api};
use voxa_storage::db::Db;

pub use backend::{
	InventoryBackend, MemoryBackend, MemoryInventory, PgInventory, PgVectorBackend, VectorBackend,
};
pub use context::{EMPTY_CONTEXT, KnowledgeContextRequest};
pub use entities::entity_query;
pub use error::{Error, Result};
pub use filter::{FilterCriteria, compile_filter};
pub use ingest::{Document, IngestOutcome, IngestReport, PerDocumentResult};
pub use inventory::{InventoryFilters, InventoryRequest, InventoryResponse};
pub use search::{HybridRequest, SearchResult, SimilarityRequest};
pub use voxa_providers::extractor::Entity;
pub use window::{CharRatioCost, CostFn, TokenBudget};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait EntityExtractor
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<Entity>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub extractor: Arc<dyn EntityExtractor>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		extractor: Arc<dyn EntityExtractor>,
	) -> Self {
		Self { embedding, rerank, extractor }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), extractor: provider }
	}
}

/// Reranker that scores every document equally, leaving the order as it was.
pub struct IdentityRerank;
impl RerankProvider for IdentityRerank {
	fn rerank<'a>(
		&'a self,
		_: &'a ProviderConfig,
		_: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(vec![0.0; docs.len()]) })
	}
}

/// Extractor that never finds anything.
pub struct NoEntities;
impl EntityExtractor for NoEntities {
	fn extract<'a>(
		&'a self,
		_: &'a LlmProviderConfig,
		_: &'a str,
	) -> BoxFuture<'a, Result<Vec<Entity>>> {
		Box::pin(async { Ok(Vec::new()) })
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank_api::rerank(cfg, query, docs).await?) })
	}
}
impl EntityExtractor for DefaultProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<Entity>>> {
		Box::pin(async move { Ok(extractor::extract_entities(cfg, text).await?) })
	}
}

pub struct RetrievalEngine {
	pub cfg: Config,
	pub providers: Providers,
	backend: Arc<dyn VectorBackend>,
	inventory: Arc<dyn InventoryBackend>,
	cost_fn: CostFn,
}
impl RetrievalEngine {
	/// Builds an engine over explicit backends.
	///
	/// Fails when the backend ranks by a different metric than the one configured, since scores
	/// would otherwise be normalized against the wrong distance.
	pub fn new(
		cfg: Config,
		backend: Arc<dyn VectorBackend>,
		inventory: Arc<dyn InventoryBackend>,
		providers: Providers,
	) -> Result<Self> {
		voxa_config::validate(&cfg)?;

		if backend.metric() != cfg.index.metric {
			return Err(Error::Config {
				message: format!(
					"index.metric is {} but the vector index ranks by {}.",
					cfg.index.metric.as_str(),
					backend.metric().as_str()
				),
			});
		}

		let cost_fn = CharRatioCost::new(cfg.inventory.chars_per_token).into_cost_fn();

		Ok(Self { cfg, providers, backend, inventory, cost_fn })
	}

	/// Opens the configured backends with the default HTTP providers.
	pub async fn connect(cfg: Config) -> Result<Self> {
		Self::connect_with_providers(cfg, Providers::default()).await
	}

	pub async fn connect_with_providers(cfg: Config, providers: Providers) -> Result<Self> {
		let (backend, inventory): (Arc<dyn VectorBackend>, Arc<dyn InventoryBackend>) =
			match cfg.index.backend {
				IndexBackend::Postgres => {
					let db = Db::connect(&cfg.storage.postgres).await?;
					let inventory = PgInventory::new(
						Db::from_pool(db.pool.clone()),
						cfg.inventory.table.clone(),
					);
					let backend = PgVectorBackend::connect(db, cfg.index.clone()).await?;

					(Arc::new(backend), Arc::new(inventory))
				},
				IndexBackend::Memory => (
					Arc::new(MemoryBackend::new(cfg.index.metric)),
					Arc::new(MemoryInventory::new(Vec::new())),
				),
			};

		let engine = Self::new(cfg, backend, inventory, providers)?;

		tracing::info!(
			backend = engine.cfg.index.backend.as_str(),
			metric = engine.backend.metric().as_str(),
			table = %engine.cfg.index.table,
			"Retrieval engine ready."
		);

		Ok(engine)
	}

	/// Replaces the inventory token estimator.
	pub fn with_cost_fn(mut self, cost_fn: CostFn) -> Self {
		self.cost_fn = cost_fn;

		self
	}

	pub(crate) async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self.embed_texts(&texts).await?;

		vectors.into_iter().next().ok_or_else(|| Error::RetrievalUnavailable {
			message: "Embedding provider returned no vector.".to_string(),
		})
	}

	/// Embeds `texts` and checks that every vector matches the index dimension.
	pub(crate) async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, texts)
			.await
			.map_err(|err| match err {
				Error::RetrievalUnavailable { .. } => err,
				other => Error::RetrievalUnavailable { message: other.to_string() },
			})?;

		if vectors.len() != texts.len() {
			return Err(Error::RetrievalUnavailable {
				message: format!(
					"Embedding provider returned {} vectors for {} texts.",
					vectors.len(),
					texts.len()
				),
			});
		}

		let expected = self.cfg.index.vector_dim as usize;

		if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected) {
			return Err(Error::RetrievalUnavailable {
				message: format!(
					"Embedding has {} dimensions; the index expects {expected}.",
					vector.len()
				),
			});
		}

		Ok(vectors)
	}
}
