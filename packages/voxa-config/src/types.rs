use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub index: Index,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub inventory: Inventory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
	Postgres,
	Memory,
}
impl IndexBackend {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Postgres => "postgres",
			Self::Memory => "memory",
		}
	}
}

/// Distance metric the document index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
	Euclidean,
	Cosine,
}
impl DistanceMetric {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Euclidean => "euclidean",
			Self::Cosine => "cosine",
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Index {
	pub backend: IndexBackend,
	#[serde(default = "default_index_table")]
	pub table: String,
	pub collection_id: Uuid,
	pub metric: DistanceMetric,
	#[serde(default = "default_text_search_config")]
	pub text_search_config: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Optional. Reranking is skipped when absent.
	pub rerank: Option<ProviderConfig>,
	/// Optional. Entity rewriting falls back to the raw query when absent.
	pub entity_extractor: Option<LlmProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_k: u32,
	pub max_k: u32,
	pub default_weight: f64,
	pub rerank_by_default: bool,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_k: 10, max_k: 200, default_weight: 0.5, rerank_by_default: false }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Inventory {
	pub table: String,
	/// Characters per estimated token. The estimate is a stand-in for a real tokenizer.
	pub chars_per_token: u32,
	/// Optional. Budget applied when a request does not carry one; absent means unlimited.
	pub default_token_budget: Option<u64>,
}
impl Default for Inventory {
	fn default() -> Self {
		Self {
			table: "demo_vehicle_inventory".to_string(),
			chars_per_token: 5,
			default_token_budget: None,
		}
	}
}

fn default_index_table() -> String {
	"langchain_pg_embedding".to_string()
}

fn default_text_search_config() -> String {
	"english".to_string()
}
