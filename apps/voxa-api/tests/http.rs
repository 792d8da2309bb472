use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Map, Value, json};
use tower::util::ServiceExt;
use uuid::Uuid;

use voxa_api::{routes, state::AppState};
use voxa_config::{
	Config, DistanceMetric, EmbeddingProviderConfig, Index, IndexBackend, Inventory, Postgres,
	Providers as ProviderConfigs, Search, Service, Storage,
};
use voxa_service::{
	BoxFuture, EmbeddingProvider, IdentityRerank, MemoryBackend, MemoryInventory, NoEntities,
	Providers, Result, RetrievalEngine,
};
use voxa_storage::models::InventoryRecord;

/// Maps a text onto `[brake, oil]` keyword counts.
struct KeywordEmbedding;
impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = texts
			.iter()
			.map(|text| {
				let text = text.to_lowercase();

				vec![text.matches("brake").count() as f32, text.matches("oil").count() as f32]
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage { postgres: Postgres { dsn: String::new(), pool_max_conns: 1 } },
		index: Index {
			backend: IndexBackend::Memory,
			table: "langchain_pg_embedding".to_string(),
			collection_id: Uuid::new_v4(),
			metric: DistanceMetric::Euclidean,
			text_search_config: "english".to_string(),
			vector_dim: 2,
		},
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test".to_string(),
				dimensions: 2,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: None,
			entity_extractor: None,
		},
		search: Search::default(),
		inventory: Inventory::default(),
	}
}

fn app() -> Router {
	let engine = RetrievalEngine::new(
		test_config(),
		Arc::new(MemoryBackend::new(DistanceMetric::Euclidean)),
		Arc::new(MemoryInventory::new(vec![
			InventoryRecord {
				vin: "T1".to_string(),
				make: Some("Toyota".to_string()),
				model: Some("Camry".to_string()),
				..Default::default()
			},
			InventoryRecord {
				vin: "H1".to_string(),
				make: Some("Honda".to_string()),
				model: Some("Civic".to_string()),
				..Default::default()
			},
		])),
		Providers::new(Arc::new(KeywordEmbedding), Arc::new(IdentityRerank), Arc::new(NoEntities)),
	)
	.expect("Failed to build engine.");

	routes::router(AppState::from_engine(engine))
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri(uri)
				.header("content-type", "application/json")
				.body(Body::from(payload.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call route.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = serde_json::from_slice(&body).unwrap_or(Value::Null);

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let response = app()
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."))
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn documents_then_similarity_search() {
	let app = app();
	let (status, report) = post_json(
		&app,
		"/v1/documents",
		json!({
			"documents": [
				{ "id": "brakes", "content": "Brake pads replaced.", "metadata": { "type": "service" } },
				{ "id": "oil", "content": "Synthetic oil change.", "metadata": { "type": "service" } },
				{ "id": "", "content": "No id." }
			]
		}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["results"][0]["status"], "upserted");
	assert_eq!(report["results"][2]["status"], "failed");

	let (status, body) = post_json(
		&app,
		"/v1/search/similarity",
		json!({ "query": "oil", "filter": { "type": "service" }, "k": 1 }),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["results"].as_array().map(Vec::len), Some(1));
	assert_eq!(body["results"][0]["id"], "oil");
}

#[tokio::test]
async fn caller_errors_map_to_bad_request() {
	let app = app();
	let (status, body) = post_json(
		&app,
		"/v1/search/hybrid",
		json!({ "query": "brake", "weight": 2.0 }),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_weight");

	let (status, body) = post_json(
		&app,
		"/v1/search/similarity",
		json!({ "query": "brake", "filter": { "bad key": "x" } }),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_filter");

	let (status, body) = post_json(
		&app,
		"/v1/inventory/search",
		json!({ "filters": { "min_price": 5.0, "max_price": 1.0 } }),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_filter");
}

#[tokio::test]
async fn inventory_search_filters_and_projects() {
	let (status, body) = post_json(
		&app(),
		"/v1/inventory/search",
		json!({ "filters": { "make": "toyota" }, "extra_fields": ["description"] }),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["matched"], 1);
	assert_eq!(body["vehicles"][0]["vin"], "T1");
	assert_eq!(body["vehicles"][0]["description"], Value::Null);
}

#[tokio::test]
async fn knowledge_context_falls_back_when_empty() {
	let (status, body) =
		post_json(&app(), "/v1/knowledge/context", json!({ "query": "opening hours" })).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["context"], voxa_service::EMPTY_CONTEXT);
}
