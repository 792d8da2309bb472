use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use voxa_service::{
	Document, Error, HybridRequest, IngestReport, InventoryRequest, InventoryResponse,
	KnowledgeContextRequest, SearchResult, SimilarityRequest,
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
	pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeContextResponse {
	pub context: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let (status, code) = match &err {
			Error::InvalidFilter { .. } => (StatusCode::BAD_REQUEST, "invalid_filter"),
			Error::InvalidWeight { .. } => (StatusCode::BAD_REQUEST, "invalid_weight"),
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			Error::RetrievalUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "retrieval_unavailable"),
			Error::RerankUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "rerank_unavailable"),
			Error::PartialIngestFailure { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "partial_ingest_failure"),
			Error::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
			Error::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
		};

		if !err.is_caller_error() {
			tracing::warn!(error = %err, status = status.as_u16(), "Request failed.");
		}

		Self::new(status, code, err.to_string())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search/similarity", post(similarity_search))
		.route("/v1/search/hybrid", post(hybrid_search))
		.route("/v1/inventory/search", post(search_inventory))
		.route("/v1/documents", post(add_documents))
		.route("/v1/knowledge/context", post(knowledge_context))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn similarity_search(
	State(state): State<AppState>,
	Json(payload): Json<SimilarityRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let results = state.engine.similarity_search(payload).await?;

	Ok(Json(SearchResponse { results }))
}

async fn hybrid_search(
	State(state): State<AppState>,
	Json(payload): Json<HybridRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let results = state.engine.hybrid_search(payload).await?;

	Ok(Json(SearchResponse { results }))
}

async fn search_inventory(
	State(state): State<AppState>,
	Json(payload): Json<InventoryRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
	let response = state.engine.search_inventory(payload).await?;

	Ok(Json(response))
}

async fn add_documents(
	State(state): State<AppState>,
	Json(payload): Json<AddDocumentsRequest>,
) -> Json<IngestReport> {
	Json(state.engine.add_documents(payload.documents).await)
}

async fn knowledge_context(
	State(state): State<AppState>,
	Json(payload): Json<KnowledgeContextRequest>,
) -> Result<Json<KnowledgeContextResponse>, ApiError> {
	let context = state.engine.knowledge_context(payload).await?;

	Ok(Json(KnowledgeContextResponse { context }))
}
