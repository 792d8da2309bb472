use std::sync::Arc;

use voxa_service::RetrievalEngine;

#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<RetrievalEngine>,
}
impl AppState {
	pub async fn new(config: voxa_config::Config) -> color_eyre::Result<Self> {
		let engine = RetrievalEngine::connect(config).await?;

		Ok(Self::from_engine(engine))
	}

	/// Wraps an engine built elsewhere, e.g. over in-memory backends.
	pub fn from_engine(engine: RetrievalEngine) -> Self {
		Self { engine: Arc::new(engine) }
	}
}
