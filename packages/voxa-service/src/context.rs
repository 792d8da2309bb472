use serde::Deserialize;

use crate::{FilterCriteria, Result, RetrievalEngine, SearchResult, SimilarityRequest};

pub const EMPTY_CONTEXT: &str = "No relevant information found in the knowledge base.";

const CONTEXT_HEADER: &str = "Information from knowledge base:\n";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeContextRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default)]
	pub filter: FilterCriteria,
}

impl RetrievalEngine {
	/// Prompt-ready text built from the closest documents to `query`.
	pub async fn knowledge_context(&self, req: KnowledgeContextRequest) -> Result<String> {
		let results = self
			.similarity_search(SimilarityRequest {
				query: req.query,
				filter: req.filter,
				..Default::default()
			})
			.await?;

		Ok(render_context(&results))
	}
}

fn render_context(results: &[SearchResult]) -> String {
	if results.is_empty() {
		return EMPTY_CONTEXT.to_string();
	}

	let body = results.iter().map(|result| result.content.as_str()).collect::<Vec<_>>().join("\n");

	format!("{CONTEXT_HEADER}{body}")
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn result(content: &str) -> SearchResult {
		SearchResult {
			id: content.to_string(),
			content: content.to_string(),
			metadata: Map::new(),
			score: None,
			distance: None,
			rerank_score: None,
		}
	}

	#[test]
	fn renders_contents_under_header() {
		assert_eq!(
			render_context(&[result("Open 9 to 5."), result("Closed Sundays.")]),
			"Information from knowledge base:\nOpen 9 to 5.\nClosed Sundays."
		);
	}

	#[test]
	fn empty_results_render_fallback() {
		assert_eq!(render_context(&[]), EMPTY_CONTEXT);
	}
}
