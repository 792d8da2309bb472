use voxa_providers::extractor::Entity;

use crate::{Providers, RetrievalEngine};

/// Collapses entities to one text per label and joins them with spaces.
///
/// A repeated label keeps its first position and takes the last text seen for it. Returns `None`
/// when nothing usable remains.
pub fn entity_query(entities: &[Entity]) -> Option<String> {
	let mut by_label: Vec<(&str, &str)> = Vec::new();

	for entity in entities {
		let text = entity.text.trim();

		if text.is_empty() {
			continue;
		}

		match by_label.iter_mut().find(|(label, _)| *label == entity.label) {
			Some(slot) => slot.1 = text,
			None => by_label.push((entity.label.as_str(), text)),
		}
	}

	if by_label.is_empty() {
		return None;
	}

	Some(by_label.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join(" "))
}

impl RetrievalEngine {
	/// Rewrites `query` to its named entities, keeping the original text whenever extraction is
	/// unavailable, fails, or finds nothing.
	pub(crate) async fn rewrite_with_entities(&self, query: &str) -> String {
		rewrite_query(&self.cfg.providers.entity_extractor, &self.providers, query).await
	}
}

async fn rewrite_query(
	cfg: &Option<voxa_config::LlmProviderConfig>,
	providers: &Providers,
	query: &str,
) -> String {
	let Some(cfg) = cfg.as_ref() else {
		tracing::debug!("No entity extractor configured; using the original query.");

		return query.to_string();
	};

	match providers.extractor.extract(cfg, query).await {
		Ok(entities) => match entity_query(&entities) {
			Some(rewritten) => {
				tracing::debug!(entities = entities.len(), "Rewrote query from entities.");

				rewritten
			},
			None => query.to_string(),
		},
		Err(err) => {
			tracing::warn!(error = %err, "Entity extraction failed; using the original query.");

			query.to_string()
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entity(label: &str, text: &str) -> Entity {
		Entity { label: label.to_string(), text: text.to_string() }
	}

	#[test]
	fn joins_entity_texts_in_order() {
		let entities = [entity("ORG", "Toyota"), entity("PRODUCT", "Camry"), entity("DATE", "2022")];

		assert_eq!(entity_query(&entities).as_deref(), Some("Toyota Camry 2022"));
	}

	#[test]
	fn duplicate_labels_keep_first_position_and_last_text() {
		let entities = [entity("ORG", "Honda"), entity("PRODUCT", "Camry"), entity("ORG", "Toyota")];

		assert_eq!(entity_query(&entities).as_deref(), Some("Toyota Camry"));
	}

	#[test]
	fn empty_or_blank_entities_yield_nothing() {
		assert_eq!(entity_query(&[]), None);
		assert_eq!(entity_query(&[entity("ORG", "   ")]), None);
	}
}
