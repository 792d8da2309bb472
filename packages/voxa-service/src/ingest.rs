use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use voxa_storage::models::DocumentUpsert;

use crate::{Error, Result, RetrievalEngine};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
	pub id: String,
	pub content: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	/// Computed from `content` when absent.
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}
impl Document {
	pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
		Self { id: id.into(), content: content.into(), ..Default::default() }
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.into(), value.into());

		self
	}

	/// One document per text, keyed by position and tagged with `topic`.
	pub fn from_texts<I, S>(texts: I, topic: &str) -> Vec<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		texts
			.into_iter()
			.enumerate()
			.map(|(idx, text)| {
				let mut metadata = Map::new();

				metadata.insert("id".to_string(), Value::from(idx));
				metadata.insert("topic".to_string(), Value::from(topic));

				Self { id: idx.to_string(), content: text.into(), metadata, embedding: None }
			})
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
	Upserted,
	Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerDocumentResult {
	pub id: String,
	#[serde(flatten)]
	pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
	pub results: Vec<PerDocumentResult>,
}
impl IngestReport {
	pub fn failed(&self) -> usize {
		self.results
			.iter()
			.filter(|result| matches!(result.outcome, IngestOutcome::Failed { .. }))
			.count()
	}

	/// Fails with `PartialIngestFailure` unless every document was upserted.
	pub fn ensure_complete(self) -> Result<Self> {
		let failed = self.failed();

		if failed > 0 {
			return Err(Error::PartialIngestFailure { failed, total: self.results.len() });
		}

		Ok(self)
	}
}

impl RetrievalEngine {
	/// Upserts `docs` by id. Each document succeeds or fails on its own.
	pub async fn add_documents(&self, docs: Vec<Document>) -> IngestReport {
		let total = docs.len();
		let mut embeddings = self.embed_missing(&docs).await;
		let mut results = Vec::with_capacity(total);

		for (idx, doc) in docs.into_iter().enumerate() {
			let embedding = match doc.embedding {
				Some(embedding) => Ok(embedding),
				None => embeddings[idx].take().unwrap_or_else(|| {
					Err(Error::RetrievalUnavailable { message: "No embedding computed.".to_string() })
				}),
			};
			let outcome = match self.upsert_one(&doc.id, doc.content, doc.metadata, embedding).await {
				Ok(()) => IngestOutcome::Upserted,
				Err(err) => {
					tracing::warn!(id = %doc.id, error = %err, "Document ingestion failed.");

					IngestOutcome::Failed { message: err.to_string() }
				},
			};

			results.push(PerDocumentResult { id: doc.id, outcome });
		}

		let report = IngestReport { results };

		tracing::info!(total, failed = report.failed(), "Documents ingested.");

		report
	}

	async fn upsert_one(
		&self,
		id: &str,
		content: String,
		metadata: Map<String, Value>,
		embedding: Result<Vec<f32>>,
	) -> Result<()> {
		if id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "Document id must be non-empty.".to_string() });
		}

		let embedding = embedding?;
		let expected = self.cfg.index.vector_dim as usize;

		if embedding.len() != expected {
			return Err(Error::InvalidRequest {
				message: format!(
					"Embedding has {} dimensions; the index expects {expected}.",
					embedding.len()
				),
			});
		}

		let doc = DocumentUpsert {
			id: id.to_string(),
			document: content,
			cmetadata: Value::Object(metadata),
			embedding,
		};

		self.backend.upsert(&doc).await
	}

	/// Embeddings for documents without one, indexed like `docs`.
	///
	/// Tries one batch call first; if it fails, embeds each document on its own so one bad text only
	/// fails its own document.
	async fn embed_missing(&self, docs: &[Document]) -> Vec<Option<Result<Vec<f32>>>> {
		let mut slots = docs.iter().map(|_| None).collect::<Vec<_>>();
		let pending = docs
			.iter()
			.enumerate()
			.filter(|(_, doc)| doc.embedding.is_none() && !doc.id.trim().is_empty())
			.map(|(idx, _)| idx)
			.collect::<Vec<_>>();

		if pending.is_empty() {
			return slots;
		}

		let texts = pending.iter().map(|idx| docs[*idx].content.clone()).collect::<Vec<_>>();

		match self.embed_texts(&texts).await {
			Ok(vectors) => {
				for (idx, vector) in pending.into_iter().zip(vectors) {
					slots[idx] = Some(Ok(vector));
				}
			},
			Err(err) => {
				tracing::warn!(
					documents = pending.len(),
					error = %err,
					"Batch embedding failed; embedding documents individually."
				);

				for idx in pending {
					slots[idx] = Some(self.embed_query(&docs[idx].content).await);
				}
			},
		}

		slots
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn from_texts_keys_by_position() {
		let docs = Document::from_texts(["Oil change", "Tire rotation"], "service");

		assert_eq!(docs.len(), 2);
		assert_eq!(docs[1].id, "1");
		assert_eq!(docs[1].metadata.get("id"), Some(&Value::from(1)));
		assert_eq!(docs[1].metadata.get("topic"), Some(&Value::from("service")));
		assert_eq!(docs[1].embedding, None);
	}

	#[test]
	fn ensure_complete_counts_failures() {
		let report = IngestReport {
			results: vec![
				PerDocumentResult { id: "a".to_string(), outcome: IngestOutcome::Upserted },
				PerDocumentResult {
					id: String::new(),
					outcome: IngestOutcome::Failed { message: "blank id".to_string() },
				},
			],
		};
		let err = report.ensure_complete().expect_err("expected partial failure");

		assert!(matches!(err, Error::PartialIngestFailure { failed: 1, total: 2 }));
	}

	#[test]
	fn outcome_serializes_with_status_tag() {
		let result = PerDocumentResult {
			id: "a".to_string(),
			outcome: IngestOutcome::Failed { message: "boom".to_string() },
		};

		assert_eq!(
			serde_json::to_value(&result).expect("serialize failed"),
			serde_json::json!({ "id": "a", "status": "failed", "message": "boom" })
		);
	}
}
