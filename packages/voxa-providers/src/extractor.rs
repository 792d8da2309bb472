use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

const MAX_ATTEMPTS: usize = 3;
const SYSTEM_PROMPT: &str = "\
You extract named entities from a customer's question to a car dealership. \
Return only JSON of the form {\"entities\": [{\"label\": string, \"text\": string}]}. \
Labels are uppercase entity types such as ORG, PRODUCT, DATE, GPE, PERSON, MONEY or CARDINAL. \
Copy entity text verbatim from the question, in order of appearance. \
Return {\"entities\": []} when the question names nothing.";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entity {
	pub label: String,
	pub text: String,
}

#[derive(Debug, Deserialize)]
struct EntityPayload {
	#[serde(default)]
	entities: Vec<Entity>,
}

/// Asks a chat-completions model for the named entities in `text`.
///
/// Responses that do not parse are retried a bounded number of times before giving up.
pub async fn extract_entities(
	cfg: &voxa_config::LlmProviderConfig,
	text: &str,
) -> Result<Vec<Entity>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": text },
		],
	});

	for attempt in 1..=MAX_ATTEMPTS {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_entities(json) {
			Ok(entities) => return Ok(entities),
			Err(err) => {
				tracing::debug!(attempt, error = %err, "Entity extractor returned unusable output.");
			},
		}
	}

	Err(Error::response("Entity extractor response is not valid JSON."))
}

fn parse_entities(json: Value) -> Result<Vec<Entity>> {
	let payload = if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		serde_json::from_str::<Value>(content)?
	} else if json.get("entities").is_some() {
		json
	} else {
		return Err(Error::response("Entity extractor response is missing JSON content."));
	};
	let parsed: EntityPayload = serde_json::from_value(payload)?;

	Ok(parsed.entities)
}
