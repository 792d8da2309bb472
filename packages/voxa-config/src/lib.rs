mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DistanceMetric, EmbeddingProviderConfig, Index, IndexBackend, Inventory,
	LlmProviderConfig, Postgres, ProviderConfig, Providers, Search, Service, Storage,
};

use std::{fs, path::Path};

const MAX_IDENTIFIER_BYTES: usize = 63;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.index.backend == IndexBackend::Postgres && cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty for the postgres backend.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if !is_sql_identifier(&cfg.index.table) {
		return Err(Error::Validation {
			message: "index.table must be a plain SQL identifier.".to_string(),
		});
	}
	if !is_sql_identifier(&cfg.index.text_search_config) {
		return Err(Error::Validation {
			message: "index.text_search_config must be a plain SQL identifier.".to_string(),
		});
	}
	if cfg.index.vector_dim == 0 {
		return Err(Error::Validation {
			message: "index.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.index.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match index.vector_dim.".to_string(),
		});
	}
	if cfg.search.default_k == 0 {
		return Err(Error::Validation {
			message: "search.default_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_k > cfg.search.max_k {
		return Err(Error::Validation {
			message: "search.default_k must not exceed search.max_k.".to_string(),
		});
	}
	if !cfg.search.default_weight.is_finite() {
		return Err(Error::Validation {
			message: "search.default_weight must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.search.default_weight) {
		return Err(Error::Validation {
			message: "search.default_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !is_sql_identifier(&cfg.inventory.table) {
		return Err(Error::Validation {
			message: "inventory.table must be a plain SQL identifier.".to_string(),
		});
	}
	if cfg.inventory.chars_per_token == 0 {
		return Err(Error::Validation {
			message: "inventory.chars_per_token must be greater than zero.".to_string(),
		});
	}

	let mut keys = vec![("embedding", &cfg.providers.embedding.api_key)];

	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		keys.push(("rerank", &rerank.api_key));
	}
	if let Some(extractor) = cfg.providers.entity_extractor.as_ref() {
		keys.push(("entity_extractor", &extractor.api_key));
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

/// Returns true for identifiers that are safe to splice into SQL text: ASCII letters, digits and
/// underscores, not starting with a digit.
pub fn is_sql_identifier(value: &str) -> bool {
	let mut chars = value.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	value.len() <= MAX_IDENTIFIER_BYTES
		&& (first.is_ascii_alphabetic() || first == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn normalize(cfg: &mut Config) {
	cfg.index.table = cfg.index.table.trim().to_string();
	cfg.inventory.table = cfg.inventory.table.trim().to_string();

	if cfg.providers.rerank.as_ref().map(|p| p.api_base.trim().is_empty()).unwrap_or(false) {
		cfg.providers.rerank = None;
	}
	if cfg
		.providers
		.entity_extractor
		.as_ref()
		.map(|p| p.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.entity_extractor = None;
	}
}
