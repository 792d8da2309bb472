pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid filter: {message}")]
	InvalidFilter { message: String },
	#[error("Invalid weight: {message}")]
	InvalidWeight { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Retrieval unavailable: {message}")]
	RetrievalUnavailable { message: String },
	#[error("Deadline of {timeout_ms} ms exceeded.")]
	DeadlineExceeded { timeout_ms: u64 },
	#[error("{failed} of {total} documents failed to ingest.")]
	PartialIngestFailure { failed: usize, total: usize },
	#[error("Rerank unavailable: {message}")]
	RerankUnavailable { message: String },
	#[error("Configuration error: {message}")]
	Config { message: String },
}
impl Error {
	/// True for errors caused by the request itself rather than by a dependency.
	pub fn is_caller_error(&self) -> bool {
		matches!(
			self,
			Self::InvalidFilter { .. } | Self::InvalidWeight { .. } | Self::InvalidRequest { .. }
		)
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::RetrievalUnavailable { message: err.to_string() }
	}
}
impl From<voxa_storage::Error> for Error {
	fn from(err: voxa_storage::Error) -> Self {
		match err {
			voxa_storage::Error::Sqlx(inner) => Self::RetrievalUnavailable { message: inner.to_string() },
			voxa_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
		}
	}
}
impl From<voxa_providers::Error> for Error {
	fn from(err: voxa_providers::Error) -> Self {
		Self::RetrievalUnavailable { message: err.to_string() }
	}
}
impl From<voxa_config::Error> for Error {
	fn from(err: voxa_config::Error) -> Self {
		Self::Config { message: err.to_string() }
	}
}
