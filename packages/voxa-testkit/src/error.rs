pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("VOXA_PG_DSN is not a valid Postgres DSN: {0}")]
	InvalidDsn(String),

	#[error("No admin database accepted a connection: {0}")]
	NoAdminDatabase(String),

	#[error("Test database {database}: {source}")]
	Database { database: String, source: sqlx::Error },

	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
