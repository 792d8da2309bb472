//! Throwaway Postgres databases for integration tests.
//!
//! Every [`TestDatabase`] lives under a fresh `voxa_test_*` name and is force-dropped on
//! [`TestDatabase::cleanup`], or on drop when a test panics first.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

const DSN_VAR: &str = "VOXA_PG_DSN";
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];
const DOCUMENTS_SCHEMA: &str = include_str!("../sql/documents.sql");
const INVENTORY_SCHEMA: &str = include_str!("../sql/inventory.sql");

/// The base DSN for Postgres-backed tests, or `None` when they should be skipped.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_VAR).ok().filter(|dsn| !dsn.trim().is_empty())
}

pub struct TestDatabase {
	dsn: String,
	maintenance: PgConnectOptions,
	/// Taken once the database has been dropped.
	database: Option<String>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::InvalidDsn(err.to_string()))?;
		let (maintenance, mut conn) = maintenance_connection(&base).await?;
		let database = format!("voxa_test_{}", Uuid::new_v4().simple());

		sqlx::raw_sql(&format!(r#"CREATE DATABASE "{database}""#))
			.execute(&mut conn)
			.await
			.map_err(|source| Error::Database { database: database.clone(), source })?;

		let dsn = base.database(&database).to_url_lossy().to_string();

		Ok(Self { dsn, maintenance, database: Some(database) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Creates the document and inventory tables, with an L2 HNSW index sized to `vector_dim`.
	pub async fn apply_fixture_schema(&self, vector_dim: u32) -> Result<()> {
		let mut conn = PgConnection::connect(&self.dsn).await?;
		let documents = DOCUMENTS_SCHEMA.replace("__VECTOR_DIM__", &vector_dim.to_string());

		sqlx::raw_sql(&documents).execute(&mut conn).await?;
		sqlx::raw_sql(INVENTORY_SCHEMA).execute(&mut conn).await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		match self.database.take() {
			Some(database) => drop_database(&self.maintenance, &database).await,
			None => Ok(()),
		}
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		let Some(database) = self.database.take() else {
			return;
		};
		let maintenance = &self.maintenance;

		// The caller may be inside a runtime, so the drop runs on its own thread.
		thread::scope(|scope| {
			scope.spawn(|| {
				let outcome = Builder::new_current_thread()
					.enable_all()
					.build()
					.map_err(|err| err.to_string())
					.and_then(|runtime| {
						runtime
							.block_on(drop_database(maintenance, &database))
							.map_err(|err| err.to_string())
					});

				if let Err(err) = outcome {
					eprintln!("Leaked test database {database}: {err}");
				}
			});
		});
	}
}

async fn maintenance_connection(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut failures = Vec::new();

	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => failures.push(format!("{database}: {err}")),
		}
	}

	Err(Error::NoAdminDatabase(failures.join("; ")))
}

async fn drop_database(maintenance: &PgConnectOptions, database: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	sqlx::raw_sql(&format!(r#"DROP DATABASE IF EXISTS "{database}" WITH (FORCE)"#))
		.execute(&mut conn)
		.await
		.map_err(|source| Error::Database { database: database.to_string(), source })?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixture_schema_is_sized_by_placeholder() {
		assert!(DOCUMENTS_SCHEMA.contains("__VECTOR_DIM__"));
		assert!(INVENTORY_SCHEMA.contains("CREATE TABLE"));
	}

	#[tokio::test]
	async fn malformed_dsn_is_rejected_before_connecting() {
		let err = TestDatabase::new("not a dsn").await.err().expect("Expected a DSN error.");

		assert!(matches!(err, Error::InvalidDsn(_)));
	}
}
