use voxa_config::{DistanceMetric, Index};

use crate::{
	Result,
	db::Db,
	models::{DocumentHit, DocumentUpsert},
	sql::{self, BindValue, Predicate, SqlBuilder},
};

/// pgvector distance operator for `metric`.
pub fn distance_operator(metric: DistanceMetric) -> &'static str {
	match metric {
		DistanceMetric::Euclidean => "<->",
		DistanceMetric::Cosine => "<=>",
	}
}

/// Renders a vector in pgvector's text input format.
pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// Top `k` documents of the collection by ascending distance, ties by ascending id.
pub fn build_nearest_query(
	index: &Index,
	vector: &[f32],
	predicates: &[Predicate],
	k: u32,
) -> (String, Vec<BindValue>) {
	let mut builder = SqlBuilder::new();

	builder.push(
		"\
SELECT
	id::text AS id,
	COALESCE(document, '') AS document,
	COALESCE(cmetadata, '{}'::jsonb) AS cmetadata,
	(embedding ",
	);
	builder.push(distance_operator(index.metric));
	builder.push(" ");
	builder.push_bind(BindValue::Text(vector_to_pg(vector)));
	builder.push("::text::vector)::float8 AS distance,\n\tNULL::float8 AS text_score\nFROM ");
	builder.push(&index.table);
	builder.push("\nWHERE collection_id = ");
	builder.push_bind(BindValue::Text(index.collection_id.to_string()));
	builder.push("::uuid\n\tAND embedding IS NOT NULL\n\tAND ");
	builder.push_predicates(predicates);
	builder.push("\nORDER BY distance ASC, id ASC\nLIMIT ");
	builder.push_bind(BindValue::Int(i64::from(k)));

	builder.finish()
}

/// Top `k` documents by fused full-text and vector score.
///
/// `text_score` is `ts_rank_cd` with normalization 32, i.e. `rank / (rank + 1)`. The vector score
/// is one minus the distance mapped into `[0, 1]`.
pub fn build_hybrid_query(
	index: &Index,
	vector: &[f32],
	query_text: &str,
	predicates: &[Predicate],
	k: u32,
	weight: f64,
) -> (String, Vec<BindValue>) {
	let mut builder = SqlBuilder::new();

	builder.push(
		"\
SELECT id, document, cmetadata, distance, text_score
FROM (
	SELECT
		id::text AS id,
		COALESCE(document, '') AS document,
		COALESCE(cmetadata, '{}'::jsonb) AS cmetadata,
		(embedding ",
	);
	builder.push(distance_operator(index.metric));
	builder.push(" ");
	builder.push_bind(BindValue::Text(vector_to_pg(vector)));
	builder.push("::text::vector)::float8 AS distance,\n\t\tts_rank_cd(to_tsvector(");

	let config = builder.push_bind(BindValue::Text(index.text_search_config.clone()));

	builder.push("::text::regconfig, COALESCE(document, '')), plainto_tsquery(");
	builder.push_param(config);
	builder.push("::text::regconfig, ");
	builder.push_bind(BindValue::Text(query_text.to_string()));
	builder.push("), 32)::float8 AS text_score\n\tFROM ");
	builder.push(&index.table);
	builder.push("\n\tWHERE collection_id = ");
	builder.push_bind(BindValue::Text(index.collection_id.to_string()));
	builder.push("::uuid\n\t\tAND embedding IS NOT NULL\n\t\tAND ");
	builder.push_predicates(predicates);
	builder.push("\n) candidates\nORDER BY (1 - ");

	let weight_param = builder.push_bind(BindValue::Float(weight));

	builder.push(") * text_score + ");
	builder.push_param(weight_param);
	builder.push(" * (1 - ");
	builder.push(normalized_distance_sql(index.metric));
	builder.push(") DESC, distance ASC, id ASC\nLIMIT ");
	builder.push_bind(BindValue::Int(i64::from(k)));

	builder.finish()
}

pub async fn nearest(
	db: &Db,
	index: &Index,
	vector: &[f32],
	predicates: &[Predicate],
	k: u32,
) -> Result<Vec<DocumentHit>> {
	let (text, params) = build_nearest_query(index, vector, predicates, k);
	let rows = sql::bind_query_as(sqlx::query_as::<_, DocumentHit>(&text), params)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn hybrid(
	db: &Db,
	index: &Index,
	vector: &[f32],
	query_text: &str,
	predicates: &[Predicate],
	k: u32,
	weight: f64,
) -> Result<Vec<DocumentHit>> {
	let (text, params) = build_hybrid_query(index, vector, query_text, predicates, k, weight);
	let rows = sql::bind_query_as(sqlx::query_as::<_, DocumentHit>(&text), params)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

/// Inserts the document or overwrites the row that already carries its id.
pub async fn upsert(db: &Db, index: &Index, doc: &DocumentUpsert) -> Result<()> {
	let text = format!(
		"\
INSERT INTO {} (id, collection_id, document, cmetadata, embedding)
VALUES ($1, $2::uuid, $3, $4, $5::text::vector)
ON CONFLICT (id) DO UPDATE
SET
	collection_id = EXCLUDED.collection_id,
	document = EXCLUDED.document,
	cmetadata = EXCLUDED.cmetadata,
	embedding = EXCLUDED.embedding",
		index.table
	);

	sqlx::query(&text)
		.bind(doc.id.as_str())
		.bind(index.collection_id.to_string())
		.bind(doc.document.as_str())
		.bind(&doc.cmetadata)
		.bind(vector_to_pg(&doc.embedding))
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Reports the metric of the ANN index on `table`, if one exists.
pub async fn index_metric(db: &Db, table: &str) -> Result<Option<DistanceMetric>> {
	let defs: Vec<String> = sqlx::query_scalar(
		"\
SELECT indexdef
FROM pg_indexes
WHERE tablename = $1
ORDER BY indexname",
	)
	.bind(table)
	.fetch_all(&db.pool)
	.await?;

	Ok(metric_from_index_defs(&defs))
}

pub fn metric_from_index_defs(defs: &[String]) -> Option<DistanceMetric> {
	defs.iter().find_map(|def| {
		if def.contains("vector_l2_ops") {
			Some(DistanceMetric::Euclidean)
		} else if def.contains("vector_cosine_ops") {
			Some(DistanceMetric::Cosine)
		} else {
			None
		}
	})
}

fn normalized_distance_sql(metric: DistanceMetric) -> &'static str {
	match metric {
		DistanceMetric::Euclidean => "distance / (1 + distance)",
		DistanceMetric::Cosine => "LEAST(GREATEST(distance / 2, 0), 1)",
	}
}
