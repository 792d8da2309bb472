//! Bind-only SQL assembly.
//!
//! Runtime values only ever reach Postgres as bound parameters. The text produced by
//! [`SqlBuilder`] depends on the shape of the predicates (their kinds and static column names),
//! never on the values they carry.

use serde_json::{Map, Value};
use sqlx::{
	Postgres,
	postgres::PgArguments,
	query::{Query, QueryAs},
};

/// JSON metadata column of the document table.
pub const METADATA_COLUMN: &str = "cmetadata";

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
	Text(String),
	TextList(Vec<String>),
	Int(i64),
	Float(f64),
	Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
	/// A key inside the JSON metadata column. The key itself is bound.
	Metadata(String),
	/// A statically known column identifier, rendered quoted.
	Named(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	Eq { column: Column, value: BindValue },
	In { column: Column, values: Vec<String> },
	Range { column: Column, lo: Option<f64>, hi: Option<f64> },
	Substring { column: Column, needle: String },
}
impl Predicate {
	/// Evaluates the predicate against a JSON record with the same semantics the rendered SQL has.
	///
	/// For [`Column::Metadata`] the record is the metadata object; for [`Column::Named`] it is the
	/// row serialized as an object.
	pub fn evaluate(&self, record: &Map<String, Value>) -> bool {
		match self {
			Self::Eq { column, value } => {
				let Some(field) = lookup(column, record) else {
					return false;
				};

				match value {
					BindValue::Text(expected) =>
						text_form(field).is_some_and(|actual| actual == *expected),
					BindValue::Int(expected) => field.as_i64() == Some(*expected),
					BindValue::Float(expected) => field.as_f64() == Some(*expected),
					BindValue::Bool(expected) => field.as_bool() == Some(*expected),
					BindValue::TextList(_) => false,
				}
			},
			Self::In { column, values } => lookup(column, record)
				.and_then(text_form)
				.is_some_and(|actual| values.iter().any(|value| *value == actual)),
			Self::Range { column, lo, hi } => {
				if lo.is_none() && hi.is_none() {
					return true;
				}

				let Some(number) = lookup(column, record).and_then(numeric_form) else {
					return false;
				};

				lo.is_none_or(|lo| number >= lo) && hi.is_none_or(|hi| number <= hi)
			},
			Self::Substring { column, needle } => lookup(column, record)
				.and_then(text_form)
				.is_some_and(|actual| actual.to_lowercase().contains(&needle.to_lowercase())),
		}
	}
}

#[derive(Debug, Default)]
pub struct SqlBuilder {
	sql: String,
	params: Vec<BindValue>,
}
impl SqlBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, fragment: &str) -> &mut Self {
		self.sql.push_str(fragment);

		self
	}

	/// Appends a `$n` placeholder for `value` and returns `n`.
	pub fn push_bind(&mut self, value: BindValue) -> usize {
		self.params.push(value);

		let index = self.params.len();

		self.sql.push('$');
		self.sql.push_str(&index.to_string());

		index
	}

	/// Appends a reference to a parameter bound earlier.
	pub fn push_param(&mut self, index: usize) -> &mut Self {
		self.sql.push('$');
		self.sql.push_str(&index.to_string());

		self
	}

	/// Appends the conjunction of `predicates`, or `TRUE` when there are none.
	pub fn push_predicates(&mut self, predicates: &[Predicate]) -> &mut Self {
		if predicates.is_empty() {
			return self.push("TRUE");
		}

		for (idx, predicate) in predicates.iter().enumerate() {
			if idx > 0 {
				self.push(" AND ");
			}

			self.push_predicate(predicate);
		}

		self
	}

	pub fn sql(&self) -> &str {
		&self.sql
	}

	pub fn params(&self) -> &[BindValue] {
		&self.params
	}

	pub fn finish(self) -> (String, Vec<BindValue>) {
		(self.sql, self.params)
	}

	fn push_predicate(&mut self, predicate: &Predicate) {
		match predicate {
			Predicate::Eq { column, value } => {
				self.push("(");
				self.push_column(column, ColumnCast::None);
				self.push(" = ");
				self.push_bind(value.clone());
				self.push(")");
			},
			Predicate::In { column, values } => {
				self.push("(");
				self.push_column(column, ColumnCast::Text);
				self.push(" = ANY(");
				self.push_bind(BindValue::TextList(values.clone()));
				self.push("))");
			},
			Predicate::Range { column, lo, hi } => {
				if lo.is_none() && hi.is_none() {
					self.push("TRUE");

					return;
				}

				self.push("(");

				if let Some(lo) = lo {
					self.push_column(column, ColumnCast::Float);
					self.push(" >= ");
					self.push_bind(BindValue::Float(*lo));
				}
				if let Some(hi) = hi {
					if lo.is_some() {
						self.push(" AND ");
					}

					self.push_column(column, ColumnCast::Float);
					self.push(" <= ");
					self.push_bind(BindValue::Float(*hi));
				}

				self.push(")");
			},
			Predicate::Substring { column, needle } => {
				self.push("(");
				self.push_column(column, ColumnCast::Text);
				self.push(" ILIKE ");
				self.push_bind(BindValue::Text(format!("%{}%", escape_like(needle))));
				self.push(" ESCAPE '\\')");
			},
		}
	}

	fn push_column(&mut self, column: &Column, cast: ColumnCast) {
		match column {
			Column::Metadata(key) => {
				self.push("(");
				self.push(METADATA_COLUMN);
				self.push(" ->> ");
				self.push_bind(BindValue::Text(key.clone()));
				self.push(")");

				if matches!(cast, ColumnCast::Float) {
					self.push("::float8");
				}
			},
			Column::Named(name) => {
				self.push("\"");
				self.push(name);
				self.push("\"");

				match cast {
					ColumnCast::None => {},
					ColumnCast::Text => {
						self.push("::text");
					},
					ColumnCast::Float => {
						self.push("::float8");
					},
				}
			},
		}
	}
}

#[derive(Clone, Copy)]
enum ColumnCast {
	None,
	Text,
	Float,
}

/// Escapes `%`, `_` and `\` so the value matches literally inside `LIKE ... ESCAPE '\'`.
pub fn escape_like(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());

	for ch in value.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			escaped.push('\\');
		}

		escaped.push(ch);
	}

	escaped
}

pub fn bind_query<'q>(
	mut query: Query<'q, Postgres, PgArguments>,
	params: Vec<BindValue>,
) -> Query<'q, Postgres, PgArguments> {
	for param in params {
		query = match param {
			BindValue::Text(value) => query.bind(value),
			BindValue::TextList(value) => query.bind(value),
			BindValue::Int(value) => query.bind(value),
			BindValue::Float(value) => query.bind(value),
			BindValue::Bool(value) => query.bind(value),
		};
	}

	query
}

pub fn bind_query_as<'q, O>(
	mut query: QueryAs<'q, Postgres, O, PgArguments>,
	params: Vec<BindValue>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
	for param in params {
		query = match param {
			BindValue::Text(value) => query.bind(value),
			BindValue::TextList(value) => query.bind(value),
			BindValue::Int(value) => query.bind(value),
			BindValue::Float(value) => query.bind(value),
			BindValue::Bool(value) => query.bind(value),
		};
	}

	query
}

/// Text rendering matching Postgres `->>`: strings unquoted, other scalars as JSON text.
pub fn text_form(value: &Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(text) => Some(text.clone()),
		Value::Bool(flag) => Some(flag.to_string()),
		Value::Number(number) => Some(number.to_string()),
		Value::Array(_) | Value::Object(_) => Some(value.to_string()),
	}
}

fn numeric_form(value: &Value) -> Option<f64> {
	match value {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

fn lookup<'a>(column: &Column, record: &'a Map<String, Value>) -> Option<&'a Value> {
	match column {
		Column::Metadata(key) => record.get(key),
		Column::Named(name) => record.get(*name),
	}
	.filter(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn metadata_eq(key: &str, value: &str) -> Predicate {
		Predicate::Eq {
			column: Column::Metadata(key.to_string()),
			value: BindValue::Text(value.to_string()),
		}
	}

	#[test]
	fn empty_predicates_render_true() {
		let mut builder = SqlBuilder::new();

		builder.push_predicates(&[]);

		let (sql, params) = builder.finish();

		assert_eq!(sql, "TRUE");
		assert!(params.is_empty());
	}

	#[test]
	fn metadata_keys_and_values_are_bound() {
		let mut builder = SqlBuilder::new();

		builder.push_predicates(&[metadata_eq("type", "appointment")]);

		let (sql, params) = builder.finish();

		assert_eq!(sql, "((cmetadata ->> $1) = $2)");
		assert_eq!(
			params,
			vec![BindValue::Text("type".to_string()), BindValue::Text("appointment".to_string())]
		);
	}

	#[test]
	fn adversarial_values_never_reach_sql_text() {
		let hostile = "'; DROP TABLE x; --";
		let mut benign = SqlBuilder::new();
		let mut adversarial = SqlBuilder::new();

		benign.push_predicates(&[
			metadata_eq("type", "vehicle"),
			Predicate::Substring { column: Column::Named("make"), needle: "Toyota".to_string() },
		]);
		adversarial.push_predicates(&[
			metadata_eq("type", hostile),
			Predicate::Substring { column: Column::Named("make"), needle: hostile.to_string() },
		]);

		assert_eq!(benign.sql(), adversarial.sql());
		assert!(!adversarial.sql().contains("DROP"));
		assert_eq!(adversarial.params()[1], BindValue::Text(hostile.to_string()));
	}

	#[test]
	fn placeholders_continue_after_earlier_binds() {
		let mut builder = SqlBuilder::new();

		builder.push("WHERE collection_id = ");
		builder.push_bind(BindValue::Text("c".to_string()));
		builder.push(" AND ");
		builder.push_predicates(&[Predicate::In {
			column: Column::Metadata("topic".to_string()),
			values: vec!["a".to_string(), "b".to_string()],
		}]);

		assert_eq!(builder.sql(), "WHERE collection_id = $1 AND ((cmetadata ->> $2) = ANY($3))");
	}

	#[test]
	fn ranges_render_only_present_bounds() {
		let mut builder = SqlBuilder::new();

		builder.push_predicates(&[Predicate::Range {
			column: Column::Named("selling_price"),
			lo: None,
			hi: Some(30_000.0),
		}]);

		assert_eq!(builder.sql(), "(\"selling_price\"::float8 <= $1)");
	}

	#[test]
	fn like_wildcards_are_escaped() {
		assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");

		let mut builder = SqlBuilder::new();

		builder.push_predicates(&[Predicate::Substring {
			column: Column::Named("trim"),
			needle: "S_E".to_string(),
		}]);

		assert_eq!(builder.sql(), "(\"trim\"::text ILIKE $1 ESCAPE '\\')");
		assert_eq!(builder.params(), [BindValue::Text("%S\\_E%".to_string())]);
	}

	#[test]
	fn evaluate_mirrors_text_equality() {
		let record = serde_json::json!({ "type": "appointment", "id": 3, "active": true });
		let record = record.as_object().expect("object");

		assert!(metadata_eq("type", "appointment").evaluate(record));
		assert!(metadata_eq("id", "3").evaluate(record));
		assert!(metadata_eq("active", "true").evaluate(record));
		assert!(!metadata_eq("type", "vehicle").evaluate(record));
		assert!(!metadata_eq("missing", "").evaluate(record));
	}

	#[test]
	fn evaluate_empty_membership_matches_nothing() {
		let record = serde_json::json!({ "type": "appointment" });
		let predicate =
			Predicate::In { column: Column::Metadata("type".to_string()), values: Vec::new() };

		assert!(!predicate.evaluate(record.as_object().expect("object")));
	}

	#[test]
	fn evaluate_substring_is_case_insensitive_and_literal() {
		let record = serde_json::json!({ "make": "TOYOTA", "trim": "SE" });
		let record = record.as_object().expect("object");
		let make =
			Predicate::Substring { column: Column::Named("make"), needle: "toy".to_string() };
		let wildcard =
			Predicate::Substring { column: Column::Named("trim"), needle: "%".to_string() };

		assert!(make.evaluate(record));
		assert!(!wildcard.evaluate(record));
	}

	#[test]
	fn evaluate_range_is_inclusive() {
		let record = serde_json::json!({ "selling_price": 25_000.0 });
		let record = record.as_object().expect("object");
		let inclusive = Predicate::Range {
			column: Column::Named("selling_price"),
			lo: Some(25_000.0),
			hi: Some(25_000.0),
		};
		let below = Predicate::Range {
			column: Column::Named("selling_price"),
			lo: None,
			hi: Some(24_999.0),
		};

		assert!(inclusive.evaluate(record));
		assert!(!below.evaluate(record));
	}
}
