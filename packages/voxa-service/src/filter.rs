use std::fmt::{self, Formatter};

use serde::{
	Deserialize, Deserializer, Serialize, Serializer,
	de::{MapAccess, Visitor},
	ser::SerializeMap,
};
use serde_json::Value;

use voxa_storage::sql::{BindValue, Column, Predicate};

use crate::{Error, Result};

const MAX_FIELD_BYTES: usize = 64;
const MAX_FILTER_ENTRIES: usize = 32;
const MAX_IN_LIST_ITEMS: usize = 128;
const MAX_STRING_BYTES: usize = 512;

/// Metadata equality/membership constraints, kept in the order the caller supplied them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
	entries: Vec<(String, Value)>,
}
impl FilterCriteria {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		self.entries.push((field.into(), value.into()));

		self
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(field, value)| (field.as_str(), value))
	}
}
impl<K, V> FromIterator<(K, V)> for FilterCriteria
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
	}
}
impl Serialize for FilterCriteria {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;

		for (field, value) in &self.entries {
			map.serialize_entry(field, value)?;
		}

		map.end()
	}
}
impl<'de> Deserialize<'de> for FilterCriteria {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct CriteriaVisitor;
		impl<'de> Visitor<'de> for CriteriaVisitor {
			type Value = FilterCriteria;

			fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
				f.write_str("a mapping of metadata field to value or list of values")
			}

			fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));

				while let Some((field, value)) = access.next_entry::<String, Value>()? {
					entries.push((field, value));
				}

				Ok(FilterCriteria { entries })
			}

			fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
			where
				E: serde::de::Error,
			{
				Ok(FilterCriteria::default())
			}
		}

		deserializer.deserialize_any(CriteriaVisitor)
	}
}

/// Compiles `criteria` into metadata predicates. Nothing is rendered into SQL here; field names
/// and values both travel as bind parameters.
pub fn compile_filter(criteria: &FilterCriteria) -> Result<Vec<Predicate>> {
	if criteria.len() > MAX_FILTER_ENTRIES {
		return Err(invalid("$.filter", format!("at most {MAX_FILTER_ENTRIES} fields are allowed.")));
	}

	let mut predicates = Vec::with_capacity(criteria.len());

	for (field, value) in criteria.iter() {
		let path = format!("$.filter.{field}");

		validate_field(field, &path)?;

		let column = Column::Metadata(field.to_string());
		let predicate = match value {
			Value::Array(items) => {
				if items.len() > MAX_IN_LIST_ITEMS {
					return Err(invalid(
						&path,
						format!("lists may hold at most {MAX_IN_LIST_ITEMS} values."),
					));
				}

				let values = items
					.iter()
					.enumerate()
					.map(|(idx, item)| scalar_text(item, &format!("{path}[{idx}]")))
					.collect::<Result<Vec<_>>>()?;

				Predicate::In { column, values }
			},
			scalar => Predicate::Eq { column, value: BindValue::Text(scalar_text(scalar, &path)?) },
		};

		predicates.push(predicate);
	}

	Ok(predicates)
}

fn validate_field(field: &str, path: &str) -> Result<()> {
	if field.is_empty() {
		return Err(invalid(path, "field name must be non-empty.".to_string()));
	}
	if field.len() > MAX_FIELD_BYTES {
		return Err(invalid(path, format!("field name must be at most {MAX_FIELD_BYTES} bytes.")));
	}
	if !field.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
		return Err(invalid(path, "field name may only contain [A-Za-z0-9_].".to_string()));
	}

	Ok(())
}

/// Text form compared against `metadata ->> field`.
fn scalar_text(value: &Value, path: &str) -> Result<String> {
	match value {
		Value::String(text) => {
			if text.len() > MAX_STRING_BYTES {
				return Err(invalid(
					path,
					format!("string values must be at most {MAX_STRING_BYTES} bytes."),
				));
			}

			Ok(text.clone())
		},
		Value::Number(number) => Ok(number.to_string()),
		Value::Bool(flag) => Ok(flag.to_string()),
		Value::Null => Err(invalid(path, "null is not a valid filter value.".to_string())),
		Value::Array(_) | Value::Object(_) =>
			Err(invalid(path, "value must be a string, number or boolean.".to_string())),
	}
}

fn invalid(path: &str, message: String) -> Error {
	Error::InvalidFilter { message: format!("{path}: {message}") }
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn compile(raw: Value) -> Result<Vec<Predicate>> {
		let criteria: FilterCriteria = serde_json::from_value(raw).expect("criteria must parse");

		compile_filter(&criteria)
	}

	#[test]
	fn empty_criteria_compile_to_nothing() {
		assert!(compile(json!({})).expect("compile failed").is_empty());
	}

	#[test]
	fn preserves_caller_order() {
		let criteria: FilterCriteria =
			serde_json::from_str(r#"{"zeta": "z", "alpha": "a", "mid": 1}"#).expect("parse failed");
		let fields = criteria.iter().map(|(field, _)| field).collect::<Vec<_>>();

		assert_eq!(fields, vec!["zeta", "alpha", "mid"]);
	}

	#[test]
	fn scalars_compile_to_text_equality() {
		let predicates =
			compile(json!({ "type": "appointment", "id": 3, "active": true })).expect("compile failed");

		assert!(predicates.contains(&Predicate::Eq {
			column: Column::Metadata("type".to_string()),
			value: BindValue::Text("appointment".to_string()),
		}));
		assert!(predicates.contains(&Predicate::Eq {
			column: Column::Metadata("id".to_string()),
			value: BindValue::Text("3".to_string()),
		}));
		assert!(predicates.contains(&Predicate::Eq {
			column: Column::Metadata("active".to_string()),
			value: BindValue::Text("true".to_string()),
		}));
	}

	#[test]
	fn lists_compile_to_membership() {
		let predicates = compile(json!({ "topic": ["maintenance", 2] })).expect("compile failed");

		assert_eq!(
			predicates,
			vec![Predicate::In {
				column: Column::Metadata("topic".to_string()),
				values: vec!["maintenance".to_string(), "2".to_string()],
			}]
		);
	}

	#[test]
	fn empty_list_is_valid() {
		let predicates = compile(json!({ "topic": [] })).expect("compile failed");

		assert_eq!(
			predicates,
			vec![Predicate::In { column: Column::Metadata("topic".to_string()), values: Vec::new() }]
		);
	}

	#[test]
	fn rejects_unsafe_field_names() {
		for field in ["", "type; DROP TABLE x", "a-b", "meta.key", "é"] {
			let criteria = FilterCriteria::new().with(field, "x");
			let err = compile_filter(&criteria).expect_err("expected invalid field");

			assert!(matches!(err, Error::InvalidFilter { .. }), "unexpected error: {err:?}");
		}

		let long = FilterCriteria::new().with("a".repeat(MAX_FIELD_BYTES + 1), "x");

		assert!(compile_filter(&long).is_err());
	}

	#[test]
	fn rejects_null_objects_and_nested_lists() {
		for raw in [
			json!({ "type": null }),
			json!({ "type": { "eq": "x" } }),
			json!({ "type": ["a", ["b"]] }),
			json!({ "type": ["a", null] }),
		] {
			let err = compile(raw).expect_err("expected invalid value");

			assert!(matches!(err, Error::InvalidFilter { .. }), "unexpected error: {err:?}");
		}
	}

	#[test]
	fn errors_carry_the_offending_path() {
		let err = compile(json!({ "tags": ["ok", {}] })).expect_err("expected invalid value");

		assert!(err.to_string().contains("$.filter.tags[1]"), "unexpected message: {err}");
	}

	#[test]
	fn null_filter_deserializes_as_empty() {
		let criteria: FilterCriteria = serde_json::from_value(Value::Null).expect("parse failed");

		assert!(criteria.is_empty());
	}
}
