use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use voxa_storage::{
	models::InventoryRecord,
	sql::{BindValue, Column, Predicate},
};

use crate::{
	Error, Result, RetrievalEngine,
	search::{Deadline, within},
	window::{self, TokenBudget},
};

/// Columns every inventory result carries.
pub const DEFAULT_COLUMNS: [&str; 25] = [
	"vin",
	"stock_number",
	"type",
	"year",
	"make",
	"model",
	"trim",
	"style",
	"model_number",
	"mileage",
	"exterior_color",
	"interior_color",
	"msrp",
	"selling_price",
	"drive_type",
	"fuel_type",
	"transmission",
	"wheelbase",
	"body",
	"doors",
	"vehicle_status",
	"city_fuel_economy",
	"highway_fuel_economy",
	"features",
	"packages",
];
/// Additional columns a caller may request.
pub const EXTRA_COLUMNS: [&str; 19] = [
	"exterior_color_code",
	"interior_color_code",
	"date_in_stock",
	"certified",
	"invoice",
	"book_value",
	"engine_cylinders",
	"engine_displacement",
	"description",
	"options",
	"kbb_retail",
	"kbb_valuation_date",
	"kbb_zip_code",
	"added_equipment_pricing",
	"dealer_processing_fee",
	"location",
	"engine_type",
	"drive_line",
	"transmission_secondary",
];

/// Structured vehicle filters. Absent and blank fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFilters {
	pub vin: Option<String>,
	pub stock_number: Option<String>,
	#[serde(alias = "type")]
	pub vehicle_type: Option<String>,
	pub year: Option<i32>,
	pub make: Option<String>,
	pub model: Option<String>,
	pub trim: Option<String>,
	pub style: Option<String>,
	pub exterior_color: Option<String>,
	pub interior_color: Option<String>,
	pub fuel_type: Option<String>,
	pub transmission: Option<String>,
	pub drive_type: Option<String>,
	pub engine_type: Option<String>,
	pub features: Option<String>,
	pub packages: Option<String>,
	pub description: Option<String>,
	pub options: Option<String>,
	pub doors: Option<i32>,
	pub certified: Option<bool>,
	pub min_price: Option<f64>,
	pub max_price: Option<f64>,
}
impl InventoryFilters {
	/// Predicates for the present filters, always in the same field order.
	pub fn compile(&self) -> Result<Vec<Predicate>> {
		let mut predicates = Vec::new();

		if let Some(vin) = present(&self.vin) {
			predicates.push(Predicate::Eq {
				column: Column::Named("vin"),
				value: BindValue::Text(vin.to_string()),
			});
		}

		push_substring(&mut predicates, "stock_number", &self.stock_number);
		push_substring(&mut predicates, "type", &self.vehicle_type);

		if let Some(year) = self.year {
			predicates.push(Predicate::Eq {
				column: Column::Named("year"),
				value: BindValue::Int(i64::from(year)),
			});
		}

		for (column, value) in [
			("make", &self.make),
			("model", &self.model),
			("trim", &self.trim),
			("style", &self.style),
			("exterior_color", &self.exterior_color),
			("interior_color", &self.interior_color),
			("fuel_type", &self.fuel_type),
			("transmission", &self.transmission),
			("drive_type", &self.drive_type),
			("engine_type", &self.engine_type),
			("features", &self.features),
			("packages", &self.packages),
			("description", &self.description),
			("options", &self.options),
		] {
			push_substring(&mut predicates, column, value);
		}

		if let Some(doors) = self.doors {
			predicates.push(Predicate::Eq {
				column: Column::Named("doors"),
				value: BindValue::Int(i64::from(doors)),
			});
		}
		if let Some(certified) = self.certified {
			predicates.push(Predicate::Eq {
				column: Column::Named("certified"),
				value: BindValue::Bool(certified),
			});
		}

		for (name, price) in [("min_price", self.min_price), ("max_price", self.max_price)] {
			if price.is_some_and(|price| !price.is_finite()) {
				return Err(Error::InvalidFilter { message: format!("{name} must be a finite number.") });
			}
		}

		if let (Some(min), Some(max)) = (self.min_price, self.max_price)
			&& min > max
		{
			return Err(Error::InvalidFilter {
				message: format!("min_price {min} exceeds max_price {max}."),
			});
		}
		if self.min_price.is_some() || self.max_price.is_some() {
			predicates.push(Predicate::Range {
				column: Column::Named("selling_price"),
				lo: self.min_price,
				hi: self.max_price,
			});
		}

		Ok(predicates)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryRequest {
	#[serde(default)]
	pub filters: InventoryFilters,
	#[serde(default)]
	pub extra_fields: Vec<String>,
	/// Estimated token cap for the returned vehicles. Falls back to the configured default.
	pub token_budget: Option<u64>,
	/// Bounds the row fetch and windowing together. Expiry returns no rows.
	pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryResponse {
	pub vehicles: Vec<Map<String, Value>>,
	/// Rows that matched before the budget was applied.
	pub matched: usize,
	pub estimated_tokens: u64,
}

impl RetrievalEngine {
	pub async fn search_inventory(&self, req: InventoryRequest) -> Result<InventoryResponse> {
		let predicates = req.filters.compile()?;
		let columns = output_columns(&req.extra_fields)?;
		let budget = TokenBudget { limit: req.token_budget.or(self.cfg.inventory.default_token_budget) };
		let (matched, estimated_tokens, vehicles) =
			within(Deadline::from_timeout(req.timeout_ms), async {
				let records = self.inventory.select(&predicates).await?;
				let matched = records.len();
				let cost_fn = self.cost_fn.clone();
				let window = window::window(records, budget, |record| cost_fn(record));
				let estimated_tokens = window.total();
				let vehicles = window
					.into_records()
					.iter()
					.map(|record| project(record, &columns))
					.collect::<Result<Vec<_>>>()?;

				Ok((matched, estimated_tokens, vehicles))
			})
			.await?;

		tracing::info!(
			filters = predicates.len(),
			matched,
			returned = vehicles.len(),
			estimated_tokens,
			limit = ?budget.limit,
			"Inventory search completed."
		);

		Ok(InventoryResponse { vehicles, matched, estimated_tokens })
	}
}

/// Default columns followed by the requested extras, without duplicates.
fn output_columns(extra_fields: &[String]) -> Result<Vec<&'static str>> {
	let mut columns = DEFAULT_COLUMNS.to_vec();

	for field in extra_fields {
		let name = field.trim();
		let Some(column) =
			DEFAULT_COLUMNS.iter().chain(EXTRA_COLUMNS.iter()).find(|column| **column == name)
		else {
			return Err(Error::InvalidFilter {
				message: format!("Unknown inventory field {name:?}."),
			});
		};

		if !columns.contains(column) {
			columns.push(*column);
		}
	}

	Ok(columns)
}

fn project(record: &InventoryRecord, columns: &[&str]) -> Result<Map<String, Value>> {
	let Value::Object(mut row) = serde_json::to_value(record).map_err(|err| {
		Error::RetrievalUnavailable { message: format!("Failed to encode inventory row: {err}.") }
	})?
	else {
		return Err(Error::RetrievalUnavailable {
			message: "Inventory row did not encode as an object.".to_string(),
		});
	};
	let mut projected = Map::with_capacity(columns.len());

	for column in columns {
		projected.insert((*column).to_string(), row.remove(*column).unwrap_or(Value::Null));
	}

	Ok(projected)
}

fn present(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn push_substring(predicates: &mut Vec<Predicate>, column: &'static str, value: &Option<String>) {
	if let Some(needle) = present(value) {
		predicates.push(Predicate::Substring {
			column: Column::Named(column),
			needle: needle.to_string(),
		});
	}
}

#[cfg(test)]
mod tests {
	use voxa_storage::inventory::build_select;

	use super::*;

	#[test]
	fn absent_and_blank_filters_contribute_nothing() {
		let filters = InventoryFilters {
			make: Some("   ".to_string()),
			model: Some(String::new()),
			..Default::default()
		};

		assert!(filters.compile().expect("compile failed").is_empty());
	}

	#[test]
	fn filters_compile_in_fixed_order() {
		let filters = InventoryFilters {
			max_price: Some(30_000.0),
			certified: Some(true),
			make: Some("Toyota".to_string()),
			vin: Some("VIN1".to_string()),
			..Default::default()
		};
		let predicates = filters.compile().expect("compile failed");

		assert_eq!(
			predicates,
			vec![
				Predicate::Eq {
					column: Column::Named("vin"),
					value: BindValue::Text("VIN1".to_string())
				},
				Predicate::Substring {
					column: Column::Named("make"),
					needle: "Toyota".to_string()
				},
				Predicate::Eq { column: Column::Named("certified"), value: BindValue::Bool(true) },
				Predicate::Range {
					column: Column::Named("selling_price"),
					lo: None,
					hi: Some(30_000.0)
				},
			]
		);
	}

	#[test]
	fn query_text_depends_only_on_present_filter_names() {
		let a = InventoryFilters {
			make: Some("Toyota".to_string()),
			min_price: Some(10_000.0),
			..Default::default()
		};
		let b = InventoryFilters {
			make: Some("'; DROP TABLE x; --".to_string()),
			min_price: Some(99_999.0),
			..Default::default()
		};
		let (a_text, _) = build_select("demo_vehicle_inventory", &a.compile().expect("compile a"));
		let (b_text, b_params) =
			build_select("demo_vehicle_inventory", &b.compile().expect("compile b"));

		assert_eq!(a_text, b_text);
		assert!(!b_text.contains("DROP"));
		assert_eq!(b_params[0], BindValue::Text("%'; DROP TABLE x; --%".to_string()));
	}

	#[test]
	fn inverted_price_range_is_rejected() {
		let filters =
			InventoryFilters { min_price: Some(40_000.0), max_price: Some(20_000.0), ..Default::default() };
		let err = filters.compile().expect_err("expected invalid range");

		assert!(matches!(err, Error::InvalidFilter { .. }));
	}

	#[test]
	fn non_finite_price_is_rejected() {
		let filters = InventoryFilters { min_price: Some(f64::INFINITY), ..Default::default() };

		assert!(matches!(filters.compile(), Err(Error::InvalidFilter { .. })));
	}

	#[test]
	fn type_alias_deserializes() {
		let filters: InventoryFilters =
			serde_json::from_value(serde_json::json!({ "type": "SUV", "year": 2022 }))
				.expect("parse failed");

		assert_eq!(filters.vehicle_type.as_deref(), Some("SUV"));
		assert_eq!(filters.year, Some(2022));
	}

	#[test]
	fn extra_fields_come_from_the_allow_list() {
		let columns = output_columns(&["description".to_string(), "vin".to_string()])
			.expect("columns failed");

		assert_eq!(columns.len(), DEFAULT_COLUMNS.len() + 1);
		assert_eq!(columns.last(), Some(&"description"));

		let err = output_columns(&["password".to_string()]).expect_err("expected unknown field");

		assert!(matches!(err, Error::InvalidFilter { .. }));
	}

	#[test]
	fn projection_keeps_requested_columns_only() {
		let record = InventoryRecord {
			vin: "VIN1".to_string(),
			vehicle_type: Some("SUV".to_string()),
			description: Some("One owner".to_string()),
			..Default::default()
		};
		let row = project(&record, &["vin", "type"]).expect("project failed");

		assert_eq!(row.len(), 2);
		assert_eq!(row["type"], Value::String("SUV".to_string()));
	}
}
