use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

/// A document row together with its distance to the query vector and, for hybrid queries, its
/// normalized full-text rank.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentHit {
	pub id: String,
	pub document: String,
	pub cmetadata: Value,
	pub distance: f64,
	pub text_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DocumentUpsert {
	pub id: String,
	pub document: String,
	pub cmetadata: Value,
	pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryRecord {
	pub vin: String,
	#[serde(default)]
	pub stock_number: Option<String>,
	#[serde(default, rename = "type")]
	#[sqlx(rename = "type")]
	pub vehicle_type: Option<String>,
	#[serde(default)]
	pub year: Option<i32>,
	#[serde(default)]
	pub make: Option<String>,
	#[serde(default)]
	pub model: Option<String>,
	#[serde(default)]
	pub trim: Option<String>,
	#[serde(default)]
	pub style: Option<String>,
	#[serde(default)]
	pub model_number: Option<String>,
	#[serde(default)]
	pub mileage: Option<i64>,
	#[serde(default)]
	pub exterior_color: Option<String>,
	#[serde(default)]
	pub exterior_color_code: Option<String>,
	#[serde(default)]
	pub interior_color: Option<String>,
	#[serde(default)]
	pub interior_color_code: Option<String>,
	#[serde(default, with = "crate::date_serde")]
	pub date_in_stock: Option<Date>,
	#[serde(default)]
	pub certified: Option<bool>,
	#[serde(default)]
	pub msrp: Option<f64>,
	#[serde(default)]
	pub invoice: Option<f64>,
	#[serde(default)]
	pub book_value: Option<f64>,
	#[serde(default)]
	pub selling_price: Option<f64>,
	#[serde(default)]
	pub engine_cylinders: Option<i32>,
	#[serde(default)]
	pub engine_displacement: Option<f64>,
	#[serde(default)]
	pub drive_type: Option<String>,
	#[serde(default)]
	pub fuel_type: Option<String>,
	#[serde(default)]
	pub transmission: Option<String>,
	#[serde(default)]
	pub wheelbase: Option<f64>,
	#[serde(default)]
	pub body: Option<String>,
	#[serde(default)]
	pub doors: Option<i32>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub options: Option<String>,
	#[serde(default)]
	pub kbb_retail: Option<f64>,
	#[serde(default, with = "crate::date_serde")]
	pub kbb_valuation_date: Option<Date>,
	#[serde(default)]
	pub kbb_zip_code: Option<String>,
	#[serde(default)]
	pub added_equipment_pricing: Option<f64>,
	#[serde(default)]
	pub dealer_processing_fee: Option<f64>,
	#[serde(default)]
	pub location: Option<String>,
	#[serde(default)]
	pub vehicle_status: Option<String>,
	#[serde(default)]
	pub engine_type: Option<String>,
	#[serde(default)]
	pub drive_line: Option<String>,
	#[serde(default)]
	pub transmission_secondary: Option<String>,
	#[serde(default)]
	pub city_fuel_economy: Option<f64>,
	#[serde(default)]
	pub highway_fuel_economy: Option<f64>,
	#[serde(default)]
	pub features: Option<String>,
	#[serde(default)]
	pub packages: Option<String>,
}
impl InventoryRecord {
	/// Free-text fields whose combined length drives the token cost estimate.
	pub fn text_fields(&self) -> [Option<&str>; 17] {
		[
			Some(self.vin.as_str()),
			self.stock_number.as_deref(),
			self.vehicle_type.as_deref(),
			self.make.as_deref(),
			self.model.as_deref(),
			self.trim.as_deref(),
			self.style.as_deref(),
			self.exterior_color.as_deref(),
			self.interior_color.as_deref(),
			self.fuel_type.as_deref(),
			self.transmission.as_deref(),
			self.drive_type.as_deref(),
			self.engine_type.as_deref(),
			self.features.as_deref(),
			self.packages.as_deref(),
			self.description.as_deref(),
			self.options.as_deref(),
		]
	}
}
