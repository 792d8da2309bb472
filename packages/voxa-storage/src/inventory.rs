use crate::{
	Result,
	db::Db,
	models::InventoryRecord,
	sql::{self, BindValue, Predicate, SqlBuilder},
};

/// Every selected column with the cast that pins its wire type to the record field.
const SELECT_COLUMNS: &str = "\
	vin::text AS vin,
	stock_number::text AS stock_number,
	type::text AS \"type\",
	year::int4 AS year,
	make::text AS make,
	model::text AS model,
	\"trim\"::text AS \"trim\",
	style::text AS style,
	model_number::text AS model_number,
	mileage::int8 AS mileage,
	exterior_color::text AS exterior_color,
	exterior_color_code::text AS exterior_color_code,
	interior_color::text AS interior_color,
	interior_color_code::text AS interior_color_code,
	date_in_stock::date AS date_in_stock,
	certified::bool AS certified,
	msrp::float8 AS msrp,
	invoice::float8 AS invoice,
	book_value::float8 AS book_value,
	selling_price::float8 AS selling_price,
	engine_cylinders::int4 AS engine_cylinders,
	engine_displacement::float8 AS engine_displacement,
	drive_type::text AS drive_type,
	fuel_type::text AS fuel_type,
	transmission::text AS transmission,
	wheelbase::float8 AS wheelbase,
	body::text AS body,
	doors::int4 AS doors,
	description::text AS description,
	options::text AS options,
	kbb_retail::float8 AS kbb_retail,
	kbb_valuation_date::date AS kbb_valuation_date,
	kbb_zip_code::text AS kbb_zip_code,
	added_equipment_pricing::float8 AS added_equipment_pricing,
	dealer_processing_fee::float8 AS dealer_processing_fee,
	location::text AS location,
	vehicle_status::text AS vehicle_status,
	engine_type::text AS engine_type,
	drive_line::text AS drive_line,
	transmission_secondary::text AS transmission_secondary,
	city_fuel_economy::float8 AS city_fuel_economy,
	highway_fuel_economy::float8 AS highway_fuel_economy,
	features::text AS features,
	packages::text AS packages";

/// Builds the inventory SELECT for `predicates`, oldest stock first.
///
/// `table` must already be a validated identifier.
pub fn build_select(table: &str, predicates: &[Predicate]) -> (String, Vec<BindValue>) {
	let mut builder = SqlBuilder::new();

	builder.push("SELECT\n");
	builder.push(SELECT_COLUMNS);
	builder.push("\nFROM ");
	builder.push(table);
	builder.push("\nWHERE ");
	builder.push_predicates(predicates);
	builder.push("\nORDER BY date_in_stock ASC NULLS LAST, vin ASC");

	builder.finish()
}

pub async fn select(
	db: &Db,
	table: &str,
	predicates: &[Predicate],
) -> Result<Vec<InventoryRecord>> {
	let (text, params) = build_select(table, predicates);
	let rows = sql::bind_query_as(sqlx::query_as::<_, InventoryRecord>(&text), params)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sql::Column;

	#[test]
	fn empty_filter_selects_everything_in_stock_order() {
		let (text, params) = build_select("demo_vehicle_inventory", &[]);

		assert!(text.contains("FROM demo_vehicle_inventory\nWHERE TRUE\n"));
		assert!(text.ends_with("ORDER BY date_in_stock ASC NULLS LAST, vin ASC"));
		assert!(params.is_empty());
	}

	#[test]
	fn text_depends_only_on_present_filters() {
		let toyota = [
			Predicate::Substring { column: Column::Named("make"), needle: "Toyota".to_string() },
			Predicate::Eq { column: Column::Named("year"), value: BindValue::Int(2022) },
		];
		let honda = [
			Predicate::Substring { column: Column::Named("make"), needle: "Honda".to_string() },
			Predicate::Eq { column: Column::Named("year"), value: BindValue::Int(2019) },
		];
		let (toyota_text, toyota_params) = build_select("demo_vehicle_inventory", &toyota);
		let (honda_text, _) = build_select("demo_vehicle_inventory", &honda);

		assert_eq!(toyota_text, honda_text);
		assert!(toyota_text.contains("WHERE (\"make\"::text ILIKE $1 ESCAPE '\\') AND (\"year\" = $2)"));
		assert_eq!(
			toyota_params,
			vec![BindValue::Text("%Toyota%".to_string()), BindValue::Int(2022)]
		);
	}
}
