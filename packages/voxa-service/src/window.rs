//! Token-budget windowing over records that are already in priority order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use voxa_storage::models::InventoryRecord;

/// Estimated token cost of one record.
pub type CostFn = Arc<dyn Fn(&InventoryRecord) -> u64 + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
	/// `None` keeps every record.
	pub limit: Option<u64>,
}
impl TokenBudget {
	pub fn unlimited() -> Self {
		Self { limit: None }
	}

	pub fn limited(limit: u64) -> Self {
		Self { limit: Some(limit) }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry<T> {
	pub record: T,
	pub cost: u64,
	pub running_total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeWindow<T> {
	pub entries: Vec<WindowEntry<T>>,
}
impl<T> CumulativeWindow<T> {
	pub fn total(&self) -> u64 {
		self.entries.last().map(|entry| entry.running_total).unwrap_or(0)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn into_records(self) -> Vec<T> {
		self.entries.into_iter().map(|entry| entry.record).collect()
	}
}

/// Keeps the longest prefix of `records` whose running cost stays within `budget`.
///
/// Records are never reordered or skipped: the first record that would overflow the budget ends
/// the window even if a later, cheaper one would fit.
pub fn window<T, F>(records: Vec<T>, budget: TokenBudget, cost_fn: F) -> CumulativeWindow<T>
where
	F: Fn(&T) -> u64,
{
	let mut entries = Vec::with_capacity(records.len());
	let mut running_total = 0_u64;

	if budget.limit == Some(0) {
		return CumulativeWindow { entries };
	}

	for record in records {
		let cost = cost_fn(&record);
		let next_total = running_total.saturating_add(cost);

		if budget.limit.is_some_and(|limit| next_total > limit) {
			break;
		}

		running_total = next_total;

		entries.push(WindowEntry { record, cost, running_total });
	}

	CumulativeWindow { entries }
}

/// Approximates tokens as characters over `chars_per_token` across the free-text fields.
///
/// A real tokenizer would count differently; the ratio is tuned for English prose.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioCost {
	chars_per_token: u64,
}
impl CharRatioCost {
	pub fn new(chars_per_token: u32) -> Self {
		Self { chars_per_token: u64::from(chars_per_token.max(1)) }
	}

	pub fn cost(&self, record: &InventoryRecord) -> u64 {
		let chars = record
			.text_fields()
			.iter()
			.flatten()
			.map(|field| field.chars().count() as u64)
			.fold(0_u64, u64::saturating_add);

		chars / self.chars_per_token
	}

	pub fn into_cost_fn(self) -> CostFn {
		Arc::new(move |record: &InventoryRecord| self.cost(record))
	}
}
