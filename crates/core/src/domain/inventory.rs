use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

/// A priced catalog entry. Owned and mutated by the inventory surface;
/// the conversational core only ever reads it. `name` is the canonical
/// spelling that appears on invoices, never raw user text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub stock_quantity: i64,
    pub requires_prescription: bool,
    /// Free-text ailment keywords ("Fever, Headache") searched by the
    /// symptom mapper.
    pub used_for: Option<String>,
}
