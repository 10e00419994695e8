//! Entity model for the live tab ledger.
//!
//! A `Ledger` holds a fixed set of table slots (`1..=TOTAL_TABLES`); each
//! enabled table carries the guests seated at it and their running bills.
//! People and order lines are addressed by a monotonically increasing local
//! id allocated at creation, so removals never shift the identity of the
//! remaining entries. The serialized JSON shape stays compatible with what
//! the mobile app persisted, with the ids as an additive field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::currency::round2;

/// Errors for ledger mutations. Precondition violations are surfaced as
/// typed errors rather than silent no-ops; the caller decides how to react.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("table {0} not found")]
    TableNotFound(u32),
    #[error("person {0} not found at table")]
    PersonNotFound(u64),
    #[error("order line {0} not found")]
    OrderLineNotFound(u64),
    #[error("table number cannot be empty")]
    EmptyTableNumber,
    #[error("table {0} has unpaid people and cannot be archived")]
    TableNotFullyPaid(u32),
    #[error("no order lines selected")]
    EmptySelection,
    #[error("person has already paid")]
    PersonAlreadyPaid,
    #[error("product name cannot be empty")]
    EmptyProductName,
    #[error("product price cannot be negative")]
    NegativePrice,
    #[error("product {0:?} already exists")]
    DuplicateProduct(String),
    #[error("product {0:?} not found")]
    ProductNotFound(String),
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A catalog product. `name` is the unique, case-sensitive business key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: f64,
}

/// One line of a bill: a product snapshot and a quantity.
///
/// The embedded product price is frozen at assignment time; later catalog
/// edits never rewrite existing lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: u64,
    pub product: Product,
    pub quantity: u32,
    #[serde(rename = "importedViaQR", default)]
    pub imported_via_qr: bool,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.product.price * self.quantity as f64
    }
}

/// A guest seated at a table, with their own running bill.
///
/// Invariant: `bill` equals the sum of the line totals in `orders` after
/// every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub avatar: String,
    pub bill: f64,
    pub orders: Vec<OrderItem>,
    #[serde(default)]
    pub paid: bool,
}

impl Person {
    /// Sum of the line totals, independent of the cached `bill`.
    pub fn computed_bill(&self) -> f64 {
        self.orders.iter().map(OrderItem::line_total).sum()
    }

    pub fn order_by_id(&self, order_id: u64) -> Option<&OrderItem> {
        self.orders.iter().find(|o| o.id == order_id)
    }
}

/// A fixed physical table slot. `id` is assigned once at initialization and
/// never reused; `number` is the human-facing key used for cross-device
/// matching during import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: u32,
    pub enabled: bool,
    pub name: String,
    pub number: String,
    pub people: Vec<Person>,
    pub products: Vec<Product>,
}

impl Table {
    /// A disabled empty slot, preserving only the id.
    pub fn empty(id: u32) -> Self {
        Table {
            id,
            enabled: false,
            name: String::new(),
            number: String::new(),
            people: Vec::new(),
            products: Vec::new(),
        }
    }

    /// Derived ALL_PAID predicate: at least one person, and nobody unpaid.
    pub fn is_fully_paid(&self) -> bool {
        !self.people.is_empty() && self.people.iter().all(|p| p.paid)
    }

    /// Sum of every person's bill.
    pub fn total(&self) -> f64 {
        self.people.iter().map(|p| p.bill).sum()
    }

    /// Indices of the people who have not paid yet.
    pub fn unpaid_people(&self) -> Vec<usize> {
        self.people
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.paid)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn person_by_id(&self, person_id: u64) -> Option<&Person> {
        self.people.iter().find(|p| p.id == person_id)
    }
}

/// An immutable snapshot of a table at the moment it was archived.
/// Created only by the archive operation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub date: i64,
    pub table_id: u32,
    pub table_number: String,
    pub table_name: String,
    pub people: Vec<Person>,
    pub table_products: Vec<Product>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The full in-memory collection of tables plus the id counter for people
/// and order lines. The counter is not persisted; it is rebuilt from the
/// highest id present when a saved table set is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub tables: Vec<Table>,
    next_entity_id: u64,
}

impl Ledger {
    /// Fresh ledger with `total_tables` disabled slots numbered from 1.
    pub fn new(total_tables: u32) -> Self {
        Ledger {
            tables: (1..=total_tables).map(Table::empty).collect(),
            next_entity_id: 1,
        }
    }

    /// Rebuild a ledger from a persisted table set. Entries saved by older
    /// app versions carry no ids; those default to 0 and keep working
    /// through the index-based adapters.
    pub fn from_tables(tables: Vec<Table>) -> Self {
        let max_id = tables
            .iter()
            .flat_map(|t| &t.people)
            .flat_map(|p| std::iter::once(p.id).chain(p.orders.iter().map(|o| o.id)))
            .max()
            .unwrap_or(0);
        Ledger {
            tables,
            next_entity_id: max_id + 1,
        }
    }

    pub fn table(&self, table_id: u32) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == table_id)
    }

    pub fn table_mut(&mut self, table_id: u32) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == table_id)
    }

    /// Tables currently configured as active tabs.
    pub fn enabled_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.enabled)
    }

    /// Allocate the next local entity id.
    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }
}

/// Recompute a person's bill from their order lines, rounded to 2 decimals.
pub(crate) fn recompute_bill(person: &mut Person) {
    person.bill = round2(person.computed_bill());
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn beer() -> Product {
        Product {
            name: "Cerveja".into(),
            price: 5.0,
        }
    }

    #[test]
    fn test_new_ledger_has_disabled_slots() {
        let ledger = Ledger::new(12);
        assert_eq!(ledger.tables.len(), 12);
        assert_eq!(ledger.tables[0].id, 1);
        assert_eq!(ledger.tables[11].id, 12);
        assert!(ledger.tables.iter().all(|t| !t.enabled));
        assert!(ledger.tables.iter().all(|t| t.people.is_empty()));
    }

    #[test]
    fn test_line_total_and_computed_bill() {
        let person = Person {
            id: 1,
            name: "Ana".into(),
            avatar: String::new(),
            bill: 0.0,
            orders: vec![
                OrderItem {
                    id: 2,
                    product: beer(),
                    quantity: 2,
                    imported_via_qr: false,
                },
                OrderItem {
                    id: 3,
                    product: Product {
                        name: "Vinho".into(),
                        price: 8.0,
                    },
                    quantity: 1,
                    imported_via_qr: false,
                },
            ],
            paid: false,
        };
        assert!((person.orders[0].line_total() - 10.0).abs() < 0.001);
        assert!((person.computed_bill() - 18.0).abs() < 0.001);
    }

    #[test]
    fn test_is_fully_paid() {
        let mut table = Table::empty(1);
        assert!(!table.is_fully_paid(), "empty table is never fully paid");

        table.people.push(Person {
            id: 1,
            name: "Ana".into(),
            avatar: String::new(),
            bill: 0.0,
            orders: vec![],
            paid: true,
        });
        assert!(table.is_fully_paid());

        table.people.push(Person {
            id: 2,
            name: "Bia".into(),
            avatar: String::new(),
            bill: 0.0,
            orders: vec![],
            paid: false,
        });
        assert!(!table.is_fully_paid());
        assert_eq!(table.unpaid_people(), vec![1]);
    }

    #[test]
    fn test_from_tables_rebuilds_id_counter() {
        let mut table = Table::empty(1);
        table.enabled = true;
        table.people.push(Person {
            id: 7,
            name: "Ana".into(),
            avatar: String::new(),
            bill: 5.0,
            orders: vec![OrderItem {
                id: 9,
                product: beer(),
                quantity: 1,
                imported_via_qr: false,
            }],
            paid: false,
        });

        let mut ledger = Ledger::from_tables(vec![table]);
        assert_eq!(ledger.allocate_id(), 10);
    }

    #[test]
    fn test_serialized_shape_keeps_app_keys() {
        let item = OrderItem {
            id: 1,
            product: beer(),
            quantity: 2,
            imported_via_qr: true,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["importedViaQR"], true);
        assert_eq!(value["product"]["name"], "Cerveja");
        assert_eq!(value["quantity"], 2);
    }

    #[test]
    fn test_deserialize_legacy_entry_without_ids() {
        let raw = r#"{
            "name": "Ana",
            "avatar": "",
            "bill": 10.0,
            "orders": [
                { "product": { "name": "Cerveja", "price": 5.0 }, "quantity": 2 }
            ]
        }"#;
        let person: Person = serde_json::from_str(raw).unwrap();
        assert_eq!(person.id, 0);
        assert!(!person.paid);
        assert!(!person.orders[0].imported_via_qr);
    }
}
