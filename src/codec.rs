//! Compact wire payloads for QR transfer.
//!
//! Two shapes exist: the single-person selected-orders payload and the
//! whole-restaurant snapshot with intentionally shortened field names.
//! Field order is fixed by the struct definitions so the serialized output
//! (and therefore the compressed size) is reproducible for the same input.

use serde::{Deserialize, Serialize};

use crate::currency::round2;
use crate::ledger::{LedgerError, Person, Table};

/// Version stamp embedded in snapshot payloads.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Payload `type` tag for person-orders transfers.
pub const PERSON_ORDERS_TYPE: &str = "PERSON_ORDERS";

// ---------------------------------------------------------------------------
// Person-orders payload
// ---------------------------------------------------------------------------

/// Wire form of one transferred order line. Only the product snapshot and
/// quantity travel; avatar, bill and paid state are recomputed on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOrder {
    pub product: WireProduct,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProduct {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTableRef {
    pub number: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePersonRef {
    pub name: String,
}

/// Selected orders of a single person, addressed by the table's business
/// number and the person's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonOrdersPayload {
    #[serde(rename = "type", default = "person_orders_type")]
    pub kind: String,
    pub table: WireTableRef,
    pub person: WirePersonRef,
    pub orders: Vec<WireOrder>,
}

fn person_orders_type() -> String {
    PERSON_ORDERS_TYPE.to_string()
}

/// Build the person-orders payload for the order lines at the given
/// positions within the person's list.
pub fn serialize_person_orders(
    table: &Table,
    person: &Person,
    order_indices: &[usize],
) -> Result<PersonOrdersPayload, LedgerError> {
    if order_indices.is_empty() {
        return Err(LedgerError::EmptySelection);
    }

    let mut orders = Vec::with_capacity(order_indices.len());
    for &index in order_indices {
        let line = person
            .orders
            .get(index)
            .ok_or(LedgerError::OrderLineNotFound(index as u64))?;
        orders.push(WireOrder {
            product: WireProduct {
                name: line.product.name.clone(),
                price: round2(line.product.price),
            },
            quantity: line.quantity,
        });
    }

    Ok(PersonOrdersPayload {
        kind: PERSON_ORDERS_TYPE.to_string(),
        table: WireTableRef {
            number: table.number.clone(),
            name: table.name.clone(),
        },
        person: WirePersonRef {
            name: person.name.clone(),
        },
        orders,
    })
}

// ---------------------------------------------------------------------------
// Whole-restaurant snapshot payload
// ---------------------------------------------------------------------------

/// Snapshot of every enabled table, with shortened keys to keep the QR
/// payload small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub v: String,
    pub t: i64,
    pub d: Vec<SnapshotTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTable {
    /// Table number (business key).
    pub n: String,
    /// Table name.
    pub nm: String,
    /// People seated at the table.
    pub p: Vec<SnapshotPerson>,
    /// Products assigned to the table itself.
    pub pr: Vec<SnapshotProduct>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPerson {
    pub n: String,
    pub b: f64,
    pub o: Vec<SnapshotOrder>,
    /// Paid flag as 0|1.
    pub pd: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotOrder {
    /// Product name.
    pub p: String,
    pub q: u32,
    /// Unit price, rounded to 2 decimals.
    pub pr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProduct {
    pub n: String,
    pub pr: f64,
}

/// Build the whole-restaurant snapshot for every enabled table.
pub fn serialize_all_tables(tables: &[Table], timestamp_ms: i64) -> SnapshotPayload {
    SnapshotPayload {
        v: SNAPSHOT_VERSION.to_string(),
        t: timestamp_ms,
        d: tables
            .iter()
            .filter(|t| t.enabled)
            .map(|table| SnapshotTable {
                n: table.number.clone(),
                nm: table.name.clone(),
                p: table
                    .people
                    .iter()
                    .map(|person| SnapshotPerson {
                        n: person.name.clone(),
                        b: round2(person.bill),
                        o: person
                            .orders
                            .iter()
                            .map(|order| SnapshotOrder {
                                p: order.product.name.clone(),
                                q: order.quantity,
                                pr: round2(order.product.price),
                            })
                            .collect(),
                        pd: u8::from(person.paid),
                    })
                    .collect(),
                pr: table
                    .products
                    .iter()
                    .map(|product| SnapshotProduct {
                        n: product.name.clone(),
                        pr: round2(product.price),
                    })
                    .collect(),
            })
            .collect(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OrderItem, Product};

    fn sample_table() -> Table {
        Table {
            id: 7,
            enabled: true,
            name: "Varanda".into(),
            number: "7".into(),
            people: vec![Person {
                id: 1,
                name: "Ana".into(),
                avatar: "avatar://1".into(),
                bill: 10.0,
                orders: vec![OrderItem {
                    id: 2,
                    product: Product {
                        name: "Cerveja".into(),
                        price: 5.0,
                    },
                    quantity: 2,
                    imported_via_qr: false,
                }],
                paid: false,
            }],
            products: vec![Product {
                name: "Balde de Gelo".into(),
                price: 12.004,
            }],
        }
    }

    #[test]
    fn test_person_orders_payload_shape() {
        let table = sample_table();
        let payload = serialize_person_orders(&table, &table.people[0], &[0]).unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["type"], "PERSON_ORDERS");
        assert_eq!(value["table"]["number"], "7");
        assert_eq!(value["table"]["name"], "Varanda");
        assert_eq!(value["person"]["name"], "Ana");
        assert_eq!(value["orders"][0]["product"]["name"], "Cerveja");
        assert_eq!(value["orders"][0]["product"]["price"], 5.0);
        assert_eq!(value["orders"][0]["quantity"], 2);

        // Avatar, bill and paid state never travel.
        assert!(value["person"].get("avatar").is_none());
        assert!(value["person"].get("bill").is_none());
        assert!(value["person"].get("paid").is_none());
    }

    #[test]
    fn test_person_orders_rejects_empty_selection() {
        let table = sample_table();
        assert_eq!(
            serialize_person_orders(&table, &table.people[0], &[]).unwrap_err(),
            LedgerError::EmptySelection
        );
    }

    #[test]
    fn test_person_orders_rejects_unknown_index() {
        let table = sample_table();
        assert_eq!(
            serialize_person_orders(&table, &table.people[0], &[5]).unwrap_err(),
            LedgerError::OrderLineNotFound(5)
        );
    }

    #[test]
    fn test_snapshot_shape_and_rounding() {
        let tables = vec![sample_table(), Table::empty(8)];
        let payload = serialize_all_tables(&tables, 1_700_000_000_000);
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["v"], "1.0");
        assert_eq!(value["t"], 1_700_000_000_000_i64);
        // Disabled table 8 is excluded.
        assert_eq!(value["d"].as_array().unwrap().len(), 1);

        let table = &value["d"][0];
        assert_eq!(table["n"], "7");
        assert_eq!(table["nm"], "Varanda");
        assert_eq!(table["p"][0]["n"], "Ana");
        assert_eq!(table["p"][0]["b"], 10.0);
        assert_eq!(table["p"][0]["pd"], 0);
        assert_eq!(table["p"][0]["o"][0]["p"], "Cerveja");
        assert_eq!(table["p"][0]["o"][0]["q"], 2);
        assert_eq!(table["p"][0]["o"][0]["pr"], 5.0);
        // Table product price is rounded to 2 decimals.
        assert_eq!(table["pr"][0]["pr"], 12.0);
    }

    #[test]
    fn test_snapshot_paid_flag_is_numeric() {
        let mut table = sample_table();
        table.people[0].paid = true;
        let payload = serialize_all_tables(&[table], 0);
        assert_eq!(payload.d[0].p[0].pd, 1);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let table = sample_table();
        let a = serde_json::to_string(&serialize_all_tables(std::slice::from_ref(&table), 42))
            .unwrap();
        let b = serde_json::to_string(&serialize_all_tables(std::slice::from_ref(&table), 42))
            .unwrap();
        assert_eq!(a, b);
    }
}
