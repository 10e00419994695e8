//! Import reconciliation for scanned sync payloads.
//!
//! A person-orders payload is merged into the live ledger by business key:
//! the table is matched on its number, the person on their name (created on
//! the fly when missing). Imported lines are always appended as discrete
//! new lines — never merged into existing ones — so they stay traceable and
//! individually removable. Re-scanning the same code appends again; the
//! sender-side confirmation gate is the guard against double transfer, not
//! a dedup step here.

use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{PersonOrdersPayload, SnapshotPayload};
use crate::currency::round2;
use crate::ledger::{recompute_bill, Ledger, OrderItem, Person, Product};

/// Import failure. The ledger is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("no active table with number {table_number:?}")]
    NoMatchingTable { table_number: String },
}

/// What an import changed, for the confirmation toast.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub table_id: u32,
    pub person_id: u64,
    /// True when the person did not exist and was auto-provisioned.
    pub person_created: bool,
    pub lines_added: usize,
    pub amount_added: f64,
}

/// Read-only digest of a scanned whole-restaurant snapshot.
///
/// Snapshots are inspect-only: no merge algorithm into a live ledger is
/// defined, so the caller displays this digest instead of mutating state.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOverview {
    pub version: String,
    pub timestamp_ms: i64,
    pub table_count: usize,
    pub people_count: usize,
    pub total_billed: f64,
}

// ---------------------------------------------------------------------------
// Person-orders import
// ---------------------------------------------------------------------------

/// Merge a scanned person-orders payload into the ledger.
///
/// The target table must exist, be enabled, and carry the payload's table
/// number. The person is matched by exact name within that table; when no
/// match exists one is created with `placeholder_avatar` and an empty bill.
/// Every incoming line is appended with `imported_via_qr` forced on, the
/// bill is recomputed over all lines, and the person is reopened.
pub fn import_person_orders(
    ledger: &Ledger,
    payload: &PersonOrdersPayload,
    placeholder_avatar: &str,
) -> Result<(Ledger, ImportSummary), ImportError> {
    let table_id = ledger
        .tables
        .iter()
        .find(|t| t.enabled && t.number == payload.table.number)
        .map(|t| t.id)
        .ok_or_else(|| {
            warn!(
                table_number = %payload.table.number,
                "Import rejected: no active table with that number"
            );
            ImportError::NoMatchingTable {
                table_number: payload.table.number.clone(),
            }
        })?;

    let mut next = ledger.clone();

    let existing_person_id = next
        .table(table_id)
        .and_then(|t| {
            t.people
                .iter()
                .find(|p| p.name == payload.person.name)
                .map(|p| p.id)
        });

    let (person_id, person_created) = match existing_person_id {
        Some(id) => (id, false),
        None => {
            let id = next.allocate_id();
            if let Some(table) = next.table_mut(table_id) {
                table.people.push(Person {
                    id,
                    name: payload.person.name.clone(),
                    avatar: placeholder_avatar.to_string(),
                    bill: 0.0,
                    orders: Vec::new(),
                    paid: false,
                });
            }
            info!(
                table_id,
                person_id = id,
                name = %payload.person.name,
                "Auto-provisioned person for import"
            );
            (id, true)
        }
    };

    let mut amount_added = 0.0;
    let mut line_ids = Vec::with_capacity(payload.orders.len());
    for _ in &payload.orders {
        line_ids.push(next.allocate_id());
    }

    if let Some(table) = next.table_mut(table_id) {
        if let Some(person) = table.people.iter_mut().find(|p| p.id == person_id) {
            for (order, line_id) in payload.orders.iter().zip(line_ids) {
                let line = OrderItem {
                    id: line_id,
                    product: Product {
                        name: order.product.name.clone(),
                        price: order.product.price,
                    },
                    quantity: order.quantity,
                    imported_via_qr: true,
                };
                amount_added += line.line_total();
                person.orders.push(line);
            }
            recompute_bill(person);
            person.paid = false;
        }
    }

    let summary = ImportSummary {
        table_id,
        person_id,
        person_created,
        lines_added: payload.orders.len(),
        amount_added: round2(amount_added),
    };

    info!(
        table_id,
        person_id,
        person_created,
        lines = summary.lines_added,
        amount = summary.amount_added,
        "Person-orders payload imported"
    );
    Ok((next, summary))
}

// ---------------------------------------------------------------------------
// Snapshot inspection
// ---------------------------------------------------------------------------

/// Summarize a snapshot payload for display.
pub fn snapshot_overview(payload: &SnapshotPayload) -> SnapshotOverview {
    let people_count = payload.d.iter().map(|t| t.p.len()).sum();
    let total_billed = payload
        .d
        .iter()
        .flat_map(|t| &t.p)
        .map(|p| p.b)
        .sum::<f64>();

    SnapshotOverview {
        version: payload.v.clone(),
        timestamp_ms: payload.t,
        table_count: payload.d.len(),
        people_count,
        total_billed: round2(total_billed),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
