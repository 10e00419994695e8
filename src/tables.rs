//! Ledger mutation engine.
//!
//! Every operation is a pure function from `(&Ledger, args...)` to a new
//! `Ledger` value; the input is never left partially mutated and the caller
//! owns persistence. People and order lines are addressed by their local id;
//! the `*_at` adapters translate UI array positions into ids at the boundary.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::ledger::{
    recompute_bill, HistoryItem, Ledger, LedgerError, OrderItem, Person, Product, Table,
};

/// Outcome of `close_bill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBillOutcome {
    /// Every person was already paid; nothing changed. The caller should
    /// offer to archive the table.
    AllPaidOfferArchive,
    /// At least one person was unpaid; everyone is now marked paid.
    MarkedAllPaid,
}

// ---------------------------------------------------------------------------
// Table configuration
// ---------------------------------------------------------------------------

/// Enable a table slot as an active tab with the given name and number.
pub fn configure_table(
    ledger: &Ledger,
    table_id: u32,
    name: &str,
    number: &str,
) -> Result<Ledger, LedgerError> {
    if number.trim().is_empty() {
        return Err(LedgerError::EmptyTableNumber);
    }

    let mut next = ledger.clone();
    let table = next
        .table_mut(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    table.enabled = true;
    table.name = name.to_string();
    table.number = number.to_string();

    info!(table_id, number, "Table configured");
    Ok(next)
}

/// Rename an already-configured table without touching people or products.
pub fn edit_table(
    ledger: &Ledger,
    table_id: u32,
    name: &str,
    number: &str,
) -> Result<Ledger, LedgerError> {
    if number.trim().is_empty() {
        return Err(LedgerError::EmptyTableNumber);
    }

    let mut next = ledger.clone();
    let table = next
        .table_mut(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    table.name = name.to_string();
    table.number = number.to_string();
    Ok(next)
}

/// Restore a table slot to the disabled empty state, preserving only its id.
pub fn reset_table(ledger: &Ledger, table_id: u32) -> Result<Ledger, LedgerError> {
    let mut next = ledger.clone();
    let table = next
        .table_mut(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    *table = Table::empty(table_id);
    info!(table_id, "Table reset to empty slot");
    Ok(next)
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

/// Seat a new person at a table. Duplicate names are allowed; people are
/// distinguished by their id. Returns the new ledger and the person's id.
pub fn add_person(
    ledger: &Ledger,
    table_id: u32,
    name: &str,
    avatar: &str,
) -> Result<(Ledger, u64), LedgerError> {
    let mut next = ledger.clone();
    if next.table(table_id).is_none() {
        return Err(LedgerError::TableNotFound(table_id));
    }

    let person_id = next.allocate_id();
    let table = next
        .table_mut(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    table.people.push(Person {
        id: person_id,
        name: name.to_string(),
        avatar: avatar.to_string(),
        bill: 0.0,
        orders: Vec::new(),
        paid: false,
    });

    info!(table_id, person_id, name, "Person added to table");
    Ok((next, person_id))
}

/// Toggle a single person's paid flag. Does not touch orders or bill.
pub fn set_person_paid(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    is_paid: bool,
) -> Result<Ledger, LedgerError> {
    let mut next = ledger.clone();
    let person = person_mut(&mut next, table_id, person_id)?;
    person.paid = is_paid;
    debug!(table_id, person_id, is_paid, "Payment flag updated");
    Ok(next)
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Assign one unit of a product to a person.
///
/// If the person already has a line for `product.name` its quantity is
/// incremented and the bill grows by that line's snapshot price; otherwise a
/// new line is appended at the current catalog price. Either way the person
/// is reopened (`paid = false`).
pub fn assign_product_to_person(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    product: &Product,
) -> Result<Ledger, LedgerError> {
    let mut next = ledger.clone();
    let line_id = next.allocate_id();
    let person = person_mut(&mut next, table_id, person_id)?;

    match person
        .orders
        .iter_mut()
        .find(|o| o.product.name == product.name)
    {
        Some(line) => {
            line.quantity += 1;
            person.bill += line.product.price;
        }
        None => {
            person.orders.push(OrderItem {
                id: line_id,
                product: product.clone(),
                quantity: 1,
                imported_via_qr: false,
            });
            person.bill += product.price;
        }
    }
    person.paid = false;

    debug!(
        table_id,
        person_id,
        product = %product.name,
        bill = person.bill,
        "Product assigned"
    );
    Ok(next)
}

/// Remove the order lines with the given ids from a person's bill, fully
/// recomputing the bill from the remaining lines and reopening the person.
pub fn remove_order_lines(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    line_ids: &[u64],
) -> Result<Ledger, LedgerError> {
    if line_ids.is_empty() {
        return Err(LedgerError::EmptySelection);
    }

    let mut next = ledger.clone();
    let person = person_mut(&mut next, table_id, person_id)?;
    for line_id in line_ids {
        if person.order_by_id(*line_id).is_none() {
            return Err(LedgerError::OrderLineNotFound(*line_id));
        }
    }

    person.orders.retain(|o| !line_ids.contains(&o.id));
    recompute_bill(person);
    person.paid = false;

    info!(
        table_id,
        person_id,
        removed = line_ids.len(),
        bill = person.bill,
        "Order lines removed"
    );
    Ok(next)
}

/// Remove a single order line.
pub fn remove_order_line(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    line_id: u64,
) -> Result<Ledger, LedgerError> {
    remove_order_lines(ledger, table_id, person_id, &[line_id])
}

// ---------------------------------------------------------------------------
// Bill closing and archiving
// ---------------------------------------------------------------------------

/// Close out a table's bill. When everyone already paid this is a signal to
/// offer archiving and the ledger comes back unchanged; otherwise every
/// person is marked paid.
pub fn close_bill(
    ledger: &Ledger,
    table_id: u32,
) -> Result<(Ledger, CloseBillOutcome), LedgerError> {
    let table = ledger
        .table(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;

    if table.is_fully_paid() {
        return Ok((ledger.clone(), CloseBillOutcome::AllPaidOfferArchive));
    }

    let mut next = ledger.clone();
    let table = next
        .table_mut(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    for person in &mut table.people {
        person.paid = true;
    }
    info!(table_id, "All people marked as paid");
    Ok((next, CloseBillOutcome::MarkedAllPaid))
}

/// Archive a fully-paid table: produce a deep snapshot for the history log
/// and reset the slot. Fails without mutating anything when someone still
/// owes — callers should check `Table::is_fully_paid` first.
pub fn archive_table(
    ledger: &Ledger,
    table_id: u32,
) -> Result<(Ledger, HistoryItem), LedgerError> {
    let table = ledger
        .table(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    if !table.is_fully_paid() {
        return Err(LedgerError::TableNotFullyPaid(table_id));
    }

    let now_ms = Utc::now().timestamp_millis();
    let item = HistoryItem {
        id: format!("{}_{}", table.id, now_ms),
        date: now_ms,
        table_id: table.id,
        table_number: table.number.clone(),
        table_name: table.name.clone(),
        people: table.people.clone(),
        table_products: table.products.clone(),
    };

    let next = reset_table(ledger, table_id)?;
    info!(
        table_id,
        history_id = %item.id,
        people = item.people.len(),
        "Table archived to history"
    );
    Ok((next, item))
}

// ---------------------------------------------------------------------------
// Index-based adapters (UI boundary)
// ---------------------------------------------------------------------------

/// Resolve a person's id from their array position at a table.
pub fn person_id_at(ledger: &Ledger, table_id: u32, person_index: usize) -> Option<u64> {
    ledger
        .table(table_id)
        .and_then(|t| t.people.get(person_index))
        .map(|p| p.id)
}

/// Resolve order-line ids from positions within a person's order list. All
/// indices refer to the list as it is right now (pre-removal).
pub fn order_ids_at(
    ledger: &Ledger,
    table_id: u32,
    person_index: usize,
    order_indices: &BTreeSet<usize>,
) -> Option<Vec<u64>> {
    let person = ledger.table(table_id)?.people.get(person_index)?;
    order_indices
        .iter()
        .map(|i| person.orders.get(*i).map(|o| o.id))
        .collect()
}

/// Position-addressed variant of `assign_product_to_person`.
pub fn assign_product_to_person_at(
    ledger: &Ledger,
    table_id: u32,
    person_index: usize,
    product: &Product,
) -> Result<Ledger, LedgerError> {
    let person_id = person_id_at(ledger, table_id, person_index)
        .ok_or(LedgerError::PersonNotFound(person_index as u64))?;
    assign_product_to_person(ledger, table_id, person_id, product)
}

/// Position-addressed variant of `remove_order_lines`. The indices are
/// resolved against the pre-removal list in one step, so index shift cannot
/// remove the wrong lines.
pub fn remove_order_lines_at(
    ledger: &Ledger,
    table_id: u32,
    person_index: usize,
    order_indices: &BTreeSet<usize>,
) -> Result<Ledger, LedgerError> {
    let person_id = person_id_at(ledger, table_id, person_index)
        .ok_or(LedgerError::PersonNotFound(person_index as u64))?;
    let line_ids = order_ids_at(ledger, table_id, person_index, order_indices)
        .ok_or(LedgerError::EmptySelection)?;
    remove_order_lines(ledger, table_id, person_id, &line_ids)
}

/// Position-addressed variant of `set_person_paid`.
pub fn set_person_paid_at(
    ledger: &Ledger,
    table_id: u32,
    person_index: usize,
    is_paid: bool,
) -> Result<Ledger, LedgerError> {
    let person_id = person_id_at(ledger, table_id, person_index)
        .ok_or(LedgerError::PersonNotFound(person_index as u64))?;
    set_person_paid(ledger, table_id, person_id, is_paid)
}

fn person_mut<'a>(
    ledger: &'a mut Ledger,
    table_id: u32,
    person_id: u64,
) -> Result<&'a mut Person, LedgerError> {
    let table = ledger
        .table_mut(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    table
        .people
        .iter_mut()
        .find(|p| p.id == person_id)
        .ok_or(LedgerError::PersonNotFound(person_id))
}

// ===========================================================================
// Tests
// ===========================================================================
