//! QR sync envelopes and the sender-side confirmation gate.
//!
//! Transfer between two stations is visual: an envelope string rendered as a
//! QR code on one device and scanned on the other. The envelope is a marker
//! prefix (`SYNC:` for a single person's selected orders, `COMPRESSED:` for
//! a whole-restaurant snapshot) followed by the base64 deflate payload.
//!
//! Generating a QR never mutates the sender's ledger. The transferred lines
//! leave the sender only through `confirm_transfer_and_remove`, invoked
//! after the operator separately confirms the receiver really scanned the
//! code — a failed scan must never cost data.

use std::collections::BTreeSet;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{
    serialize_all_tables, serialize_person_orders, PersonOrdersPayload, SnapshotPayload,
};
use crate::compress::{compress_text, compression_stats, decompress_text, CompressionStats};
use crate::ledger::{Ledger, LedgerError};
use crate::tables;

/// Marker prefix for person-orders transfers.
pub const SYNC_PREFIX: &str = "SYNC:";
/// Marker prefix for whole-restaurant snapshots.
pub const COMPRESSED_PREFIX: &str = "COMPRESSED:";

/// QR codes beyond this many characters scan unreliably; the encoder flags
/// them but never refuses to produce one.
pub const QR_SIZE_WARNING_THRESHOLD: usize = 4000;

/// A decoded envelope, dispatched on the marker prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEnvelope {
    PersonOrders(PersonOrdersPayload),
    Snapshot(SnapshotPayload),
}

/// Why a scanned string could not be decoded. Both cases are recoverable:
/// the operator is shown the raw data and may rescan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("not a recognized sync QR code")]
    UnrecognizedFormat { raw: String },
    #[error("sync payload is corrupt: {cause}")]
    CorruptPayload { raw: String, cause: String },
}

/// Result of encoding a snapshot, including the size advisory.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEncoding {
    pub envelope: String,
    pub table_count: usize,
    pub stats: CompressionStats,
    /// True when the envelope exceeds `QR_SIZE_WARNING_THRESHOLD`.
    pub oversized: bool,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode the selected order lines of one person as a `SYNC:` envelope.
///
/// Pure with respect to the ledger: nothing is removed here. The person must
/// still owe (a paid person has nothing left to transfer) and the selection
/// must be non-empty; indices refer to the person's current order list.
pub fn generate_order_qr(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    order_indices: &[usize],
) -> Result<String, LedgerError> {
    let table = ledger
        .table(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?;
    let person = table
        .person_by_id(person_id)
        .ok_or(LedgerError::PersonNotFound(person_id))?;
    if person.paid {
        return Err(LedgerError::PersonAlreadyPaid);
    }

    let payload = serialize_person_orders(table, person, order_indices)?;
    let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    let envelope = format!("{SYNC_PREFIX}{}", compress_text(&json));

    info!(
        table_id,
        person_id,
        lines = order_indices.len(),
        size = envelope.len(),
        "Person-orders QR generated"
    );
    Ok(envelope)
}

/// Subtotal of the selected order lines, for the confirmation prompt.
pub fn selection_total(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    order_indices: &[usize],
) -> Result<f64, LedgerError> {
    let person = ledger
        .table(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?
        .person_by_id(person_id)
        .ok_or(LedgerError::PersonNotFound(person_id))?;

    let mut total = 0.0;
    for &index in order_indices {
        let line = person
            .orders
            .get(index)
            .ok_or(LedgerError::OrderLineNotFound(index as u64))?;
        total += line.line_total();
    }
    Ok(total)
}

/// Encode every enabled table as a `COMPRESSED:` snapshot envelope.
pub fn encode_snapshot(ledger: &Ledger) -> SnapshotEncoding {
    let payload = serialize_all_tables(&ledger.tables, Utc::now().timestamp_millis());
    let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    let stats = compression_stats(&json);
    let envelope = format!("{COMPRESSED_PREFIX}{}", compress_text(&json));
    let oversized = envelope.len() > QR_SIZE_WARNING_THRESHOLD;

    if oversized {
        warn!(
            size = envelope.len(),
            threshold = QR_SIZE_WARNING_THRESHOLD,
            "Snapshot QR exceeds the reliable scan size"
        );
    }

    SnapshotEncoding {
        envelope,
        table_count: payload.d.len(),
        stats,
        oversized,
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a scanned string into a typed payload.
pub fn decode_envelope(raw: &str) -> Result<DecodedEnvelope, DecodeError> {
    if let Some(body) = raw.strip_prefix(SYNC_PREFIX) {
        let json = decompress_text(body).map_err(|cause| corrupt(raw, cause))?;
        let payload: PersonOrdersPayload =
            serde_json::from_str(&json).map_err(|e| corrupt(raw, format!("parse: {e}")))?;
        return Ok(DecodedEnvelope::PersonOrders(payload));
    }

    if let Some(body) = raw.strip_prefix(COMPRESSED_PREFIX) {
        let json = decompress_text(body).map_err(|cause| corrupt(raw, cause))?;
        let payload: SnapshotPayload =
            serde_json::from_str(&json).map_err(|e| corrupt(raw, format!("parse: {e}")))?;
        return Ok(DecodedEnvelope::Snapshot(payload));
    }

    let preview: String = raw.chars().take(10).collect();
    warn!(
        prefix = %preview,
        length = raw.len(),
        "Scanned data is not a sync QR code"
    );
    Err(DecodeError::UnrecognizedFormat {
        raw: raw.to_string(),
    })
}

fn corrupt(raw: &str, cause: String) -> DecodeError {
    warn!(error = %cause, "Sync payload failed to decode");
    DecodeError::CorruptPayload {
        raw: raw.to_string(),
        cause,
    }
}

// ---------------------------------------------------------------------------
// Sender-side confirmation gate
// ---------------------------------------------------------------------------

/// Remove the transferred lines from the sender's ledger.
///
/// This is the second phase of the transfer: it must only run after the
/// operator explicitly confirmed the receiving device scanned the code.
/// Indices refer to the person's pre-removal order list, exactly as they
/// were passed to `generate_order_qr`.
pub fn confirm_transfer_and_remove(
    ledger: &Ledger,
    table_id: u32,
    person_id: u64,
    order_indices: &[usize],
) -> Result<Ledger, LedgerError> {
    let person = ledger
        .table(table_id)
        .ok_or(LedgerError::TableNotFound(table_id))?
        .person_by_id(person_id)
        .ok_or(LedgerError::PersonNotFound(person_id))?;

    let indices: BTreeSet<usize> = order_indices.iter().copied().collect();
    let line_ids: Vec<u64> = indices
        .iter()
        .map(|i| {
            person
                .orders
                .get(*i)
                .map(|o| o.id)
                .ok_or(LedgerError::OrderLineNotFound(*i as u64))
        })
        .collect::<Result<_, _>>()?;

    let next = tables::remove_order_lines(ledger, table_id, person_id, &line_ids)?;
    info!(
        table_id,
        person_id,
        removed = line_ids.len(),
        "Transfer confirmed, lines removed from sender"
    );
    Ok(next)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Product;
    use crate::tables::{add_person, assign_product_to_person, configure_table, set_person_paid};

    fn beer() -> Product {
        Product {
            name: "Cerveja".into(),
            price: 5.0,
        }
    }

    fn ledger_with_ana() -> (Ledger, u64) {
        let ledger = Ledger::new(12);
        let ledger = configure_table(&ledger, 7, "Varanda", "7").unwrap();
        let (ledger, ana) = add_person(&ledger, 7, "Ana", "avatar://1").unwrap();
        let ledger = assign_product_to_person(&ledger, 7, ana, &beer()).unwrap();
        let ledger = assign_product_to_person(&ledger, 7, ana, &beer()).unwrap();
        (ledger, ana)
    }

    #[test]
    fn test_generate_order_qr_does_not_mutate_ledger() {
        let (ledger, ana) = ledger_with_ana();
        let before = ledger.clone();
        let envelope = generate_order_qr(&ledger, 7, ana, &[0]).unwrap();
        assert!(envelope.starts_with(SYNC_PREFIX));
        assert_eq!(ledger, before, "QR generation must be side-effect free");
    }

    #[test]
    fn test_envelope_round_trip() {
        let (ledger, ana) = ledger_with_ana();
        let envelope = generate_order_qr(&ledger, 7, ana, &[0]).unwrap();

        match decode_envelope(&envelope).unwrap() {
            DecodedEnvelope::PersonOrders(payload) => {
                assert_eq!(payload.kind, "PERSON_ORDERS");
                assert_eq!(payload.table.number, "7");
                assert_eq!(payload.person.name, "Ana");
                assert_eq!(payload.orders.len(), 1);
                assert_eq!(payload.orders[0].product.name, "Cerveja");
                assert_eq!(payload.orders[0].quantity, 2);
            }
            other => panic!("expected person-orders payload, got {other:?}"),
        }
    }

    #[test]
    fn test_generate_order_qr_rejects_paid_person() {
        let (ledger, ana) = ledger_with_ana();
        let ledger = set_person_paid(&ledger, 7, ana, true).unwrap();
        assert_eq!(
            generate_order_qr(&ledger, 7, ana, &[0]).unwrap_err(),
            LedgerError::PersonAlreadyPaid
        );
    }

    #[test]
    fn test_generate_order_qr_rejects_empty_selection() {
        let (ledger, ana) = ledger_with_ana();
        assert_eq!(
            generate_order_qr(&ledger, 7, ana, &[]).unwrap_err(),
            LedgerError::EmptySelection
        );
    }

    #[test]
    fn test_selection_total() {
        let (ledger, ana) = ledger_with_ana();
        let total = selection_total(&ledger, 7, ana, &[0]).unwrap();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn test_snapshot_envelope_round_trip() {
        let (ledger, _) = ledger_with_ana();
        let encoding = encode_snapshot(&ledger);
        assert!(encoding.envelope.starts_with(COMPRESSED_PREFIX));
        assert_eq!(encoding.table_count, 1);
        assert!(!encoding.oversized);

        match decode_envelope(&encoding.envelope).unwrap() {
            DecodedEnvelope::Snapshot(payload) => {
                assert_eq!(payload.v, "1.0");
                assert_eq!(payload.d.len(), 1);
                assert_eq!(payload.d[0].n, "7");
                assert_eq!(payload.d[0].p[0].b, 10.0);
            }
            other => panic!("expected snapshot payload, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unrecognized_prefix() {
        let err = decode_envelope("https://example.com/menu").unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn test_decode_corrupt_payload() {
        // Valid prefix, body is not a valid payload.
        let err = decode_envelope("SYNC:!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, DecodeError::CorruptPayload { .. }));

        // Well-formed compression of JSON that is not the expected shape.
        let envelope = format!("{SYNC_PREFIX}{}", compress_text(r#"{"foo": 1}"#));
        let err = decode_envelope(&envelope).unwrap_err();
        assert!(matches!(err, DecodeError::CorruptPayload { .. }));
    }

    #[test]
    fn test_confirm_transfer_removes_selected_lines() {
        let (ledger, ana) = ledger_with_ana();
        let wine = Product {
            name: "Vinho".into(),
            price: 8.0,
        };
        let ledger = assign_product_to_person(&ledger, 7, ana, &wine).unwrap();

        // Transfer the beer line (index 0), keep the wine.
        let ledger = confirm_transfer_and_remove(&ledger, 7, ana, &[0]).unwrap();
        let person = ledger.table(7).unwrap().person_by_id(ana).unwrap();
        assert_eq!(person.orders.len(), 1);
        assert_eq!(person.orders[0].product.name, "Vinho");
        assert_eq!(person.bill, 8.0);
        assert!(!person.paid);
    }
}
