//! Application service layer.
//!
//! `TabService` owns the storage handle plus the in-memory ledger and
//! catalog, and is the single-writer boundary the UI talks to. Each call
//! applies a pure mutation, persists the result, and only then swaps the
//! in-memory state — a failed mutation or a failed write leaves the
//! previous state in place.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::catalog;
use crate::import::{self, ImportError, ImportSummary, SnapshotOverview};
use crate::ledger::{HistoryItem, Ledger, LedgerError, Product};
use crate::storage::{self, StorageState};
use crate::sync::{self, DecodeError, DecodedEnvelope, SnapshotEncoding};
use crate::tables::{self, CloseBillOutcome};
use crate::TOTAL_TABLES;

/// Failure at the service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("storage: {0}")]
    Storage(String),
}

/// What a scan produced: either a mutation of the live ledger or a
/// read-only snapshot digest to display.
#[derive(Debug, PartialEq)]
pub enum ScanOutcome {
    Imported(ImportSummary),
    SnapshotInspected(SnapshotOverview),
}

pub struct TabService {
    storage: StorageState,
    ledger: Ledger,
    products: Vec<Product>,
}

impl TabService {
    /// Open the store under `data_dir` and load the saved state, seeding a
    /// fresh ledger and the default catalog on first run.
    pub fn open(data_dir: &Path) -> Result<Self, ServiceError> {
        let storage = storage::init(data_dir).map_err(ServiceError::Storage)?;
        Self::with_storage(storage)
    }

    /// Service backed by an in-memory store.
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        let storage = storage::open_in_memory().map_err(ServiceError::Storage)?;
        Self::with_storage(storage)
    }

    fn with_storage(storage: StorageState) -> Result<Self, ServiceError> {
        let ledger = match storage::load_tables(&storage).map_err(ServiceError::Storage)? {
            Some(saved) => Ledger::from_tables(saved),
            None => Ledger::new(TOTAL_TABLES),
        };
        let products = match storage::load_products(&storage).map_err(ServiceError::Storage)? {
            Some(saved) => saved,
            None => catalog::default_products(),
        };

        info!(
            tables = ledger.tables.len(),
            products = products.len(),
            "Tab service ready"
        );
        Ok(TabService {
            storage,
            ledger,
            products,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn history(&self) -> Result<Vec<HistoryItem>, ServiceError> {
        storage::load_history(&self.storage).map_err(ServiceError::Storage)
    }

    /// Placeholder avatar for auto-provisioned people. Deterministic per
    /// call instant; the UI may swap it for a camera capture later.
    pub fn random_avatar() -> String {
        let img = (Utc::now().timestamp_millis() % 70) + 1;
        format!("https://i.pravatar.cc/100?img={img}")
    }

    // -----------------------------------------------------------------------
    // Ledger mutations
    // -----------------------------------------------------------------------

    fn commit(&mut self, next: Ledger) -> Result<(), ServiceError> {
        storage::save_tables(&self.storage, &next.tables).map_err(ServiceError::Storage)?;
        self.ledger = next;
        Ok(())
    }

    pub fn configure_table(
        &mut self,
        table_id: u32,
        name: &str,
        number: &str,
    ) -> Result<(), ServiceError> {
        let next = tables::configure_table(&self.ledger, table_id, name, number)?;
        self.commit(next)
    }

    pub fn edit_table(
        &mut self,
        table_id: u32,
        name: &str,
        number: &str,
    ) -> Result<(), ServiceError> {
        let next = tables::edit_table(&self.ledger, table_id, name, number)?;
        self.commit(next)
    }

    pub fn add_person(
        &mut self,
        table_id: u32,
        name: &str,
        avatar: &str,
    ) -> Result<u64, ServiceError> {
        let (next, person_id) = tables::add_person(&self.ledger, table_id, name, avatar)?;
        self.commit(next)?;
        Ok(person_id)
    }

    pub fn assign_product(
        &mut self,
        table_id: u32,
        person_id: u64,
        product: &Product,
    ) -> Result<(), ServiceError> {
        let next = tables::assign_product_to_person(&self.ledger, table_id, person_id, product)?;
        self.commit(next)
    }

    pub fn remove_order_lines(
        &mut self,
        table_id: u32,
        person_index: usize,
        order_indices: &BTreeSet<usize>,
    ) -> Result<(), ServiceError> {
        let next =
            tables::remove_order_lines_at(&self.ledger, table_id, person_index, order_indices)?;
        self.commit(next)
    }

    pub fn set_person_paid(
        &mut self,
        table_id: u32,
        person_id: u64,
        is_paid: bool,
    ) -> Result<(), ServiceError> {
        let next = tables::set_person_paid(&self.ledger, table_id, person_id, is_paid)?;
        self.commit(next)
    }

    pub fn close_bill(&mut self, table_id: u32) -> Result<CloseBillOutcome, ServiceError> {
        let (next, outcome) = tables::close_bill(&self.ledger, table_id)?;
        if outcome == CloseBillOutcome::MarkedAllPaid {
            self.commit(next)?;
        }
        Ok(outcome)
    }

    pub fn reset_table(&mut self, table_id: u32) -> Result<(), ServiceError> {
        let next = tables::reset_table(&self.ledger, table_id)?;
        self.commit(next)
    }

    /// Archive a fully-paid table: the history entry is written first, then
    /// the reset table set; the in-memory ledger swaps only after both.
    pub fn archive_table(&mut self, table_id: u32) -> Result<HistoryItem, ServiceError> {
        let (next, item) = tables::archive_table(&self.ledger, table_id)?;
        storage::append_history(&self.storage, &item).map_err(ServiceError::Storage)?;
        self.commit(next)?;
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    fn commit_products(&mut self, next: Vec<Product>) -> Result<(), ServiceError> {
        storage::save_products(&self.storage, &next).map_err(ServiceError::Storage)?;
        self.products = next;
        Ok(())
    }

    pub fn add_product(&mut self, product: Product) -> Result<(), ServiceError> {
        let next = catalog::add_product(&self.products, product)?;
        self.commit_products(next)
    }

    pub fn update_product_price(&mut self, name: &str, price: f64) -> Result<(), ServiceError> {
        let next = catalog::update_product_price(&self.products, name, price)?;
        self.commit_products(next)
    }

    pub fn remove_product(&mut self, name: &str) -> Result<(), ServiceError> {
        let next = catalog::remove_product(&self.products, name)?;
        self.commit_products(next)
    }

    // -----------------------------------------------------------------------
    // QR sync
    // -----------------------------------------------------------------------

    /// First phase of a transfer: encode the selection. Read-only.
    pub fn generate_order_qr(
        &self,
        table_id: u32,
        person_id: u64,
        order_indices: &[usize],
    ) -> Result<String, ServiceError> {
        Ok(sync::generate_order_qr(
            &self.ledger,
            table_id,
            person_id,
            order_indices,
        )?)
    }

    /// Second phase of a transfer, after the operator confirmed the scan.
    pub fn confirm_transfer(
        &mut self,
        table_id: u32,
        person_id: u64,
        order_indices: &[usize],
    ) -> Result<(), ServiceError> {
        let next =
            sync::confirm_transfer_and_remove(&self.ledger, table_id, person_id, order_indices)?;
        self.commit(next)
    }

    /// Encode the whole restaurant as a snapshot QR. Read-only.
    pub fn encode_snapshot(&self) -> SnapshotEncoding {
        sync::encode_snapshot(&self.ledger)
    }

    /// Handle a scanned QR string end to end: person-orders payloads are
    /// imported into the ledger, snapshots come back as a read-only digest.
    pub fn import_scanned(&mut self, raw: &str) -> Result<ScanOutcome, ServiceError> {
        match sync::decode_envelope(raw)? {
            DecodedEnvelope::PersonOrders(payload) => {
                let (next, summary) =
                    import::import_person_orders(&self.ledger, &payload, &Self::random_avatar())?;
                self.commit(next)?;
                Ok(ScanOutcome::Imported(summary))
            }
            DecodedEnvelope::Snapshot(payload) => Ok(ScanOutcome::SnapshotInspected(
                import::snapshot_overview(&payload),
            )),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
