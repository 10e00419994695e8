//! Tab ledger core for a bar/restaurant point of sale.
//!
//! Tracks a fixed set of physical tables, the people seated at each, their
//! order lines and payment state, and an append-only history of closed
//! tabs. Two independently-running stations exchange order data with no
//! network: a subset of a person's unpaid orders is serialized, deflated,
//! and rendered as a QR code on one device, then scanned and reconciled
//! into the other device's ledger.
//!
//! The crate is UI-free. Screens, modals, and the camera feed live in the
//! surrounding application, which drives the core through [`TabService`]
//! (or the pure functions in [`tables`], [`sync`], and [`import`] when it
//! manages persistence itself).

pub mod catalog;
pub mod codec;
pub mod compress;
pub mod currency;
pub mod import;
pub mod ledger;
pub mod service;
pub mod storage;
pub mod sync;
pub mod tables;

pub use import::{ImportError, ImportSummary, SnapshotOverview};
pub use ledger::{HistoryItem, Ledger, LedgerError, OrderItem, Person, Product, Table};
pub use service::{ScanOutcome, ServiceError, TabService};
pub use sync::{DecodeError, DecodedEnvelope};
pub use tables::CloseBillOutcome;

/// Number of physical table slots managed by one station.
pub const TOTAL_TABLES: u32 = 12;
