//! Ledger Domain - balances, reservations and bookkeeping reports
//!
//! This crate holds the money-moving core of the balance service:
//!
//! - **Ledger engine**: top-up, withdraw, transfer, reserve, settle and
//!   release, each an all-or-nothing unit that conserves money
//! - **Reservations**: the Open → Settled | Released state machine
//! - **Audit log**: append-only per-user history written with every change
//! - **Reports**: per-service revenue for a window, exported as a
//!   content-addressed CSV artifact
//!
//! # Conservation
//!
//! For every reachable state:
//!
//! ```text
//! Σ (main + reserved) = Σ top-ups − Σ withdrawals − Σ settled revenue
//! ```
//!
//! and no `main` or `reserved` balance is ever negative.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Arc::new(InMemoryLedgerStore::new());
//! let engine = LedgerEngine::new(store, LedgerConfig::default());
//! let meta = OperationMetadata::default();
//!
//! engine.register_user(alice).await?;
//! engine.top_up(alice, Amount::new(dec!(100))?, &meta).await?;
//! engine.reserve(ReservationKey::new(alice, service, order), Amount::new(dec!(20))?, &meta).await?;
//! ```

pub mod account;
pub mod adapters;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod ports;
pub mod reaper;
pub mod report;
pub mod reservation;
pub mod revenue;

pub use account::AccountBalance;
pub use audit::{AuditEntry, AuditQuery, NewAuditEntry, SortDirection, SortKey};
pub use config::LedgerConfig;
pub use engine::{LedgerEngine, SettlementReceipt, TransferReceipt};
pub use error::{ErrorKind, LedgerError};
pub use locks::AccountLocks;
pub use ports::{ArtifactStore, LedgerStore, LedgerUnit, ReportRegistry};
pub use reaper::ReservationReaper;
pub use report::{render_csv, ContentHash, ReportArtifact, ReportGenerator, ReportRetention};
pub use reservation::{Release, Reservation, ReservationKey, Settlement};
pub use revenue::{RevenueEntry, ServiceRevenue};
