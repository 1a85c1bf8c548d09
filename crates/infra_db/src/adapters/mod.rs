//! Domain Adapters
//!
//! PostgreSQL implementations of the ledger ports.
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresLedgerStore, PostgresReportRegistry};
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool.clone()));
//! let registry = Arc::new(PostgresReportRegistry::new(pool));
//! ```

pub mod ledger;
pub mod reports;
mod rows;

pub use ledger::PostgresLedgerStore;
pub use reports::PostgresReportRegistry;
