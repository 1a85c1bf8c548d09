//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the balance service using SQLx.
//!
//! # Architecture
//!
//! The domain talks to storage through the `LedgerStore` and
//! `ReportRegistry` ports; this crate provides their production adapters,
//! plus pool construction and the embedded schema migrations.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/balance", 10)).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;

pub use adapters::{PostgresLedgerStore, PostgresReportRegistry};
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
