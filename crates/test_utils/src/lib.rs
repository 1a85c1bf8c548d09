//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! balance service test suite.
//!
//! # Modules
//!
//! - `fixtures`: Identifiers, amounts and instants used across tests
//! - `builders`: A ledger harness wired to the in-memory store
//! - `database`: PostgreSQL test containers with the schema applied
//! - `assertions`: Balance, conservation and error-kind assertions
//! - `generators`: Property-based ledger operation sequences

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
