//! Adapters that live alongside the domain
//!
//! - `in_memory`: ledger store and report registry for tests and the
//!   `memory` storage mode
//! - `filesystem`: content-addressed report files

pub mod filesystem;
pub mod in_memory;

pub use filesystem::FilesystemArtifactStore;
pub use in_memory::{FaultPlan, FaultPoint, InMemoryLedgerStore, InMemoryReportRegistry};
