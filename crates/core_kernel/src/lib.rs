//! Core Kernel - Foundational types shared by every layer of the balance service
//!
//! - Money value objects with exact two-digit decimal arithmetic
//! - Typed identifiers for users, services and orders
//! - Reporting periods, windows and clocks
//! - The port error taxonomy used by all adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Amount, Balance, MoneyError, MAX_MONEY, MONEY_SCALE};
pub use temporal::{Clock, ManualClock, ReportPeriod, ReportWindow, SystemClock, TemporalError, Timezone};
pub use identifiers::{IdentifierError, OrderId, ServiceId, UserId};
pub use error::CoreError;
pub use ports::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, OperationMetadata, PortError,
};
