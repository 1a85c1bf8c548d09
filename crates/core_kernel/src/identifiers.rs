//! Strongly-typed identifiers for domain entities
//!
//! Users, services and orders are all identified by positive integers
//! assigned outside this system. Newtype wrappers keep them from being
//! mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an identifier is zero or not a number
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind}: {reason}")]
pub struct IdentifierError {
    pub kind: &'static str,
    pub reason: String,
}

macro_rules! define_id {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u32", into = "u32")]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Creates an identifier, rejecting zero
            pub fn new(value: u32) -> Result<Self, IdentifierError> {
                NonZeroU32::new(value).map(Self).ok_or(IdentifierError {
                    kind: $kind,
                    reason: "must be a positive integer".to_string(),
                })
            }

            /// Returns the raw value
            pub fn get(&self) -> u32 {
                self.0.get()
            }

            /// Returns the value widened for BIGINT columns
            pub fn as_i64(&self) -> i64 {
                i64::from(self.0.get())
            }

            /// Returns the identifier kind used in messages
            pub fn kind() -> &'static str {
                $kind
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse::<u32>().map_err(|e| IdentifierError {
                    kind: $kind,
                    reason: e.to_string(),
                })?;
                Self::new(value)
            }
        }

        impl TryFrom<u32> for $name {
            type Error = IdentifierError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = IdentifierError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                let value = u32::try_from(value).map_err(|_| IdentifierError {
                    kind: $kind,
                    reason: format!("{} is out of range", value),
                })?;
                Self::new(value)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0.get()
            }
        }
    };
}

define_id!(UserId, "user id");
define_id!(ServiceId, "service id");
define_id!(OrderId, "order id");
