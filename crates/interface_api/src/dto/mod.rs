//! Request and response bodies

pub mod reports;
pub mod users;
