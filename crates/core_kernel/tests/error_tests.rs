//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::MoneyError;
use core_kernel::temporal::TemporalError;
use core_kernel::UserId;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_invalid_state() {
    let error = CoreError::invalid_state("reservation already settled");

    match error {
        CoreError::InvalidStateTransition(msg) => assert!(msg.contains("already settled")),
        _ => panic!("Expected InvalidStateTransition error"),
    }
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("user 7");

    match error {
        CoreError::NotFound(msg) => assert_eq!(msg, "user 7"),
        _ => panic!("Expected NotFound error"),
    }
}

#[test]
fn test_core_error_from_money_error() {
    let core_error: CoreError = MoneyError::Overflow.into();

    match core_error {
        CoreError::Money(MoneyError::Overflow) => {}
        _ => panic!("Expected Money error"),
    }
}

#[test]
fn test_core_error_from_temporal_error() {
    let core_error: CoreError = TemporalError::InvalidReportPeriod("2024-13".into()).into();
    assert!(core_error.to_string().contains("2024-13"));
}

#[test]
fn test_core_error_from_identifier_error() {
    let core_error: CoreError = UserId::new(0).unwrap_err().into();
    assert!(core_error.to_string().contains("user id"));
}
