//! Unit tests for the Money module
//!
//! Tests cover amount validation, balance arithmetic, serialization
//! and edge cases at the two-digit boundary.

use core_kernel::{Amount, Balance, MoneyError, MAX_MONEY};
use rust_decimal_macros::dec;

mod amount_creation {
    use super::*;

    #[test]
    fn test_new_rescales_to_two_places() {
        let a = Amount::new(dec!(40)).unwrap();
        assert_eq!(a.value(), dec!(40.00));
        assert_eq!(a.to_string(), "40.00");
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        let a = Amount::new(dec!(12.500000)).unwrap();
        assert_eq!(a.value(), dec!(12.50));
    }

    #[test]
    fn test_third_decimal_rejected() {
        let err = Amount::new(dec!(12.345)).unwrap_err();
        assert!(matches!(err, MoneyError::InvalidAmount(_)));
    }

    #[test]
    fn test_smallest_amount() {
        let a = Amount::from_minor(1).unwrap();
        assert_eq!(a.value(), dec!(0.01));
    }

    #[test]
    fn test_zero_and_negative_rejected() {
        assert!(Amount::from_minor(0).is_err());
        assert!(Amount::from_minor(-100).is_err());
    }

    #[test]
    fn test_amounts_are_ordered() {
        let small = Amount::new(dec!(10)).unwrap();
        let large = Amount::new(dec!(20)).unwrap();
        assert!(small < large);
    }
}

mod balance_arithmetic {
    use super::*;

    #[test]
    fn test_zero_balance() {
        assert!(Balance::ZERO.is_zero());
        assert_eq!(Balance::default(), Balance::ZERO);
    }

    #[test]
    fn test_credit_adds() {
        let b = Balance::ZERO.credit(Amount::new(dec!(100)).unwrap()).unwrap();
        assert_eq!(b.value(), dec!(100.00));
    }

    #[test]
    fn test_debit_exact_balance_leaves_zero() {
        let b = Balance::new(dec!(30)).unwrap();
        let after = b.debit(Amount::new(dec!(30)).unwrap()).unwrap();
        assert!(after.is_zero());
    }

    #[test]
    fn test_debit_past_zero_fails_with_context() {
        let b = Balance::new(dec!(5)).unwrap();
        match b.debit(Amount::new(dec!(7.5)).unwrap()) {
            Err(MoneyError::InsufficientFunds { balance, requested }) => {
                assert_eq!(balance, dec!(5.00));
                assert_eq!(requested, dec!(7.50));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_signed_delta() {
        let b = Balance::new(dec!(10)).unwrap();
        assert_eq!(b.apply(dec!(-2.5)).unwrap().value(), dec!(7.50));
        assert_eq!(b.apply(dec!(2.5)).unwrap().value(), dec!(12.50));
        assert!(b.apply(dec!(-10.01)).is_err());
    }
}

mod storage_range {
    use super::*;

    #[test]
    fn test_max_money_fits_twenty_digits() {
        assert_eq!(MAX_MONEY.to_string(), "999999999999999999.99");
        assert!(Amount::new(MAX_MONEY).is_ok());
        assert!(Balance::new(MAX_MONEY).is_ok());
    }

    #[test]
    fn test_amount_past_max_rejected() {
        let err = Amount::new(dec!(1000000000000000000)).unwrap_err();
        assert!(matches!(err, MoneyError::InvalidAmount(_)));
    }

    #[test]
    fn test_credit_past_max_overflows() {
        let full = Balance::new(MAX_MONEY).unwrap();
        let cent = Amount::new(dec!(0.01)).unwrap();
        assert_eq!(full.credit(cent), Err(MoneyError::Overflow));
        assert!(full.debit(cent).is_ok());
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_amount_deserializes_from_string() {
        let a: Amount = serde_json::from_str("\"15.25\"").unwrap();
        assert_eq!(a.value(), dec!(15.25));
    }

    #[test]
    fn test_amount_deserialization_validates() {
        assert!(serde_json::from_str::<Amount>("\"-1\"").is_err());
        assert!(serde_json::from_str::<Amount>("\"0.001\"").is_err());
    }

    #[test]
    fn test_balance_deserialization_rejects_negative() {
        assert!(serde_json::from_str::<Balance>("\"-3\"").is_err());
        assert!(serde_json::from_str::<Balance>("\"3\"").is_ok());
    }
}
