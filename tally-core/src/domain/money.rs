//! Monetary amount rules
//!
//! Amounts are `rust_decimal::Decimal` values with at most two fractional
//! digits (minor currency units). The store column is `DECIMAL(18, 2)`.

use rust_decimal::Decimal;

use super::result::{Error, Result};

/// Number of fractional digits carried by every stored amount
pub const MONEY_SCALE: u32 = 2;

/// Largest value a `DECIMAL(18, 2)` column holds: 9_999_999_999_999_999.99
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999_999, MONEY_SCALE)
}

/// Check a caller-supplied amount for a ledger operation.
///
/// Returns the amount rescaled to [`MONEY_SCALE`] so equal values compare and
/// print the same way regardless of how they were written (`5` vs `5.00`).
pub fn check_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount);
    }
    ensure_representable(amount)
}

/// Check precision and magnitude without the positivity rule
pub fn ensure_representable(amount: Decimal) -> Result<Decimal> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(Error::validation(format!(
            "amount {} has more than {} decimal places",
            amount, MONEY_SCALE
        )));
    }
    if amount.abs() > max_amount() {
        return Err(Error::validation(format!("amount {} is too large", amount)));
    }
    let mut scaled = amount;
    scaled.rescale(MONEY_SCALE);
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_max_amount() {
        assert_eq!(max_amount(), Decimal::from_str("9999999999999999.99").unwrap());
    }

    #[test]
    fn test_check_amount_rejects_zero_and_negative() {
        assert!(matches!(check_amount(Decimal::ZERO), Err(Error::NonPositiveAmount)));
        assert!(matches!(
            check_amount(Decimal::new(-1, 2)),
            Err(Error::NonPositiveAmount)
        ));
    }

    #[test]
    fn test_check_amount_rescales() {
        let amount = check_amount(Decimal::new(5, 0)).unwrap();
        assert_eq!(amount.to_string(), "5.00");

        // Trailing zeros beyond the scale are fine
        let amount = check_amount(Decimal::from_str("12.5000").unwrap()).unwrap();
        assert_eq!(amount.to_string(), "12.50");
    }

    #[test]
    fn test_check_amount_rejects_sub_cent_precision() {
        let err = check_amount(Decimal::from_str("0.001").unwrap()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_check_amount_rejects_overflowing_values() {
        let too_big = max_amount() + Decimal::new(1, 2);
        assert!(matches!(check_amount(too_big), Err(Error::Validation(_))));
        assert!(check_amount(max_amount()).is_ok());
    }
}
