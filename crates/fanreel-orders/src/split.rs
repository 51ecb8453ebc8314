//! Revenue split
//!
//! Deterministic platform/creator split of a charge amount. The platform
//! keeps 30%; the creator earnings are the remainder, so the two parts
//! always sum to the original amount exactly.

use serde::{Deserialize, Serialize};

use fanreel_common::{require_positive_amount, MarketError, MarketResult};

/// Platform share of every charge, in percent
pub const PLATFORM_FEE_PERCENT: i64 = 30;

/// A charge amount divided between platform and creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub platform_fee_cents: i64,
    pub creator_earnings_cents: i64,
}

/// Split a total charge into platform fee and creator earnings
///
/// The fee is `round(total * 0.30)` with half-up rounding done in integer
/// arithmetic; earnings are the remainder. Fails validation for
/// non-positive totals.
pub fn split(total_cents: i64) -> MarketResult<PaymentSplit> {
    require_positive_amount(total_cents, "amount")?;

    // round(total * 30 / 100), half-up
    let platform_fee_cents = (total_cents * PLATFORM_FEE_PERCENT + 50) / 100;
    let creator_earnings_cents = total_cents - platform_fee_cents;

    Ok(PaymentSplit {
        platform_fee_cents,
        creator_earnings_cents,
    })
}

/// Check a caller-supplied split against a freshly computed one
///
/// Webhook and client-supplied order parameters are never trusted; they
/// must match what `split` produces for the same amount.
pub fn verify(
    total_cents: i64,
    platform_fee_cents: i64,
    creator_earnings_cents: i64,
) -> MarketResult<PaymentSplit> {
    let expected = split(total_cents)?;
    if expected.platform_fee_cents != platform_fee_cents
        || expected.creator_earnings_cents != creator_earnings_cents
    {
        return Err(MarketError::validation(
            "platform_fee",
            format!(
                "split {platform_fee_cents}/{creator_earnings_cents} does not match computed split for {total_cents}"
            ),
        ));
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_thirty_percent_of_even_amount() {
        let s = split(10_000).unwrap();
        assert_eq!(s.platform_fee_cents, 3_000);
        assert_eq!(s.creator_earnings_cents, 7_000);
    }

    #[test]
    fn test_rounding_half_up() {
        // 15 * 0.30 = 4.5 -> 5
        let s = split(15).unwrap();
        assert_eq!(s.platform_fee_cents, 5);
        assert_eq!(s.creator_earnings_cents, 10);

        // 101 * 0.30 = 30.3 -> 30
        let s = split(101).unwrap();
        assert_eq!(s.platform_fee_cents, 30);
        assert_eq!(s.creator_earnings_cents, 71);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(split(0).is_err());
        assert!(split(-100).is_err());
    }

    #[test]
    fn test_verify_rejects_mismatched_split() {
        assert!(verify(10_000, 3_000, 7_000).is_ok());

        let err = verify(10_000, 2_500, 7_500).unwrap_err();
        match err {
            MarketError::Validation { field, .. } => assert_eq!(field, "platform_fee"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(split(12_345).unwrap(), split(12_345).unwrap());
    }

    proptest! {
        #[test]
        fn prop_split_is_exact(total in 1i64..50_000_000) {
            let s = split(total).unwrap();
            prop_assert_eq!(s.platform_fee_cents + s.creator_earnings_cents, total);
            // fee is round(total * 0.30), so it sits within half a cent of 30%
            let diff = (s.platform_fee_cents * 100 - total * PLATFORM_FEE_PERCENT).abs();
            prop_assert!(diff <= 50);
            prop_assert!(s.platform_fee_cents >= 0 && s.creator_earnings_cents >= 0);
        }
    }
}
