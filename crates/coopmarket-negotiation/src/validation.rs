//! Pure proposal checks. No I/O: everything here runs before any read of
//! eligibility facts and before any write.

use chrono::{DateTime, Utc};
use coopmarket_types::{Agreement, BarterLeg, BuyTerms, MarketError, Result};
use rust_decimal::Decimal;

/// `0 < requested <= available`.
pub fn check_quantity(requested: Decimal, available: Decimal) -> Result<()> {
    if requested <= Decimal::ZERO || requested > available {
        return Err(MarketError::InvalidQuantity {
            requested,
            available,
        });
    }
    Ok(())
}

/// Whole months of validity left at `now`, counting `month_days` per month.
/// Already expired product yields a negative count.
#[must_use]
pub fn implied_validity_months(expiry: DateTime<Utc>, now: DateTime<Utc>, month_days: i64) -> i64 {
    (expiry - now).num_days() / month_days.max(1)
}

/// A proposal against a buy intent must state the product expiry, and
/// the product must stay valid for at least the buyer's minimum.
pub fn check_buy_expiry(
    terms: &BuyTerms,
    product_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    month_days: i64,
) -> Result<DateTime<Utc>> {
    let expiry = product_expiry.ok_or_else(|| {
        MarketError::validation("product_expiry_date", "required when answering a buy listing")
    })?;
    let months = implied_validity_months(expiry, now, month_days);
    if months < i64::from(terms.min_validity_months) {
        return Err(MarketError::validation(
            "product_expiry_date",
            format!(
                "{months} months of validity left, buyer requires {}",
                terms.min_validity_months
            ),
        ));
    }
    Ok(expiry)
}

/// Shape of a cash + barter agreement on a sell listing.
///
/// Cash must be positive and strictly below the listing value of the
/// requested quantity (the barter leg covers the rest). A barter leg with
/// a positive quantity is mandatory. The backing certificate is checked
/// separately against eligibility facts.
pub fn check_agreement(agreement: &Agreement, quantity: Decimal, unit_price: Decimal) -> Result<&BarterLeg> {
    if agreement.cash_amount <= Decimal::ZERO {
        return Err(MarketError::validation("cash_amount", "must be positive"));
    }
    let full_value = quantity
        .checked_mul(unit_price)
        .ok_or_else(|| MarketError::validation("quantity", "value overflow"))?;
    if agreement.cash_amount >= full_value {
        return Err(MarketError::validation(
            "cash_amount",
            format!(
                "{} must be below the listing value {full_value}",
                agreement.cash_amount
            ),
        ));
    }
    let leg = agreement
        .barter
        .as_ref()
        .ok_or_else(|| MarketError::validation("barter", "an agreement needs a barter substance"))?;
    if leg.quantity <= Decimal::ZERO {
        return Err(MarketError::validation("barter_quantity", "must be positive"));
    }
    Ok(leg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coopmarket_types::{CertificateId, SubstanceId};

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn agreement(cash: i64, barter_qty: Option<i64>) -> Agreement {
        Agreement {
            cash_amount: dec(cash),
            barter: barter_qty.map(|q| BarterLeg {
                substance_id: SubstanceId::new("zinco"),
                quantity: dec(q),
                certificate_id: CertificateId::new("LAUDO-1"),
            }),
        }
    }

    #[test]
    fn quantity_bounds() {
        assert!(check_quantity(dec(1), dec(10)).is_ok());
        assert!(check_quantity(dec(10), dec(10)).is_ok());
        for bad in [dec(0), dec(-1), dec(11)] {
            let err = check_quantity(bad, dec(10)).unwrap_err();
            assert_eq!(err.kind(), coopmarket_types::ErrorKind::Validation);
        }
    }

    #[test]
    fn months_use_thirty_day_months() {
        let now = Utc::now();
        assert_eq!(implied_validity_months(now + Duration::days(179), now, 30), 5);
        assert_eq!(implied_validity_months(now + Duration::days(180), now, 30), 6);
        assert!(implied_validity_months(now - Duration::days(40), now, 30) < 0);
    }

    #[test]
    fn buy_expiry_is_required_and_long_enough() {
        let now = Utc::now();
        let terms = BuyTerms {
            max_price_per_unit: dec(10),
            min_validity_months: 6,
        };
        assert!(check_buy_expiry(&terms, None, now, 30).is_err());
        assert!(check_buy_expiry(&terms, Some(now + Duration::days(150)), now, 30).is_err());
        assert!(check_buy_expiry(&terms, Some(now + Duration::days(200)), now, 30).is_ok());
    }

    #[test]
    fn cash_must_stay_below_listing_value() {
        // 10 units at 5.00 = 50.00
        assert!(check_agreement(&agreement(49, Some(1)), dec(10), dec(5)).is_ok());
        assert!(check_agreement(&agreement(50, Some(1)), dec(10), dec(5)).is_err());
        assert!(check_agreement(&agreement(80, Some(1)), dec(10), dec(5)).is_err());
    }

    #[test]
    fn agreement_needs_positive_cash_and_barter() {
        assert!(check_agreement(&agreement(0, Some(1)), dec(10), dec(5)).is_err());
        assert!(check_agreement(&agreement(10, None), dec(10), dec(5)).is_err());
        assert!(check_agreement(&agreement(10, Some(0)), dec(10), dec(5)).is_err());
    }
}
