//! Re-anchoring a rate table at a different base currency.

use ratewise_common::Currency;
use rust_decimal::Decimal;
use tracing::warn;

use crate::table::{RateSource, RateTable};

/// Express `table` per one unit of `new_base`.
///
/// Every rate is divided by the old table's rate for `new_base`. When that
/// rate is missing or not positive, 1 is used as the divisor so the result
/// is still a usable table. The old base shows up in the output at `1 / r`;
/// `new_base` itself is left out. The result is tagged `Fallback`.
pub fn rebase(table: &RateTable, new_base: &Currency) -> RateTable {
    let divisor = match table.rate(new_base) {
        Some(r) if r > Decimal::ZERO => r,
        _ => {
            warn!(
                from = %table.base(),
                to = %new_base,
                "No usable anchor rate, rebasing with divisor 1"
            );
            Decimal::ONE
        }
    };

    let anchor = std::iter::once((table.base().clone(), Decimal::ONE));
    let rebased = anchor
        .chain(table.rates().iter().map(|(c, v)| (c.clone(), *v)))
        .filter(|(currency, _)| currency != new_base)
        .filter_map(|(currency, value)| {
            value
                .checked_div(divisor)
                .map(|rate| (currency, rate))
        });

    RateTable::new(new_base.clone(), rebased, table.as_of(), RateSource::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackTable;
    use ratewise_common::now;
    use rust_decimal_macros::dec;

    fn small_fallback() -> RateTable {
        FallbackTable::from_ratios(vec![
            (Currency::eur(), dec!(0.85)),
            (Currency::gbp(), dec!(0.73)),
        ])
        .to_rate_table(now())
    }

    #[test]
    fn test_rebase_to_eur() {
        let rebased = rebase(&small_fallback(), &Currency::eur());

        assert_eq!(rebased.base(), &Currency::eur());
        assert_eq!(rebased.source(), RateSource::Fallback);
        assert_eq!(rebased.len(), 2);
        assert_eq!(rebased.rate(&Currency::usd()), Some(dec!(1) / dec!(0.85)));
        assert_eq!(rebased.rate(&Currency::gbp()), Some(dec!(0.73) / dec!(0.85)));
        assert!(rebased.rates().get(&Currency::eur()).is_none());

        let usd = rebased.rate(&Currency::usd()).unwrap().round_dp(4);
        let gbp = rebased.rate(&Currency::gbp()).unwrap().round_dp(4);
        assert_eq!(usd, dec!(1.1765));
        assert_eq!(gbp, dec!(0.8588));
    }

    #[test]
    fn test_rebase_to_same_base_is_unchanged() {
        let table = small_fallback();
        let rebased = rebase(&table, &Currency::usd());
        assert_eq!(rebased.rates(), table.rates());
    }

    #[test]
    fn test_rebase_matches_ratio_for_every_pair() {
        let fallback = FallbackTable::standard();
        let table = fallback.to_rate_table(now());

        for base in Currency::supported() {
            let rebased = rebase(&table, &base);
            for (currency, rate) in rebased.rates() {
                let expected = fallback.ratio(currency).unwrap() / fallback.ratio(&base).unwrap();
                assert_eq!(*rate, expected, "{base} -> {currency}");
            }
        }
    }

    #[test]
    fn test_rebase_unknown_base_uses_divisor_one() {
        let table = small_fallback();
        let rebased = rebase(&table, &Currency::new("CHF"));

        assert_eq!(rebased.base(), &Currency::new("CHF"));
        assert_eq!(rebased.rate(&Currency::usd()), Some(dec!(1)));
        assert_eq!(rebased.rate(&Currency::eur()), Some(dec!(0.85)));
    }
}
