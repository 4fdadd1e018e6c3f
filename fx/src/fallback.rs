//! Static offline rates.

use std::collections::BTreeMap;

use ratewise_common::{Currency, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::table::{RateSource, RateTable};

/// Hand-maintained units of each currency per 1 USD.
const USD_RATIOS: &[(&str, Decimal)] = &[
    ("USD", dec!(1)),
    ("EUR", dec!(0.85)),
    ("GBP", dec!(0.73)),
    ("JPY", dec!(110.0)),
    ("CAD", dec!(1.25)),
    ("AUD", dec!(1.35)),
    ("CHF", dec!(0.92)),
    ("CNY", dec!(6.45)),
    ("INR", dec!(74.5)),
    ("MXN", dec!(20.0)),
    ("BRL", dec!(5.2)),
    ("ZAR", dec!(14.5)),
    ("SEK", dec!(8.6)),
    ("NOK", dec!(8.5)),
    ("DKK", dec!(6.3)),
    ("NZD", dec!(1.4)),
    ("SGD", dec!(1.35)),
    ("HKD", dec!(7.8)),
    ("KRW", dec!(1180)),
    ("TRY", dec!(8.5)),
    ("PLN", dec!(3.9)),
    ("RUB", dec!(73.5)),
];

/// USD-anchored ratios that are always available and never expire.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTable {
    ratios: BTreeMap<Currency, Decimal>,
}

impl FallbackTable {
    /// The built-in table.
    pub fn standard() -> Self {
        Self::from_ratios(
            USD_RATIOS
                .iter()
                .map(|(code, ratio)| (Currency::new(*code), *ratio)),
        )
    }

    /// A custom table. `USD` is forced to 1 regardless of input.
    pub fn from_ratios(ratios: impl IntoIterator<Item = (Currency, Decimal)>) -> Self {
        let mut ratios: BTreeMap<Currency, Decimal> = ratios.into_iter().collect();
        ratios.insert(Currency::usd(), Decimal::ONE);
        Self { ratios }
    }

    /// USD ratio for `currency`.
    pub fn ratio(&self, currency: &Currency) -> Option<Decimal> {
        self.ratios.get(currency).copied()
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// The table as a USD-based [`RateTable`].
    pub fn to_rate_table(&self, as_of: Timestamp) -> RateTable {
        RateTable::new(
            Currency::usd(),
            self.ratios.iter().map(|(c, v)| (c.clone(), *v)),
            as_of,
            RateSource::Fallback,
        )
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::standard()
    }
}
