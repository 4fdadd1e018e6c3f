//! Validated rate tables and their provenance.

use std::collections::BTreeMap;
use std::fmt;

use ratewise_common::{Currency, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

/// Where a rate table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Fetched from the network during this resolution.
    Live,
    /// Read from an unexpired cache entry.
    Cache,
    /// Derived from the static fallback table.
    Fallback,
}

impl RateSource {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Live => "live",
            RateSource::Cache => "cache",
            RateSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rates for every supported currency, expressed per one unit of `base`.
///
/// Construction filters the input: the base itself, codes outside the
/// allow-list and non-positive values never make it into `rates`. Once
/// built, a table is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateTable {
    base: Currency,
    rates: BTreeMap<Currency, Decimal>,
    as_of: Timestamp,
    source: RateSource,
    provider_date: Option<String>,
}

impl RateTable {
    /// Build a table, dropping any entry that violates the table invariants.
    pub fn new(
        base: Currency,
        rates: impl IntoIterator<Item = (Currency, Decimal)>,
        as_of: Timestamp,
        source: RateSource,
    ) -> Self {
        let mut accepted = BTreeMap::new();
        for (currency, value) in rates {
            if currency == base {
                continue;
            }
            if !currency.is_supported() || value <= Decimal::ZERO {
                debug!(base = %base, currency = %currency, value = %value, "Dropping rate entry");
                continue;
            }
            accepted.insert(currency, value);
        }

        Self {
            base,
            rates: accepted,
            as_of,
            source,
            provider_date: None,
        }
    }

    /// Attach the as-of date string reported by the remote provider.
    pub fn with_provider_date(mut self, date: Option<String>) -> Self {
        self.provider_date = date;
        self
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    pub fn rates(&self) -> &BTreeMap<Currency, Decimal> {
        &self.rates
    }

    pub fn as_of(&self) -> Timestamp {
        self.as_of
    }

    pub fn source(&self) -> RateSource {
        self.source
    }

    /// Date string as reported by the remote source, if any.
    pub fn provider_date(&self) -> Option<&str> {
        self.provider_date.as_deref()
    }

    /// Rate for `currency`; the base itself is implicitly 1.
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        if *currency == self.base {
            return Some(Decimal::ONE);
        }
        self.rates.get(currency).copied()
    }

    /// Number of non-base entries.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
