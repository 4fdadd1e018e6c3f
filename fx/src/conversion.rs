//! Currency conversion against a resolved rate table.

use chrono::{DateTime, Utc};
use ratewise_common::{Currency, CurrencyPair, Money, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{FxError, FxResult};
use crate::table::{RateSource, RateTable};

/// Convert `amount` of `table.base()` into `to`.
///
/// Converting into the base returns `amount` untouched. A missing rate is an
/// error, never zero.
pub fn convert(table: &RateTable, amount: Decimal, to: &Currency) -> FxResult<Decimal> {
    if to == table.base() {
        return Ok(amount);
    }

    let pair = CurrencyPair::new(table.base().clone(), to.clone());
    let rate = table
        .rates()
        .get(to)
        .copied()
        .ok_or_else(|| FxError::RateUnavailableForPair(pair.clone()))?;

    amount
        .checked_mul(rate)
        .ok_or(FxError::NonFiniteComputationResult(pair))
}

/// Rate from `old_to` back into `table.base()`, i.e. `1 / rate(old_to)`.
pub fn inverse_rate(table: &RateTable, old_to: &Currency) -> FxResult<Decimal> {
    if old_to == table.base() {
        return Ok(Decimal::ONE);
    }

    let pair = CurrencyPair::new(old_to.clone(), table.base().clone());
    let forward = table
        .rates()
        .get(old_to)
        .copied()
        .ok_or_else(|| FxError::RateUnavailableForPair(pair.clone()))?;

    if forward <= Decimal::ZERO {
        return Err(FxError::NonFiniteComputationResult(pair));
    }

    Decimal::ONE
        .checked_div(forward)
        .ok_or(FxError::NonFiniteComputationResult(pair))
}

/// Result of swapping the "from" and "to" currencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swap {
    /// New "from" currency (the old "to").
    pub from: Currency,
    /// New "to" currency (the table's base).
    pub to: Currency,
    /// Units of `to` per one unit of `from`.
    pub rate: Decimal,
    /// `amount` expressed in `to`.
    pub converted: Decimal,
}

/// Swap direction using a table anchored at the old "from" currency.
///
/// `amount` is in `old_to`. No rate is fabricated: if the forward rate is
/// missing or unusable the swap fails.
pub fn swap(table: &RateTable, old_to: &Currency, amount: Decimal) -> FxResult<Swap> {
    let rate = inverse_rate(table, old_to)?;
    let converted = if old_to == table.base() {
        amount
    } else {
        amount.checked_mul(rate).ok_or_else(|| {
            FxError::NonFiniteComputationResult(CurrencyPair::new(
                old_to.clone(),
                table.base().clone(),
            ))
        })?
    };

    Ok(Swap {
        from: old_to.clone(),
        to: table.base().clone(),
        rate,
        converted,
    })
}

/// Represents a completed currency conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// Unique conversion ID.
    pub id: Uuid,
    /// Input amount.
    pub input: Money,
    /// Output amount, unrounded.
    pub output: Money,
    /// Rate applied (1 for same-currency conversions).
    pub rate: Decimal,
    /// Provenance of the table used.
    pub source: RateSource,
    /// When the table was produced.
    pub rates_as_of: Timestamp,
    /// When the conversion was executed.
    pub executed_at: DateTime<Utc>,
}

impl Conversion {
    /// Convert `amount` of the table's base into `to` and record the result.
    pub fn execute(table: &RateTable, amount: Decimal, to: &Currency) -> FxResult<Self> {
        let output = convert(table, amount, to)?;
        let rate = table
            .rate(to)
            .ok_or_else(|| FxError::RateUnavailableForPair(CurrencyPair::new(table.base().clone(), to.clone())))?;

        Ok(Self {
            id: Uuid::now_v7(),
            input: Money::new(amount, table.base().clone()),
            output: Money::new(output, to.clone()),
            rate,
            source: table.source(),
            rates_as_of: table.as_of(),
            executed_at: Utc::now(),
        })
    }

    /// Get the effective rate used.
    pub fn effective_rate(&self) -> Decimal {
        self.output
            .value
            .checked_div(self.input.value)
            .unwrap_or(Decimal::ZERO)
    }

    /// Get the currency pair.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.input.currency.clone(), self.output.currency.clone())
    }
}
