//! Human-readable output.

use ratewise_common::Money;
use ratewise_fx::{Conversion, RateSource, RateTable, Swap};

/// How the result should be labelled for the reader.
pub fn provenance_label(table: &RateTable) -> String {
    match table.source() {
        RateSource::Live => match table.provider_date() {
            Some(date) => format!("live (provider date {date})"),
            None => "live".to_string(),
        },
        RateSource::Cache => format!(
            "cached as of {}",
            table.as_of().format("%Y-%m-%d %H:%M UTC")
        ),
        RateSource::Fallback => "offline fallback data, may be out of date".to_string(),
    }
}

pub fn conversion_line(conversion: &Conversion) -> String {
    format!(
        "{} = {}  (1 {} = {} {})",
        conversion.input,
        conversion.output.round(),
        conversion.input.currency,
        conversion.rate.normalize(),
        conversion.output.currency
    )
}

pub fn swap_line(swap: &Swap, amount: &Money) -> String {
    let converted = Money::new(swap.converted, swap.to.clone()).round();
    format!(
        "{} = {}  (1 {} = {} {})",
        amount,
        converted,
        swap.from,
        swap.rate.round_dp(8).normalize(),
        swap.to
    )
}

/// Short listing of the table, one `CODE rate` per line.
pub fn table_lines(table: &RateTable) -> Vec<String> {
    let mut lines = vec![format!("1 {} =", table.base())];
    lines.extend(
        table
            .rates()
            .iter()
            .map(|(currency, rate)| format!("  {} {}", rate.round_dp(6).normalize(), currency)),
    );
    lines
}
