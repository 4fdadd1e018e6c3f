//! FX engine error types.

use std::time::Duration;

use ratewise_common::{Currency, CurrencyPair};
use thiserror::Error;

/// Errors that can occur in the FX engine.
///
/// The fetch-side variants never leave the resolver; they are logged and
/// turned into a fallback table. The computation-side variants are returned
/// to the caller of the conversion functions.
#[derive(Debug, Error)]
pub enum FxError {
    /// Live fetch did not complete within its deadline.
    #[error("Rate fetch for {base} timed out after {timeout:?}")]
    FetchTimeout { base: Currency, timeout: Duration },

    /// Live fetch failed at the transport level (connect, TLS, HTTP status).
    #[error("Rate fetch transport error: {0}")]
    FetchTransport(String),

    /// Live fetch was superseded by a newer request.
    #[error("Rate fetch for {0} was cancelled")]
    FetchCancelled(Currency),

    /// Provider payload could not be turned into a rate table.
    #[error("Malformed rate payload: {0}")]
    MalformedPayload(String),

    /// The table has no rate for the requested pair.
    #[error("Rate not available for {0}")]
    RateUnavailableForPair(CurrencyPair),

    /// Division by zero or overflow while computing a rate or amount.
    #[error("Rate computation for {0} did not produce a finite result")]
    NonFiniteComputationResult(CurrencyPair),

    /// The key/value store rejected a write.
    #[error("Rate store error: {0}")]
    Storage(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
