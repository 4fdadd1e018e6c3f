//! Live rate fetching: provider trait, payload validation and deadlines.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use ratewise_common::{Currency, Timestamp};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{FxError, FxResult};
use crate::table::{RateSource, RateTable};

/// Unvalidated provider response.
///
/// Shape: `{"base": "USD", "date": "2024-01-01", "rates": {"EUR": 0.85, ...}}`.
/// `rates` must be an object; everything inside it is checked later by
/// [`validate`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawRates {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    pub rates: serde_json::Map<String, Value>,
}

impl RawRates {
    /// Parse a provider body.
    pub fn from_json(body: &str) -> FxResult<Self> {
        serde_json::from_str(body).map_err(|e| FxError::MalformedPayload(e.to_string()))
    }
}

/// A source of live rates.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Fetcher name, for logs.
    fn name(&self) -> &str;

    /// Fetch rates anchored at `base`.
    async fn fetch(&self, base: &Currency) -> FxResult<RawRates>;
}

/// Run `fetcher` for `base`, giving up after `timeout` or when `cancel` fires.
pub async fn fetch_with_deadline(
    fetcher: &dyn RateFetcher,
    base: &Currency,
    timeout: Duration,
    cancel: &CancelToken,
) -> FxResult<RawRates> {
    if cancel.is_cancelled() {
        return Err(FxError::FetchCancelled(base.clone()));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FxError::FetchCancelled(base.clone())),
        result = tokio::time::timeout(timeout, fetcher.fetch(base)) => match result {
            Ok(inner) => inner,
            Err(_) => Err(FxError::FetchTimeout { base: base.clone(), timeout }),
        },
    }
}

/// Turn a provider payload into a live [`RateTable`] anchored at `base`.
///
/// Entries with an unsupported code or a value that is not a positive,
/// representable number are dropped one by one. The payload is rejected only
/// if nothing usable is left. The request's `base` wins over whatever base
/// the payload reports.
pub fn validate(raw: RawRates, base: &Currency, as_of: Timestamp) -> FxResult<RateTable> {
    if let Some(reported) = raw.base.as_deref() {
        if Currency::new(reported) != *base {
            warn!(requested = %base, reported = %reported, "Provider base differs from request");
        }
    }

    let total = raw.rates.len();
    let mut accepted = Vec::with_capacity(total);
    for (code, value) in raw.rates {
        let currency = Currency::new(code);
        if !currency.is_supported() || currency == *base {
            continue;
        }
        let rate = match &value {
            Value::Number(n) => decimal_from_number(n),
            _ => None,
        };
        match rate {
            Some(rate) if rate > Decimal::ZERO => accepted.push((currency, rate)),
            _ => debug!(base = %base, currency = %currency, "Dropping invalid rate"),
        }
    }

    let table = RateTable::new(base.clone(), accepted, as_of, RateSource::Live)
        .with_provider_date(raw.date);

    if table.is_empty() {
        return Err(FxError::MalformedPayload(format!(
            "no usable rates for {base} among {total} entries"
        )));
    }

    debug!(base = %base, accepted = table.len(), total, "Validated provider payload");
    Ok(table)
}

fn decimal_from_number(n: &Number) -> Option<Decimal> {
    let text = n.to_string();
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(&text).ok()
    } else {
        Decimal::from_str(&text).ok()
    }
}

/// What a [`MockRateFetcher`] does for a given base.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this payload.
    Respond(RawRates),
    /// Fail with a transport error.
    Fail(String),
    /// Never complete.
    Hang,
}

/// Mock rate fetcher for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateFetcher {
    name: String,
    behaviors: dashmap::DashMap<Currency, (MockBehavior, Duration)>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateFetcher {
    /// Create a mock that fails for every base until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviors: dashmap::DashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Respond to `base` with `rates` after `delay`.
    pub fn set_rates(&self, base: Currency, rates: &[(&str, Value)], delay: Duration) {
        let raw = RawRates {
            base: Some(base.code().to_string()),
            date: Some("2024-01-01".to_string()),
            rates: rates
                .iter()
                .map(|(code, value)| (code.to_string(), value.clone()))
                .collect(),
        };
        self.set_behavior(base, MockBehavior::Respond(raw), delay);
    }

    pub fn set_behavior(&self, base: Currency, behavior: MockBehavior, delay: Duration) {
        self.behaviors.insert(base, (behavior, delay));
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateFetcher for MockRateFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, base: &Currency) -> FxResult<RawRates> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let behavior = self.behaviors.get(base).map(|b| b.clone());
        let (behavior, delay) = match behavior {
            Some(b) => b,
            None => return Err(FxError::FetchTransport(format!("no mock for {base}"))),
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match behavior {
            MockBehavior::Respond(raw) => Ok(raw),
            MockBehavior::Fail(reason) => Err(FxError::FetchTransport(reason)),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}
