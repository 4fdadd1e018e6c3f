//! Persistent rate table cache with TTL support.

use std::collections::BTreeMap;

use chrono::Duration;
use ratewise_common::{constants, is_expired_at, Currency, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};
use crate::store::{KeyValueStore, SharedStore};
use crate::table::{RateSource, RateTable};

/// A cached table together with the instant it stops being trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub table: RateTable,
    pub expires_at: Timestamp,
}

impl CacheEntry {
    fn is_valid_at(&self, now: Timestamp) -> bool {
        !is_expired_at(self.expires_at, now)
    }
}

/// On-disk shape of a cached table.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRates {
    base: String,
    rates: BTreeMap<String, Decimal>,
    as_of: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_date: Option<String>,
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// How long an entry stays valid after it was written.
    pub ttl: Duration,
    /// Prefix for store keys; the base currency code is appended.
    pub key_prefix: String,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::cache_ttl(),
            key_prefix: "rates_".to_string(),
        }
    }
}

/// Rate tables keyed by base currency, backed by a [`KeyValueStore`].
pub struct RateCache {
    store: SharedStore,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a cache over `store` with default configuration.
    pub fn new(store: SharedStore) -> Self {
        Self::with_config(store, RateCacheConfig::default())
    }

    /// Create a cache with custom configuration.
    pub fn with_config(store: SharedStore, config: RateCacheConfig) -> Self {
        Self { store, config }
    }

    /// Get the entry for `base` if one exists and has not expired at `now`.
    ///
    /// Missing, expired, unparseable and mismatched entries all read as
    /// `None`.
    pub fn get(&self, base: &Currency, now: Timestamp) -> Option<CacheEntry> {
        let key = self.cache_key(base);
        let raw = match self.store.get(&key) {
            Some(raw) => raw,
            None => {
                debug!(base = %base, "Cache miss");
                return None;
            }
        };

        let entry = match self.decode(base, &raw) {
            Some(entry) => entry,
            None => {
                warn!(base = %base, key = %key, "Ignoring corrupt cache entry");
                return None;
            }
        };

        if !entry.is_valid_at(now) {
            debug!(base = %base, expires_at = %entry.expires_at, "Cache entry expired");
            return None;
        }

        debug!(base = %base, "Cache hit");
        Some(entry)
    }

    /// Store `table` for `base`, stamped with `now`. Replaces any previous entry.
    pub fn put(&self, base: &Currency, table: &RateTable, now: Timestamp) -> FxResult<()> {
        let stored = StoredRates {
            base: base.code().to_string(),
            rates: table
                .rates()
                .iter()
                .map(|(c, v)| (c.code().to_string(), *v))
                .collect(),
            as_of: now,
            provider_date: table.provider_date().map(str::to_string),
        };
        let value = serde_json::to_string(&stored)
            .map_err(|e| FxError::Storage(format!("encode {base}: {e}")))?;

        self.store.put(&self.cache_key(base), value)?;
        debug!(base = %base, entries = stored.rates.len(), "Cached rate table");
        Ok(())
    }

    /// Remove the entry for `base`.
    pub fn remove(&self, base: &Currency) {
        self.store.remove(&self.cache_key(base));
    }

    fn decode(&self, base: &Currency, raw: &str) -> Option<CacheEntry> {
        let stored: StoredRates = serde_json::from_str(raw).ok()?;
        if Currency::new(stored.base) != *base {
            return None;
        }

        let table = RateTable::new(
            base.clone(),
            stored
                .rates
                .into_iter()
                .map(|(code, value)| (Currency::new(code), value)),
            stored.as_of,
            RateSource::Cache,
        )
        .with_provider_date(stored.provider_date);

        if table.is_empty() {
            return None;
        }

        let expires_at = stored.as_of.checked_add_signed(self.config.ttl)?;
        Some(CacheEntry { table, expires_at })
    }

    fn cache_key(&self, base: &Currency) -> String {
        format!("{}{}", self.config.key_prefix, base.code())
    }
}
