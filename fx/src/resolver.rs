//! Rate resolution: cache, then live fetch, then fallback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ratewise_common::{Clock, Currency, SystemClock};
use tracing::{debug, info, instrument, warn};

use crate::cache::{RateCache, RateCacheConfig};
use crate::cancel::{CancelHandle, CancelToken};
use crate::config::ResolverConfig;
use crate::error::{FxError, FxResult};
use crate::fallback::FallbackTable;
use crate::fetcher::{fetch_with_deadline, validate, RateFetcher};
use crate::http::HttpRateFetcher;
use crate::rebase::rebase;
use crate::store::{FileStore, KeyValueStore, MemoryStore};
use crate::table::RateTable;

/// Counters for resolution outcomes.
#[derive(Debug, Default)]
pub struct ResolverStats {
    cache_hits: AtomicU64,
    live: AtomicU64,
    fallback: AtomicU64,
    discarded: AtomicU64,
}

impl ResolverStats {
    pub fn snapshot(&self) -> ResolverStatsSnapshot {
        ResolverStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            live: self.live.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ResolverStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverStatsSnapshot {
    pub cache_hits: u64,
    pub live: u64,
    pub fallback: u64,
    /// Live results dropped because a newer request superseded them.
    pub discarded: u64,
}

/// Identity of one `resolve` call.
#[derive(Debug)]
struct Ticket {
    generation: u64,
    base: Currency,
    token: CancelToken,
}

#[derive(Debug, Default)]
struct InFlight {
    generation: u64,
    current: Option<(u64, CancelHandle)>,
}

impl InFlight {
    fn is_current(&self, ticket: &Ticket) -> bool {
        matches!(&self.current, Some((generation, _)) if *generation == ticket.generation)
    }
}

/// Produces a usable rate table for any base currency.
///
/// Only the most recent `resolve` call may write to the cache. Starting a
/// new call cancels the fetch of the previous one, and a fetch result is
/// re-checked against the current request under the same lock that guards
/// the cache write.
pub struct RateResolver {
    cache: RateCache,
    fetcher: Option<Arc<dyn RateFetcher>>,
    fallback: FallbackTable,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    inflight: Mutex<InFlight>,
    stats: ResolverStats,
}

impl RateResolver {
    /// Create a resolver. With no fetcher, resolution never touches the network.
    pub fn new(
        cache: RateCache,
        fetcher: Option<Arc<dyn RateFetcher>>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            fetcher,
            fallback: FallbackTable::standard(),
            clock: Arc::new(SystemClock),
            fetch_timeout,
            inflight: Mutex::new(InFlight::default()),
            stats: ResolverStats::default(),
        }
    }

    /// Build the store, cache and fetcher described by `config`.
    pub fn from_config(config: &ResolverConfig) -> FxResult<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileStore::new(dir.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        let cache = RateCache::with_config(
            store,
            RateCacheConfig {
                ttl: config.cache_ttl,
                ..Default::default()
            },
        );

        let fetcher: Option<Arc<dyn RateFetcher>> = if config.offline {
            None
        } else {
            Some(Arc::new(HttpRateFetcher::new(
                config.endpoint.clone(),
                config.fetch_timeout,
            )?))
        };

        Ok(Self::new(cache, fetcher, config.fetch_timeout))
    }

    /// Replace the static fallback table.
    pub fn with_fallback(mut self, fallback: FallbackTable) -> Self {
        self.fallback = fallback;
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    pub fn stats(&self) -> ResolverStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve a rate table for `base`. Never fails.
    #[instrument(skip(self), fields(base = %base))]
    pub async fn resolve(&self, base: &Currency) -> RateTable {
        let ticket = self.begin(base);

        if let Some(entry) = self.cache.get(base, self.clock.now()) {
            self.release(&ticket);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(expires_at = %entry.expires_at, "Using cached rates");
            return entry.table;
        }

        let fetcher = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => {
                self.release(&ticket);
                debug!("Offline, using fallback rates");
                return self.fallback_for(base);
            }
        };

        let fetched = fetch_with_deadline(fetcher.as_ref(), base, self.fetch_timeout, &ticket.token)
            .await
            .and_then(|raw| validate(raw, base, self.clock.now()));

        match fetched {
            Ok(table) => {
                if self.commit_live(&ticket, &table) {
                    self.stats.live.fetch_add(1, Ordering::Relaxed);
                    info!(fetcher = fetcher.name(), entries = table.len(), "Resolved live rates");
                    table
                } else {
                    self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                    debug!("Request superseded, discarding live rates");
                    self.fallback_for(base)
                }
            }
            Err(FxError::FetchCancelled(_)) => {
                self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                debug!("Fetch cancelled by a newer request");
                self.fallback_for(base)
            }
            Err(e) => {
                self.release(&ticket);
                warn!(fetcher = fetcher.name(), error = %e, "Live fetch failed, using fallback rates");
                self.fallback_for(base)
            }
        }
    }

    /// Drop the cached table for `base` so the next resolution refetches.
    pub fn invalidate(&self, base: &Currency) {
        self.cache.remove(base);
    }

    /// Register a new request, cancelling whatever was outstanding.
    fn begin(&self, base: &Currency) -> Ticket {
        let (handle, token) = CancelHandle::new();
        let mut inflight = self.inflight.lock();

        if let Some((generation, previous)) = inflight.current.take() {
            debug!(superseded = generation, "Cancelling outstanding fetch");
            previous.cancel();
        }

        inflight.generation += 1;
        let generation = inflight.generation;
        inflight.current = Some((generation, handle));

        Ticket {
            generation,
            base: base.clone(),
            token,
        }
    }

    /// Write a live table to the cache if `ticket` is still the current request.
    fn commit_live(&self, ticket: &Ticket, table: &RateTable) -> bool {
        let mut inflight = self.inflight.lock();
        if !inflight.is_current(ticket) || ticket.token.is_cancelled() {
            return false;
        }

        if let Err(e) = self.cache.put(&ticket.base, table, self.clock.now()) {
            warn!(base = %ticket.base, error = %e, "Failed to cache live rates");
        }
        inflight.current = None;
        true
    }

    fn release(&self, ticket: &Ticket) {
        let mut inflight = self.inflight.lock();
        if inflight.is_current(ticket) {
            inflight.current = None;
        }
    }

    fn fallback_for(&self, base: &Currency) -> RateTable {
        self.stats.fallback.fetch_add(1, Ordering::Relaxed);
        rebase(&self.fallback.to_rate_table(self.clock.now()), base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{MockBehavior, MockRateFetcher};
    use crate::table::RateSource;
    use ratewise_common::{now, ManualClock};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryStore>,
        fetcher: Arc<MockRateFetcher>,
        clock: Arc<ManualClock>,
        resolver: Arc<RateResolver>,
    }

    fn setup(timeout: Duration) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(MockRateFetcher::new("mock"));
        let clock = Arc::new(ManualClock::new(now()));
        let resolver = RateResolver::new(
            RateCache::new(store.clone()),
            Some(fetcher.clone() as Arc<dyn RateFetcher>),
            timeout,
        )
        .with_fallback(FallbackTable::from_ratios(vec![
            (Currency::eur(), dec!(0.85)),
            (Currency::gbp(), dec!(0.73)),
        ]))
        .with_clock(clock.clone());

        Harness {
            store,
            fetcher,
            clock,
            resolver: Arc::new(resolver),
        }
    }

    #[tokio::test]
    async fn test_live_then_cache_hit() {
        let h = setup(Duration::from_secs(1));
        h.fetcher.set_rates(
            Currency::usd(),
            &[("EUR", json!(0.91)), ("GBP", json!(0.79))],
            Duration::ZERO,
        );

        let first = h.resolver.resolve(&Currency::usd()).await;
        assert_eq!(first.source(), RateSource::Live);
        assert_eq!(first.rate(&Currency::eur()), Some(dec!(0.91)));

        let second = h.resolver.resolve(&Currency::usd()).await;
        assert_eq!(second.source(), RateSource::Cache);
        assert_eq!(second.rates(), first.rates());

        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(
            h.resolver.stats(),
            ResolverStatsSnapshot {
                cache_hits: 1,
                live: 1,
                fallback: 0,
                discarded: 0
            }
        );
    }

    #[tokio::test]
    async fn test_network_failure_uses_rebased_fallback() {
        let h = setup(Duration::from_secs(1));
        h.fetcher.set_behavior(
            Currency::eur(),
            MockBehavior::Fail("connection refused".to_string()),
            Duration::ZERO,
        );

        let table = h.resolver.resolve(&Currency::eur()).await;

        assert_eq!(table.source(), RateSource::Fallback);
        assert_eq!(table.base(), &Currency::eur());
        assert_eq!(table.len(), 2);
        assert_eq!(table.rate(&Currency::usd()).unwrap().round_dp(4), dec!(1.1765));
        assert_eq!(table.rate(&Currency::gbp()).unwrap().round_dp(4), dec!(0.8588));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_uses_fallback() {
        let h = setup(Duration::from_millis(30));
        h.fetcher.set_behavior(Currency::usd(), MockBehavior::Hang, Duration::ZERO);

        let started = std::time::Instant::now();
        let table = h.resolver.resolve(&Currency::usd()).await;

        assert_eq!(table.source(), RateSource::Fallback);
        assert_eq!(table.rate(&Currency::eur()), Some(dec!(0.85)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_malformed_payload_uses_fallback() {
        let h = setup(Duration::from_secs(1));
        h.fetcher.set_rates(
            Currency::usd(),
            &[("EUR", json!("0.9")), ("XAU", json!(0.0005))],
            Duration::ZERO,
        );

        let table = h.resolver.resolve(&Currency::usd()).await;

        assert_eq!(table.source(), RateSource::Fallback);
        assert!(h.resolver.cache().get(&Currency::usd(), h.clock.now()).is_none());
    }

    #[tokio::test]
    async fn test_unusable_cache_entry_is_refetched() {
        let h = setup(Duration::from_secs(1));
        h.store
            .put(
                "rates_USD",
                r#"{"base":"USD","rates":{"EUR":"0.9"},"asOf":"+262142-12-31T23:59:59Z"}"#.to_string(),
            )
            .unwrap();
        h.fetcher.set_rates(Currency::usd(), &[("EUR", json!(0.91))], Duration::ZERO);

        let table = h.resolver.resolve(&Currency::usd()).await;

        assert_eq!(table.source(), RateSource::Live);
        assert_eq!(table.rate(&Currency::eur()), Some(dec!(0.91)));
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let h = setup(Duration::from_secs(1));
        h.fetcher.set_rates(Currency::usd(), &[("EUR", json!(0.91))], Duration::ZERO);

        h.resolver.resolve(&Currency::usd()).await;
        h.clock.advance(chrono::Duration::hours(24) - chrono::Duration::seconds(1));
        assert_eq!(h.resolver.resolve(&Currency::usd()).await.source(), RateSource::Cache);

        h.clock.advance(chrono::Duration::seconds(2));
        h.fetcher.set_rates(Currency::usd(), &[("EUR", json!(0.95))], Duration::ZERO);
        let refreshed = h.resolver.resolve(&Currency::usd()).await;

        assert_eq!(refreshed.source(), RateSource::Live);
        assert_eq!(refreshed.rate(&Currency::eur()), Some(dec!(0.95)));
        assert_eq!(h.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let h = setup(Duration::from_secs(1));
        h.fetcher.set_rates(Currency::usd(), &[("EUR", json!(0.91))], Duration::ZERO);

        h.resolver.resolve(&Currency::usd()).await;
        h.resolver.invalidate(&Currency::usd());

        assert_eq!(h.resolver.resolve(&Currency::usd()).await.source(), RateSource::Live);
        assert_eq!(h.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_superseded_fetch_does_not_write_cache() {
        let h = setup(Duration::from_secs(5));
        h.fetcher.set_rates(Currency::usd(), &[("EUR", json!(0.91))], Duration::from_millis(200));
        h.fetcher.set_rates(Currency::eur(), &[("USD", json!(1.1))], Duration::ZERO);

        let stale = tokio::spawn({
            let resolver = h.resolver.clone();
            async move { resolver.resolve(&Currency::usd()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fresh = h.resolver.resolve(&Currency::eur()).await;
        let stale = stale.await.unwrap();

        assert_eq!(fresh.source(), RateSource::Live);
        assert_eq!(stale.source(), RateSource::Fallback);
        assert_eq!(h.resolver.stats().discarded, 1);
        assert!(h.resolver.cache().get(&Currency::usd(), h.clock.now()).is_none());
        assert!(h.resolver.cache().get(&Currency::eur(), h.clock.now()).is_some());
    }

    #[tokio::test]
    async fn test_late_result_is_rejected_at_commit() {
        let h = setup(Duration::from_secs(5));
        let t0 = h.clock.now();

        let stale = h.resolver.begin(&Currency::usd());
        let fresh = h.resolver.begin(&Currency::eur());
        assert!(stale.token.is_cancelled());

        let newer = RateTable::new(Currency::usd(), vec![(Currency::eur(), dec!(0.93))], t0, RateSource::Live);
        h.resolver.cache().put(&Currency::usd(), &newer, t0).unwrap();

        let late = RateTable::new(Currency::usd(), vec![(Currency::eur(), dec!(0.80))], t0, RateSource::Live);
        assert!(!h.resolver.commit_live(&stale, &late));

        let cached = h.resolver.cache().get(&Currency::usd(), t0).unwrap();
        assert_eq!(cached.table.rate(&Currency::eur()), Some(dec!(0.93)));

        let table = RateTable::new(Currency::eur(), vec![(Currency::usd(), dec!(1.1))], t0, RateSource::Live);
        assert!(h.resolver.commit_live(&fresh, &table));
    }

    #[tokio::test]
    async fn test_offline_resolver() {
        let store = Arc::new(MemoryStore::new());
        let resolver = RateResolver::new(RateCache::new(store), None, Duration::from_secs(1));

        let table = resolver.resolve(&Currency::jpy()).await;

        assert_eq!(table.source(), RateSource::Fallback);
        assert_eq!(table.base(), &Currency::jpy());
        for rate in table.rates().values() {
            assert!(*rate > Decimal::ZERO);
        }
        assert_eq!(resolver.stats().fallback, 1);
    }

    #[tokio::test]
    async fn test_from_config_offline_with_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolverConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            offline: true,
            ..Default::default()
        };

        let resolver = RateResolver::from_config(&config).unwrap();
        let table = resolver.resolve(&Currency::gbp()).await;

        assert_eq!(table.source(), RateSource::Fallback);
        assert!(resolver.cache().get(&Currency::gbp(), now()).is_none());
    }
}
