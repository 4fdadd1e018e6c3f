//! Ratewise FX Engine
//!
//! Exchange-rate resolution for currency conversion.
//!
//! # Features
//!
//! - Cache, live fetch and static fallback, tried in that order
//! - Persistent per-base cache with a fixed TTL
//! - Bounded, cancellable live fetches; a newer request supersedes an older one
//! - Decimal conversion arithmetic, including the inverse rate used on swap
//!
//! # Example
//!
//! ```rust,ignore
//! use ratewise_fx::{convert, RateResolver, ResolverConfig};
//! use ratewise_common::Currency;
//! use rust_decimal_macros::dec;
//!
//! let resolver = RateResolver::from_config(&ResolverConfig::from_env())?;
//!
//! // Always returns a table; check `source()` for provenance
//! let table = resolver.resolve(&Currency::usd()).await;
//!
//! let eur = convert(&table, dec!(100), &Currency::eur())?;
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod conversion;
pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod http;
pub mod rebase;
pub mod resolver;
pub mod store;
pub mod table;

pub use cache::{CacheEntry, RateCache, RateCacheConfig};
pub use cancel::{CancelHandle, CancelToken};
pub use config::ResolverConfig;
pub use conversion::{convert, inverse_rate, swap, Conversion, Swap};
pub use error::{FxError, FxResult};
pub use fallback::FallbackTable;
pub use fetcher::{fetch_with_deadline, validate, RateFetcher, RawRates};
pub use http::HttpRateFetcher;
pub use rebase::rebase;
pub use resolver::{RateResolver, ResolverStatsSnapshot};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use table::{RateSource, RateTable};

#[cfg(any(test, feature = "test-utils"))]
pub use fetcher::{MockBehavior, MockRateFetcher};
