//! Ratewise CLI
//!
//! Resolves a rate table for the requested base currency and converts an
//! amount with it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratewise_common::{Currency, Money};
use ratewise_fx::{swap, Conversion, RateResolver, ResolverConfig};

mod render;

/// Ratewise currency converter
#[derive(Parser, Debug)]
#[command(name = "ratewise")]
#[command(about = "Convert amounts using live, cached or offline exchange rates")]
struct Args {
    /// Currency to convert from
    #[arg(short, long, default_value = "USD")]
    base: String,

    /// Currency to convert into
    #[arg(short, long)]
    to: Option<String>,

    /// Amount of the base currency
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    amount: Decimal,

    /// Treat the amount as being in the target currency and convert back
    #[arg(long)]
    swap: bool,

    /// Print the whole rate table
    #[arg(long)]
    list: bool,

    /// Never touch the network
    #[arg(long)]
    offline: bool,

    /// Directory for the persistent rate cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Live rate endpoint (base code is appended)
    #[arg(long)]
    endpoint: Option<String>,

    /// Live fetch timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Emit the result as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::from_env();
        if self.offline {
            config.offline = true;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        config
    }

    fn base_currency(&self) -> anyhow::Result<Currency> {
        supported_currency(&self.base, "--base")
    }

    fn target_currency(&self) -> anyhow::Result<Currency> {
        let code = self
            .to
            .as_deref()
            .context("--to is required unless --list is given")?;
        supported_currency(code, "--to")
    }

    fn checked_amount(&self) -> anyhow::Result<Decimal> {
        if self.amount <= Decimal::ZERO {
            bail!("--amount must be greater than zero, got {}", self.amount);
        }
        Ok(self.amount)
    }
}

fn supported_currency(code: &str, flag: &str) -> anyhow::Result<Currency> {
    let currency = Currency::new(code);
    if !currency.is_supported() {
        bail!(
            "{flag}: unsupported currency {currency}; expected one of {}",
            ratewise_common::SUPPORTED_CURRENCIES.join(", ")
        );
    }
    Ok(currency)
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let config = args.resolver_config();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let base = args.base_currency()?;
    let target = if args.list {
        None
    } else {
        Some((args.target_currency()?, args.checked_amount()?))
    };

    let resolver = RateResolver::from_config(&config).context("building rate resolver")?;

    info!(base = %base, offline = config.offline, "Resolving rates");
    let table = resolver.resolve(&base).await;
    let label = render::provenance_label(&table);

    let Some((to, amount)) = target else {
        for line in render::table_lines(&table) {
            println!("{line}");
        }
        println!("source: {label}");
        return Ok(());
    };

    if args.swap {
        let swapped = swap(&table, &to, amount)
            .with_context(|| format!("rate not available for {to} -> {base}"))?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&swapped)?);
        } else {
            println!("{}", render::swap_line(&swapped, &Money::new(amount, to.clone())));
            println!("source: {label}");
        }
        return Ok(());
    }

    let conversion = Conversion::execute(&table, amount, &to)
        .with_context(|| format!("rate not available for {base} -> {to}"))?;
    debug!(
        pair = %conversion.pair(),
        effective_rate = %conversion.effective_rate(),
        "Converted"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&conversion)?);
    } else {
        println!("{}", render::conversion_line(&conversion));
        println!("source: {label}");
    }

    Ok(())
}
