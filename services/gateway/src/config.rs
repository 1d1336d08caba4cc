//! Gateway configuration
//!
//! Read once at startup from `GATEWAY_*` environment variables. Only the
//! bootstrap parameters path is mandatory; everything else has a default
//! suited to a local preview deployment.

use anyhow::{Context, anyhow};
use assembler::SelectionConfig;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use types::address::Address;
use types::ids::PolicyId;
use types::network::Network;

pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:8081";
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROVIDER_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub network: Network,
    pub bind: SocketAddr,
    pub provider_url: String,
    /// Per-call bound on provider requests
    pub provider_timeout: Duration,
    /// Attempts after the first for retryable provider failures
    pub provider_retries: u32,
    /// First backoff delay, doubled on every further attempt
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub bootstrap_path: PathBuf,
    /// JSON map of substandard id to deployed scripts
    pub substandards_path: Option<PathBuf>,
    pub disabled_substandards: BTreeSet<String>,
    pub journal_dir: PathBuf,
    /// Snapshots are skipped when unset
    pub snapshot_dir: Option<PathBuf>,
    pub credential_lists: BTreeSet<PolicyId>,
    pub watched: BTreeSet<Address>,
    pub selection: SelectionConfig,
}

fn list<T: FromStr>(raw: Option<String>, name: &str) -> anyhow::Result<BTreeSet<T>>
where
    T: Ord,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(BTreeSet::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| anyhow!("{}: invalid entry {:?}: {}", name, s, e)))
        .collect()
}

fn parsed<T: FromStr>(raw: Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(s) => s.trim().parse().map_err(|e| anyhow!("{}: {}", name, e)),
        None => Ok(default),
    }
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let network = parsed(lookup("GATEWAY_NETWORK"), "GATEWAY_NETWORK", Network::Preview)?;
        let bind = parsed(
            lookup("GATEWAY_BIND"),
            "GATEWAY_BIND",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;
        let bootstrap_path = lookup("GATEWAY_BOOTSTRAP_PATH")
            .map(PathBuf::from)
            .context("GATEWAY_BOOTSTRAP_PATH must point at the protocol bootstrap parameters")?;

        let defaults = SelectionConfig::default();
        let selection = SelectionConfig {
            min_output_lovelace: parsed(
                lookup("GATEWAY_MIN_OUTPUT_LOVELACE"),
                "GATEWAY_MIN_OUTPUT_LOVELACE",
                defaults.min_output_lovelace,
            )?,
            fee_reserve: parsed(lookup("GATEWAY_FEE_RESERVE"), "GATEWAY_FEE_RESERVE", defaults.fee_reserve)?,
        };
        if selection.min_output_lovelace <= Decimal::ZERO
            || selection.fee_reserve < Decimal::ZERO
            || !selection.min_output_lovelace.fract().is_zero()
            || !selection.fee_reserve.fract().is_zero()
        {
            return Err(anyhow!("selection amounts must be whole, non-negative lovelace"));
        }

        Ok(Self {
            network,
            bind,
            provider_url: lookup("GATEWAY_PROVIDER_URL").unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            provider_timeout: Duration::from_millis(parsed(
                lookup("GATEWAY_PROVIDER_TIMEOUT_MS"),
                "GATEWAY_PROVIDER_TIMEOUT_MS",
                DEFAULT_PROVIDER_TIMEOUT.as_millis() as u64,
            )?),
            provider_retries: parsed(
                lookup("GATEWAY_PROVIDER_RETRIES"),
                "GATEWAY_PROVIDER_RETRIES",
                DEFAULT_PROVIDER_RETRIES,
            )?,
            retry_delay: DEFAULT_RETRY_DELAY,
            poll_interval: Duration::from_millis(parsed(
                lookup("GATEWAY_POLL_INTERVAL_MS"),
                "GATEWAY_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL.as_millis() as u64,
            )?),
            bootstrap_path,
            substandards_path: lookup("GATEWAY_SUBSTANDARDS_PATH").map(PathBuf::from),
            disabled_substandards: list(lookup("GATEWAY_DISABLED_SUBSTANDARDS"), "GATEWAY_DISABLED_SUBSTANDARDS")?,
            journal_dir: lookup("GATEWAY_JOURNAL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/journal")),
            snapshot_dir: lookup("GATEWAY_SNAPSHOT_DIR").map(PathBuf::from),
            credential_lists: list(lookup("GATEWAY_CREDENTIAL_LISTS"), "GATEWAY_CREDENTIAL_LISTS")?,
            watched: list(lookup("GATEWAY_WATCH"), "GATEWAY_WATCH")?,
            selection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[("GATEWAY_BOOTSTRAP_PATH", "params.json")])).unwrap();
        assert_eq!(config.network, Network::Preview);
        assert_eq!(config.bind.to_string(), "0.0.0.0:8080");
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
        assert_eq!(config.provider_timeout, DEFAULT_PROVIDER_TIMEOUT);
        assert_eq!(config.provider_retries, DEFAULT_PROVIDER_RETRIES);
        assert!(config.snapshot_dir.is_none());
        assert!(config.disabled_substandards.is_empty());
        assert_eq!(config.selection, SelectionConfig::default());
    }

    #[test]
    fn test_bootstrap_path_required() {
        assert!(GatewayConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_overrides() {
        let policy = "42".repeat(28);
        let config = GatewayConfig::from_lookup(lookup(&[
            ("GATEWAY_BOOTSTRAP_PATH", "params.json"),
            ("GATEWAY_NETWORK", "mainnet"),
            ("GATEWAY_PROVIDER_RETRIES", "5"),
            ("GATEWAY_PROVIDER_TIMEOUT_MS", "1500"),
            ("GATEWAY_DISABLED_SUBSTANDARDS", "allowlist, dummy"),
            ("GATEWAY_CREDENTIAL_LISTS", policy.as_str()),
            ("GATEWAY_FEE_RESERVE", "750000"),
        ]))
        .unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.provider_retries, 5);
        assert_eq!(config.provider_timeout, Duration::from_millis(1500));
        assert!(config.disabled_substandards.contains("allowlist"));
        assert!(config.disabled_substandards.contains("dummy"));
        assert!(config.credential_lists.contains(&PolicyId::new([0x42; 28])));
        assert_eq!(config.selection.fee_reserve, Decimal::from(750_000));
    }

    #[test]
    fn test_unknown_network_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("GATEWAY_BOOTSTRAP_PATH", "params.json"),
            ("GATEWAY_NETWORK", "testnet"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GATEWAY_NETWORK"));
    }
}
