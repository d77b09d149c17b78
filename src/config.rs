//! Runtime configuration.
//!
//! Read from the environment (after `.env` is loaded). ClickHouse credentials
//! are mandatory; the process refuses to start without them.

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::charts::AxisOrder;
use crate::decoder::DecodeMode;
use crate::schema::{Catalog, OverviewLayout};

/// Default ClickHouse HTTPS port.
const DEFAULT_PORT: u16 = 8443;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Connection settings for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub catalog: Catalog,
    pub decode_mode: DecodeMode,
    pub axis_order: AxisOrder,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{} not set", key));

        let port = match get("CLICKHOUSE_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid CLICKHOUSE_PORT: {}", raw))?,
            None => DEFAULT_PORT,
        };
        let timeout_secs = get("CLICKHOUSE_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .with_context(|| format!("Invalid CLICKHOUSE_TIMEOUT_SECS: {}", raw))
            })
            .transpose()?;

        let store = StoreConfig {
            host: normalize_host(&require("CLICKHOUSE_URL")?),
            port,
            username: require("CLICKHOUSE_USER")?,
            password: require("CLICKHOUSE_PASSWORD")?,
            database: require("CLICKHOUSE_DB")?,
            timeout_secs,
        };

        let layout: OverviewLayout = parse_choice(get("OVERVIEW_LAYOUT"), "OVERVIEW_LAYOUT")?;
        let decode_mode: DecodeMode = parse_choice(get("ROW_DECODE_MODE"), "ROW_DECODE_MODE")?;
        let axis_order: AxisOrder = parse_choice(get("CHART_AXIS_ORDER"), "CHART_AXIS_ORDER")?;

        let catalog = Catalog::new(
            layout,
            get("OVERVIEW_TABLE").unwrap_or_else(|| "overview_copy".to_string()),
            get("HEALTH_KPI_TABLE").unwrap_or_else(|| "health_kpi".to_string()),
            get("QUARTERLY_TABLE").unwrap_or_else(|| "quarterly_figures".to_string()),
        );

        Ok(Self {
            store,
            catalog,
            decode_mode,
            axis_order,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

/// Accept either a bare host or a URL and keep only the host part.
fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

fn parse_choice<T>(raw: Option<String>, key: &str) -> Result<T>
where
    T: FromStr + Default,
    T::Err: Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid {}: {}", key, e)),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("CLICKHOUSE_URL", "abc123.eu-west-1.aws.clickhouse.cloud"),
        ("CLICKHOUSE_USER", "default"),
        ("CLICKHOUSE_PASSWORD", "secret"),
        ("CLICKHOUSE_DB", "pipeline"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.store.port, 8443);
        assert_eq!(config.store.timeout_secs, None);
        assert_eq!(config.catalog.overview.name, "overview_copy");
        assert_eq!(config.catalog.layout, OverviewLayout::V1);
        assert_eq!(config.decode_mode, DecodeMode::Lenient);
        assert_eq!(config.axis_order, AxisOrder::Stored);
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_missing_required_value() {
        for skip in REQUIRED.iter().map(|(k, _)| *k) {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != skip).collect();
            let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(skip));
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("CLICKHOUSE_PASSWORD", "  ");
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("CLICKHOUSE_PORT", "9440"),
            ("CLICKHOUSE_TIMEOUT_SECS", "15"),
            ("OVERVIEW_LAYOUT", "v2"),
            ("ROW_DECODE_MODE", "strict"),
            ("CHART_AXIS_ORDER", "chronological"),
            ("QUARTERLY_TABLE", "quarterly_v2"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.store.port, 9440);
        assert_eq!(config.store.timeout_secs, Some(15));
        assert_eq!(config.catalog.layout, OverviewLayout::V2);
        assert_eq!(config.catalog.overview.fields.len(), 35);
        assert_eq!(config.catalog.quarterly.name, "quarterly_v2");
        assert_eq!(config.decode_mode, DecodeMode::Strict);
        assert_eq!(config.axis_order, AxisOrder::Chronological);
    }

    #[test]
    fn test_invalid_choice() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ROW_DECODE_MODE", "sloppy"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("ROW_DECODE_MODE"));
    }

    #[test]
    fn test_invalid_layout_names_value() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("OVERVIEW_LAYOUT", "v3"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid OVERVIEW_LAYOUT: unknown overview layout 'v3'"
        );
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("https://ch.example.com:8443/"), "ch.example.com");
        assert_eq!(normalize_host("ch.example.com"), "ch.example.com");
    }
}
