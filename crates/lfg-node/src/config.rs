//! Environment configuration.
//!
//! Recognized variables: `PORT`, `METRICS_PORT` (0 disables the listener),
//! `MAX_CONN_COUNT`, `DATABASE_PATH`, `DATABASE_ENTRY_TTL` (seconds),
//! `DATABASE_CLEANUP_FREQ` (seconds), `ENABLE_REFLECTION`, and `RENDER`
//! (bind all interfaces instead of loopback).

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use anyhow::{Context, Result};
use lfg_gateway::GatewayConfig;

/// Full node configuration: the gateway plus the database location.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub gateway: GatewayConfig,
    pub database_path: String,
}

impl NodeConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a lookup function (testable without
    /// touching the process environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut gateway = GatewayConfig::default();

        if let Some(port) = parse_opt::<u16>(&lookup, "PORT")? {
            gateway.http.port = port;
        }
        if let Some(port) = parse_opt::<u16>(&lookup, "METRICS_PORT")? {
            if port == 0 {
                gateway.metrics.enabled = false;
            } else {
                gateway.metrics.port = port;
            }
        }
        if let Some(max) = parse_opt::<usize>(&lookup, "MAX_CONN_COUNT")? {
            gateway.websocket.max_sessions = max;
        }
        if let Some(ttl) = parse_opt::<u64>(&lookup, "DATABASE_ENTRY_TTL")? {
            gateway.reaper.entry_ttl_secs = ttl;
        }
        if let Some(freq) = parse_opt::<u64>(&lookup, "DATABASE_CLEANUP_FREQ")? {
            gateway.reaper.interval_secs = freq;
        }
        gateway.enable_reflection = parse_flag(&lookup, "ENABLE_REFLECTION");
        if parse_flag(&lookup, "RENDER") {
            gateway.http.host = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        }

        let database_path = lookup("DATABASE_PATH").unwrap_or_else(|| "lfg.db".to_string());

        Ok(Self {
            gateway,
            database_path,
        })
    }
}

fn parse_opt<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse_flag(lookup: impl Fn(&str) -> Option<String>, key: &str) -> bool {
    matches!(
        lookup(key).as_deref().map(str::trim),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}
