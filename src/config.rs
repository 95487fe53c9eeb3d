//! Runtime configuration (ambient stack), grounded on
//! `PocketRelay-Server/src/config.rs`'s `load_config`: read a JSON blob from
//! the `MATCHCORE_CONFIG_JSON` environment variable, fall back to a
//! `config.json` file in the working directory, and fall back again to
//! built-in defaults if neither is present.

use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_ENV_VAR: &str = "MATCHCORE_CONFIG_JSON";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen port for any host-facing API the binary exposes (spec §1
    /// treats the transport itself as out of scope; this is the ambient
    /// config surface a deployment still needs).
    pub port: u16,

    /// Ping probe timeout, spec §4.4's "5 second ping deadline".
    pub ping_timeout_secs: u64,

    /// Horizon past which a cached latency sample is treated as stale
    /// (spec §4.4).
    pub latency_stale_after_secs: u64,

    /// Backfill candidate cooldown duration (spec §5).
    pub backfill_cooldown_secs: u64,

    /// Arena Public's RTT threshold below which population outranks latency
    /// (spec §4.5).
    pub arena_rtt_threshold_ms: u32,

    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            ping_timeout_secs: 5,
            latency_stale_after_secs: 60,
            backfill_cooldown_secs: 3,
            arena_rtt_threshold_ms: 90,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Loads configuration in priority order: environment variable, then
/// `config.json`, then defaults. Errors only if a present source fails to
/// parse — a missing source is not an error.
pub fn load_config() -> Config {
    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        match serde_json::from_str(&raw) {
            Ok(config) => return config,
            Err(error) => {
                log::warn!("failed to parse {CONFIG_ENV_VAR}, falling back: {error}");
            }
        }
    }

    if Path::new(CONFIG_FILE).exists() {
        match std::fs::read_to_string(CONFIG_FILE).and_then(|raw| {
            serde_json::from_str(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(config) => return config,
            Err(error) => {
                log::warn!("failed to read/parse {CONFIG_FILE}, falling back: {error}");
            }
        }
    }

    Config::default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.latency_stale_after_secs, 60);
        assert_eq!(config.backfill_cooldown_secs, 3);
        assert_eq!(config.arena_rtt_threshold_ms, 90);
    }
}
