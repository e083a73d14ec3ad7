//! Process configuration, read from `DEPOT_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const DATA_DIR_VAR: &str = "DEPOT_DATA_DIR";
pub const CREDENTIALS_PATH_VAR: &str = "DEPOT_CREDENTIALS_PATH";
pub const SESSION_TTL_VAR: &str = "DEPOT_SESSION_TTL_SECS";
pub const SWEEP_INTERVAL_VAR: &str = "DEPOT_SWEEP_INTERVAL_SECS";

const DEFAULT_SESSION_TTL_SECS: u64 = 5 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotConfig {
    /// Directory holding one `<store id>.db` file per account.
    pub data_dir: PathBuf,
    /// The JSON credentials file.
    pub credentials_path: PathBuf,
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            credentials_path: PathBuf::from("./users.json"),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl DepotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR_VAR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(CREDENTIALS_PATH_VAR) {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(SESSION_TTL_VAR) {
            config.session_ttl_secs = parse_secs(SESSION_TTL_VAR, &raw)?;
        }
        if let Some(raw) = lookup(SWEEP_INTERVAL_VAR) {
            config.sweep_interval_secs = parse_secs(SWEEP_INTERVAL_VAR, &raw)?;
        }
        Ok(config)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_secs(var: &str, raw: &str) -> anyhow::Result<u64> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{var} must be a whole number of seconds, got {raw:?}"))?;
    if secs == 0 {
        bail!("{var} must be greater than 0");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = DepotConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DepotConfig::default());
        assert_eq!(config.session_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_applied() {
        let config = DepotConfig::from_lookup(lookup(&[
            (DATA_DIR_VAR, "/var/lib/depot"),
            (CREDENTIALS_PATH_VAR, "/etc/depot/users.json"),
            (SESSION_TTL_VAR, " 60 "),
            (SWEEP_INTERVAL_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/depot"));
        assert_eq!(config.credentials_path, PathBuf::from("/etc/depot/users.json"));
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_durations() {
        let err = DepotConfig::from_lookup(lookup(&[(SESSION_TTL_VAR, "soon")])).unwrap_err();
        assert!(err.to_string().contains(SESSION_TTL_VAR));

        let err = DepotConfig::from_lookup(lookup(&[(SWEEP_INTERVAL_VAR, "0")])).unwrap_err();
        assert_eq!(err.to_string(), "DEPOT_SWEEP_INTERVAL_SECS must be greater than 0");
    }
}
