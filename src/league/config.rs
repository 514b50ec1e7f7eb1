//! Configuration surfaces for the three agent binaries. Built from a
//! small hand-rolled flag parser rather than a derive-based CLI
//! framework, matching how this codebase keeps its own config layer
//! dependency-free (see `cloudllm::config::CloudLLMConfig`).

use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHOOSE_PARITY_DEADLINE_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_MATCHES: usize = 4;

/// Parse `--flag value` pairs from a raw argument list into a lookup
/// table. Flags without a following value are ignored.
fn parse_flags(args: &[String]) -> HashMap<String, String> {
    let mut flags = HashMap::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        if let Some(name) = arg.strip_prefix("--") {
            if let Some(value) = iter.next() {
                flags.insert(name.to_string(), value.clone());
            }
        }
    }
    flags
}

#[derive(Debug, Clone)]
pub struct LeagueManagerConfig {
    pub league_id: String,
    pub port: u16,
    pub data_dir: String,
    pub log_dir: String,
    pub transport_timeout: Duration,
    pub use_corrected_schedule: bool,
}

impl LeagueManagerConfig {
    pub fn from_args(args: &[String]) -> Self {
        let flags = parse_flags(args);
        Self {
            league_id: flags.get("league-id").cloned().unwrap_or_else(|| "L1".to_string()),
            port: flags
                .get("port")
                .and_then(|v| v.parse().ok())
                .unwrap_or(9000),
            data_dir: flags.get("data-dir").cloned().unwrap_or_else(|| "./data".to_string()),
            log_dir: flags.get("log-dir").cloned().unwrap_or_else(|| "./logs".to_string()),
            transport_timeout: Duration::from_secs(DEFAULT_TRANSPORT_TIMEOUT_SECS),
            use_corrected_schedule: flags.contains_key("corrected-schedule"),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

#[derive(Debug, Clone)]
pub struct RefereeConfig {
    pub referee_id: String,
    pub league_id: String,
    pub league_manager_endpoint: String,
    pub port: u16,
    pub data_dir: String,
    pub log_dir: String,
    pub max_concurrent_matches: usize,
    pub transport_timeout: Duration,
    pub choose_parity_deadline: Duration,
}

impl RefereeConfig {
    pub fn from_args(args: &[String]) -> Self {
        let flags = parse_flags(args);
        Self {
            referee_id: flags.get("referee-id").cloned().unwrap_or_else(|| "REF01".to_string()),
            league_id: flags.get("league-id").cloned().unwrap_or_else(|| "L1".to_string()),
            league_manager_endpoint: flags
                .get("league-manager-endpoint")
                .cloned()
                .unwrap_or_else(|| "http://127.0.0.1:9000".to_string()),
            port: flags.get("port").and_then(|v| v.parse().ok()).unwrap_or(9100),
            data_dir: flags.get("data-dir").cloned().unwrap_or_else(|| "./data".to_string()),
            log_dir: flags.get("log-dir").cloned().unwrap_or_else(|| "./logs".to_string()),
            max_concurrent_matches: flags
                .get("max-concurrent-matches")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONCURRENT_MATCHES),
            transport_timeout: Duration::from_secs(DEFAULT_TRANSPORT_TIMEOUT_SECS),
            choose_parity_deadline: Duration::from_secs(DEFAULT_CHOOSE_PARITY_DEADLINE_SECS),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub player_id: String,
    pub league_id: String,
    pub league_manager_endpoint: String,
    pub port: u16,
    pub data_dir: String,
    pub log_dir: String,
    pub strategy: String,
    pub transport_timeout: Duration,
}

impl PlayerConfig {
    pub fn from_args(args: &[String]) -> Self {
        let flags = parse_flags(args);
        Self {
            player_id: flags.get("player-id").cloned().unwrap_or_else(|| "P01".to_string()),
            league_id: flags.get("league-id").cloned().unwrap_or_else(|| "L1".to_string()),
            league_manager_endpoint: flags
                .get("league-manager-endpoint")
                .cloned()
                .unwrap_or_else(|| "http://127.0.0.1:9000".to_string()),
            port: flags.get("port").and_then(|v| v.parse().ok()).unwrap_or(9200),
            data_dir: flags.get("data-dir").cloned().unwrap_or_else(|| "./data".to_string()),
            log_dir: flags.get("log-dir").cloned().unwrap_or_else(|| "./logs".to_string()),
            strategy: flags.get("strategy").cloned().unwrap_or_else(|| "random".to_string()),
            transport_timeout: Duration::from_secs(DEFAULT_TRANSPORT_TIMEOUT_SECS),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn league_manager_config_has_sane_defaults() {
        let cfg = LeagueManagerConfig::from_args(&[]);
        assert_eq!(cfg.league_id, "L1");
        assert_eq!(cfg.port, 9000);
        assert!(!cfg.use_corrected_schedule);
    }

    #[test]
    fn referee_config_parses_flags() {
        let cfg = RefereeConfig::from_args(&args(&[
            "--referee-id",
            "REF02",
            "--max-concurrent-matches",
            "8",
        ]));
        assert_eq!(cfg.referee_id, "REF02");
        assert_eq!(cfg.max_concurrent_matches, 8);
    }

    #[test]
    fn player_config_defaults_to_random_strategy() {
        let cfg = PlayerConfig::from_args(&[]);
        assert_eq!(cfg.strategy, "random");
    }
}
