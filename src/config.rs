// src/config.rs
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use lazy_static::lazy_static;
use crate::allowlist::AllowList;
use crate::error::ProxyError;

pub const DEFAULT_DIRECTORY_URL: &str = "https://api.steampowered.com/IGameServersService/GetServerList/v1/";

lazy_static! {
    static ref DEFAULT_TAGS_WHITELIST: Vec<String> = [
        "monthly", "biweekly", "weekly",
        "vanilla", "hardcore", "softcore",
        "pve", "roleplay", "creative", "minigame", "training", "battlefield", "broyale", "builds",
        "NA", "SA", "EU", "WA", "EA", "OC", "AF",
    ]
        .iter()
        .map(|tag| tag.to_string())
        .collect();
}

#[derive(Clone, Debug)]
pub struct Config {
    // Listener
    pub bind_address: String,
    pub ip_whitelist: Vec<String>,

    // Game-server refresh
    pub query_interval_secs: u64,
    pub server_cache_time_secs: u64,
    pub query_connect_timeout_secs: u64,
    pub update_burst_limit: usize,
    pub custom_tags_whitelist: Vec<String>,

    // Directory service
    pub directory_api_token: Option<String>,
    pub directory_cache_time_secs: u64,
    pub directory_url: String,
    pub directory_filter: String,
    pub directory_timeout_secs: u64,
    pub directory_cache_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5050".to_string(),
            ip_whitelist: vec!["127.0.0.1".to_string()],
            query_interval_secs: 5,
            server_cache_time_secs: 60,
            query_connect_timeout_secs: 5,
            update_burst_limit: 5,
            custom_tags_whitelist: DEFAULT_TAGS_WHITELIST.clone(),
            directory_api_token: None,
            directory_cache_time_secs: 300, // 5 minutes
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            directory_filter: "\\gamedir\\rust".to_string(),
            directory_timeout_secs: 30,
            directory_cache_file: PathBuf::from("directory_cache.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let query_connect_timeout_secs = parse_env("QUERY_CONNECT_TIMEOUT_SECS")
            .unwrap_or(defaults.query_connect_timeout_secs);

        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),

            ip_whitelist: list_env("IP_WHITELIST").unwrap_or(defaults.ip_whitelist),

            // The refresh threshold follows the UDP timeout unless set explicitly.
            query_interval_secs: parse_env("QUERY_INTERVAL_SECS")
                .unwrap_or(query_connect_timeout_secs),

            server_cache_time_secs: parse_env("SERVER_CACHE_TIME_SECS")
                .unwrap_or(defaults.server_cache_time_secs),

            query_connect_timeout_secs,

            update_burst_limit: parse_env("UPDATE_BURST_LIMIT")
                .unwrap_or(defaults.update_burst_limit),

            custom_tags_whitelist: list_env("CUSTOM_TAGS_WHITELIST")
                .unwrap_or(defaults.custom_tags_whitelist),

            directory_api_token: env::var("DIRECTORY_API_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            directory_cache_time_secs: parse_env("DIRECTORY_CACHE_TIME_SECS")
                .unwrap_or(defaults.directory_cache_time_secs),

            directory_url: env::var("DIRECTORY_URL").unwrap_or(defaults.directory_url),

            directory_filter: env::var("DIRECTORY_FILTER").unwrap_or(defaults.directory_filter),

            directory_timeout_secs: parse_env("DIRECTORY_TIMEOUT_SECS")
                .unwrap_or(defaults.directory_timeout_secs),

            directory_cache_file: env::var("DIRECTORY_CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.directory_cache_file),
        }
    }

    /// Checks the settings that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ProxyError> {
        AllowList::from_entries(&self.ip_whitelist)?;

        if self.update_burst_limit == 0 {
            return Err(ProxyError::configuration("UPDATE_BURST_LIMIT must be at least 1"));
        }
        if self.query_connect_timeout_secs == 0 {
            return Err(ProxyError::configuration("QUERY_CONNECT_TIMEOUT_SECS must be positive"));
        }
        if self.server_cache_time_secs == 0 {
            return Err(ProxyError::configuration("SERVER_CACHE_TIME_SECS must be positive"));
        }
        if self.directory_api_token.is_some() {
            if self.directory_cache_time_secs == 0 {
                return Err(ProxyError::configuration("DIRECTORY_CACHE_TIME_SECS must be positive"));
            }
            if self.directory_timeout_secs == 0 {
                return Err(ProxyError::configuration("DIRECTORY_TIMEOUT_SECS must be positive"));
            }
        }
        Ok(())
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.query_interval_secs)
    }

    pub fn server_cache_time(&self) -> Duration {
        Duration::from_secs(self.server_cache_time_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_connect_timeout_secs)
    }

    pub fn directory_cache_time(&self) -> Duration {
        Duration::from_secs(self.directory_cache_time_secs)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_secs(self.directory_timeout_secs)
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn list_env(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_threshold(), config.query_timeout());
        assert!(config.custom_tags_whitelist.iter().any(|t| t == "vanilla"));
    }

    #[test]
    fn test_zero_burst_limit_rejected() {
        let config = Config { update_burst_limit: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(ProxyError::Configuration(_))));
    }

    #[test]
    fn test_bad_whitelist_entry_rejected() {
        let config = Config {
            ip_whitelist: vec!["127.0.0.1".to_string(), "not-an-ip".to_string()],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ProxyError::Configuration(_))));
    }

    #[test]
    fn test_directory_ttl_required_with_token() {
        let config = Config {
            directory_api_token: Some("token".to_string()),
            directory_cache_time_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
