use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API the admin console talks to
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Explicit hub URL override; when set it is the only candidate tried
    #[serde(default)]
    pub url: Option<String>,
    /// Path of the attendance hub on the server
    #[serde(default = "default_hub_path")]
    pub path: String,
    /// API suffix stripped from the REST base URL when deriving the hub URL
    #[serde(default = "default_api_suffix")]
    pub api_suffix: String,
    /// Delays between reconnection attempts, in milliseconds; the final
    /// entry repeats until reconnected
    #[serde(default = "default_reconnect_delays_ms")]
    pub reconnect_delays_ms: Vec<u64>,
    /// Jitter factor (0.0 to 1.0) applied to reconnect delays
    #[serde(default)]
    pub reconnect_jitter: f64,
    /// Keepalive ping interval in seconds (0 disables pings)
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
    /// Buffer size for outbound hub commands
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Buffer size for inbound push messages
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_hub_path() -> String {
    "/hubs/attendance".to_string()
}

fn default_api_suffix() -> String {
    "/api".to_string()
}

fn default_reconnect_delays_ms() -> Vec<u64> {
    vec![0, 2_000, 5_000, 10_000, 30_000]
}

fn default_keepalive_interval() -> u64 {
    30 // 30 seconds
}

fn default_command_buffer() -> usize {
    32
}

fn default_inbound_buffer() -> usize {
    256
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("api.base_url", default_base_url())?
            .set_default("hub.path", default_hub_path())?
            .set_default("hub.api_suffix", default_api_suffix())?
            .set_default("hub.keepalive_interval", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // HUB_URL, API_BASE_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: default_hub_path(),
            api_suffix: default_api_suffix(),
            reconnect_delays_ms: default_reconnect_delays_ms(),
            reconnect_jitter: 0.0,
            keepalive_interval: default_keepalive_interval(),
            command_buffer: default_command_buffer(),
            inbound_buffer: default_inbound_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let hub = HubConfig::default();
        assert!(hub.url.is_none());
        assert_eq!(hub.path, "/hubs/attendance");
        assert_eq!(hub.api_suffix, "/api");
        assert_eq!(hub.reconnect_delays_ms, vec![0, 2_000, 5_000, 10_000, 30_000]);
        assert_eq!(hub.keepalive_interval, 30);
    }
}
