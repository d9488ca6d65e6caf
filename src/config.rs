use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Metrics endpoint of the edge proxy, e.g. "http://traefik:8080/metrics".
    pub metrics_url: String,

    pub metrics_username: Option<String>,
    pub metrics_password: Option<String>,

    #[serde(default = "default_collect_interval")]
    pub collect_interval_seconds: u64,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    #[serde(default = "default_channel_key")]
    pub channel_encryption_key: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    metrics_url: Option<String>,
    metrics_username: Option<String>,
    metrics_password: Option<String>,
    collect_interval_seconds: Option<u64>,
    retention_days: Option<i64>,
    http_timeout_seconds: Option<u64>,
    channel_encryption_key: Option<String>,
    log_dir: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8094".to_string()
}

fn default_collect_interval() -> u64 {
    60
}

fn default_retention_days() -> i64 {
    30
}

fn default_http_timeout() -> u64 {
    10
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_channel_key() -> String {
    // This key is for development convenience.
    // It's crucial to override this in production via environment variables.
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f".to_string()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            } else {
                PartialServerConfig::default()
            }
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        let final_config = ServerConfig {
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            metrics_url: env_config
                .metrics_url
                .or(file_config.metrics_url)
                .ok_or("METRICS_URL is required")?,
            metrics_username: env_config.metrics_username.or(file_config.metrics_username),
            metrics_password: env_config.metrics_password.or(file_config.metrics_password),
            collect_interval_seconds: env_config
                .collect_interval_seconds
                .or(file_config.collect_interval_seconds)
                .unwrap_or_else(default_collect_interval),
            retention_days: env_config
                .retention_days
                .or(file_config.retention_days)
                .unwrap_or_else(default_retention_days),
            http_timeout_seconds: env_config
                .http_timeout_seconds
                .or(file_config.http_timeout_seconds)
                .unwrap_or_else(default_http_timeout),
            channel_encryption_key: env_config
                .channel_encryption_key
                .or(file_config.channel_encryption_key)
                .unwrap_or_else(default_channel_key),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
        };

        if final_config.collect_interval_seconds == 0 {
            return Err("COLLECT_INTERVAL_SECONDS must be greater than 0".to_string());
        }

        Ok(final_config)
    }
}
