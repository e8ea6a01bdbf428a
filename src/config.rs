use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the coursegate service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub orders: OrdersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Payment gateway settings.
///
/// The HMAC secret is NOT part of this struct; it is handed directly to
/// the signature verifier and gateway client as a `SecretString` so it
/// never appears in serialized or logged configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway's REST API.
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// Public API key ID for basic auth.
    #[serde(default)]
    pub key_id: String,
}

/// Order lifecycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
    /// Minutes a pending order waits for its callback before expiring.
    #[serde(default = "default_expiry_minutes")]
    pub expiry_minutes: u64,
    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            gateway: GatewayConfig::default(),
            orders: OrdersConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            key_id: String::new(),
        }
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            expiry_minutes: default_expiry_minutes(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_gateway_url() -> String {
    "https://api.gateway.example".to_string()
}

fn default_expiry_minutes() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    60
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway.base_url = url.into();
        self
    }

    pub fn with_gateway_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.config.gateway.key_id = key_id.into();
        self
    }

    pub fn with_order_expiry_minutes(mut self, minutes: u64) -> Self {
        self.config.orders.expiry_minutes = minutes;
        self
    }

    pub fn with_sweep_interval_secs(mut self, seconds: u64) -> Self {
        self.config.orders.sweep_interval_secs = seconds;
        self
    }

    /// Load overrides from `COURSEGATE_*` environment variables.
    pub fn from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("COURSEGATE_HOST") {
            self.config.server.host = host;
        }
        if let Ok(port) = std::env::var("COURSEGATE_PORT") {
            if let Ok(port) = port.parse() {
                self.config.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("COURSEGATE_LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Ok(json) = std::env::var("COURSEGATE_LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Ok(url) = std::env::var("COURSEGATE_GATEWAY_URL") {
            self.config.gateway.base_url = url;
        }
        if let Ok(key_id) = std::env::var("COURSEGATE_GATEWAY_KEY_ID") {
            self.config.gateway.key_id = key_id;
        }
        if let Ok(minutes) = std::env::var("COURSEGATE_ORDER_EXPIRY_MINUTES") {
            if let Ok(minutes) = minutes.parse() {
                self.config.orders.expiry_minutes = minutes;
            }
        }
        if let Ok(seconds) = std::env::var("COURSEGATE_SWEEP_INTERVAL_SECS") {
            if let Ok(seconds) = seconds.parse() {
                self.config.orders.sweep_interval_secs = seconds;
            }
        }
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> anyhow::Result<Config> {
        if self.config.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }
        if self.config.server.addr().is_err() {
            anyhow::bail!("Invalid server address: {}", self.config.server.host);
        }
        match self.config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Invalid log level: {}", other),
        }
        if self.config.orders.expiry_minutes == 0 {
            anyhow::bail!("Order expiry must be greater than 0 minutes");
        }
        if self.config.orders.sweep_interval_secs == 0 {
            anyhow::bail!("Sweep interval must be greater than 0 seconds");
        }
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
