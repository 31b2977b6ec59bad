//! Service configuration: YAML file plus environment overrides.
//!
//! Every setting has a default so the engine can boot with no file at all;
//! an explicitly named file that does not exist is an error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;

/// Root configuration for the Faultline engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub aggregator: AggregatorConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub rules: RulesConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            aggregator: AggregatorConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            rules: RulesConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Listener behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
    pub metrics_address: String,
    pub graceful_timeout_secs: u64,
    /// Per-request server timeout.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ":50051".into(),
            metrics_address: ":2112".into(),
            graceful_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Access to the upstream signal aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregatorConfig {
    pub base_url: String,
    pub metrics_path: String,
    pub logs_path: String,
    pub traces_path: String,
    pub service_graph_path: String,
    pub timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            metrics_path: "/api/v1/rca/metrics".into(),
            logs_path: "/api/v1/rca/logs".into(),
            traces_path: "/api/v1/rca/traces".into(),
            service_graph_path: "/api/v1/rca/service-graph".into(),
            timeout_secs: 5,
        }
    }
}

impl AggregatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Access to the similarity / history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Structured logging controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Rule-pack location for the recommender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    pub path: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: "config/rules/default.yaml".into(),
        }
    }
}

/// Valkey-backed caching of expensive lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub addr: String,
    pub username: String,
    pub password: String,
    pub db: u32,
    pub tls: bool,
    pub dial_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub max_retries: u32,
    pub similar_incidents_ttl_secs: u64,
    pub service_graph_ttl_secs: u64,
    pub patterns_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: String::new(),
            username: String::new(),
            password: String::new(),
            db: 0,
            tls: false,
            dial_timeout_ms: 2_000,
            read_timeout_ms: 500,
            write_timeout_ms: 500,
            max_retries: 2,
            similar_incidents_ttl_secs: 120,
            service_graph_ttl_secs: 300,
            patterns_ttl_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn similar_incidents_ttl(&self) -> Duration {
        Duration::from_secs(self.similar_incidents_ttl_secs)
    }

    pub fn service_graph_ttl(&self) -> Duration {
        Duration::from_secs(self.service_graph_ttl_secs)
    }

    pub fn patterns_ttl(&self) -> Duration {
        Duration::from_secs(self.patterns_ttl_secs)
    }

    /// Connection parameters for the Valkey provider.
    pub fn valkey(&self) -> crate::cache::ValkeyConfig {
        crate::cache::ValkeyConfig {
            addr: self.addr.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            db: self.db,
            tls: self.tls,
            dial_timeout: Duration::from_millis(self.dial_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            max_retries: self.max_retries,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file with environment overrides
    /// applied on top. An empty `path` falls back to `FAULTLINE_CONFIG`,
    /// then to pure defaults.
    pub fn load(path: &str) -> Result<Self, Error> {
        let env_path = std::env::var("FAULTLINE_CONFIG").unwrap_or_default();
        let path = if path.is_empty() { &env_path } else { path };

        let mut cfg = if path.is_empty() {
            Self::default()
        } else {
            Self::from_file(Path::new(path))?
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Parses the YAML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("config file {} not readable", path.display()),
                Some(Box::new(e)),
            )
        })?;
        serde_yaml::from_str(&data).map_err(|e| {
            Error::config(
                format!("config file {} not parseable", path.display()),
                Some(Box::new(e)),
            )
        })
    }

    fn apply_env_overrides(&mut self) {
        override_string("FAULTLINE_SERVER_ADDRESS", &mut self.server.address);
        override_string(
            "FAULTLINE_METRICS_ADDRESS",
            &mut self.server.metrics_address,
        );
        override_u64(
            "FAULTLINE_GRACEFUL_TIMEOUT_SECS",
            &mut self.server.graceful_timeout_secs,
        );
        override_string("FAULTLINE_AGGREGATOR_URL", &mut self.aggregator.base_url);
        override_string(
            "FAULTLINE_AGGREGATOR_METRICS_PATH",
            &mut self.aggregator.metrics_path,
        );
        override_string(
            "FAULTLINE_AGGREGATOR_LOGS_PATH",
            &mut self.aggregator.logs_path,
        );
        override_string(
            "FAULTLINE_AGGREGATOR_TRACES_PATH",
            &mut self.aggregator.traces_path,
        );
        override_string(
            "FAULTLINE_AGGREGATOR_SERVICE_GRAPH_PATH",
            &mut self.aggregator.service_graph_path,
        );
        override_u64(
            "FAULTLINE_AGGREGATOR_TIMEOUT_SECS",
            &mut self.aggregator.timeout_secs,
        );
        override_string("FAULTLINE_STORE_ENDPOINT", &mut self.store.endpoint);
        override_string("FAULTLINE_STORE_API_KEY", &mut self.store.api_key);
        override_string("FAULTLINE_LOG_LEVEL", &mut self.logging.level);
        if let Ok(v) = std::env::var("FAULTLINE_LOG_FORMAT") {
            self.logging.json = v.eq_ignore_ascii_case("json");
        }
        override_string("FAULTLINE_RULES_PATH", &mut self.rules.path);
        override_bool("FAULTLINE_CACHE_ENABLED", &mut self.cache.enabled);
        override_string("FAULTLINE_CACHE_ADDR", &mut self.cache.addr);
        override_string("FAULTLINE_CACHE_USERNAME", &mut self.cache.username);
        override_string("FAULTLINE_CACHE_PASSWORD", &mut self.cache.password);
        override_u32("FAULTLINE_CACHE_DB", &mut self.cache.db);
        override_bool("FAULTLINE_CACHE_TLS", &mut self.cache.tls);
        override_u64(
            "FAULTLINE_CACHE_DIAL_TIMEOUT_MS",
            &mut self.cache.dial_timeout_ms,
        );
        override_u64(
            "FAULTLINE_CACHE_READ_TIMEOUT_MS",
            &mut self.cache.read_timeout_ms,
        );
        override_u64(
            "FAULTLINE_CACHE_WRITE_TIMEOUT_MS",
            &mut self.cache.write_timeout_ms,
        );
        override_u32("FAULTLINE_CACHE_MAX_RETRIES", &mut self.cache.max_retries);
        override_u64(
            "FAULTLINE_CACHE_SIMILAR_TTL_SECS",
            &mut self.cache.similar_incidents_ttl_secs,
        );
        override_u64(
            "FAULTLINE_CACHE_SERVICE_GRAPH_TTL_SECS",
            &mut self.cache.service_graph_ttl_secs,
        );
        override_u64(
            "FAULTLINE_CACHE_PATTERNS_TTL_SECS",
            &mut self.cache.patterns_ttl_secs,
        );
    }
}

fn override_string(name: &str, target: &mut String) {
    if let Ok(v) = std::env::var(name) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

fn override_bool(name: &str, target: &mut bool) {
    if let Ok(v) = std::env::var(name) {
        *target = v.eq_ignore_ascii_case("true") || v == "1";
    }
}

fn override_u64(name: &str, target: &mut u64) {
    if let Ok(v) = std::env::var(name) {
        if let Ok(parsed) = v.parse() {
            *target = parsed;
        }
    }
}

fn override_u32(name: &str, target: &mut u32) {
    if let Ok(v) = std::env::var(name) {
        if let Ok(parsed) = v.parse() {
            *target = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.server.address, ":50051");
        assert_eq!(cfg.server.metrics_address, ":2112");
        assert_eq!(cfg.server.graceful_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.aggregator.timeout(), Duration::from_secs(5));
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.cache.similar_incidents_ttl(), Duration::from_secs(120));
        assert_eq!(cfg.cache.service_graph_ttl(), Duration::from_secs(300));
        assert_eq!(cfg.cache.patterns_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let cfg: Config = serde_yaml::from_str(
            r#"
server:
  address: ":9090"
aggregator:
  base_url: "http://signals:8080"
  timeout_secs: 2
cache:
  enabled: true
  addr: "cache:6379"
  service_graph_ttl_secs: 60
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.address, ":9090");
        assert_eq!(cfg.server.metrics_address, ":2112");
        assert_eq!(cfg.aggregator.base_url, "http://signals:8080");
        assert_eq!(cfg.aggregator.timeout(), Duration::from_secs(2));
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.service_graph_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: Result<Config, _> = serde_yaml::from_str("serverr:\n  address: \":1\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_named_file_is_an_error() {
        let err = Config::from_file(Path::new("/nonexistent/faultline.yaml")).unwrap_err();
        assert!(err.to_string().contains("not readable"));
    }
}
