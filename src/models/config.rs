use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ServiceError;
use crate::retry::RetryPolicy;
use crate::udbc::Timeouts;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub read_ms: u64,
    pub write_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            read_ms: 10_000,
            write_ms: 10_000,
        }
    }
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(c: &TimeoutConfig) -> Self {
        Timeouts {
            connect: Duration::from_millis(c.connect_ms),
            read: Duration::from_millis(c.read_ms),
            write: Duration::from_millis(c.write_ms),
        }
    }
}

/// 服务注册中心（Consul）配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    pub enabled: bool,
    pub url: String,
    pub tags: Vec<String>,
    pub check_interval: String,
    pub check_timeout: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://127.0.0.1:8500".to_string(),
            tags: vec!["MySQLService".to_string()],
            check_interval: "10s".to_string(),
            check_timeout: "5s".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Registry URL with a scheme, `http://` is assumed when none is given.
    pub fn base_url(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    /// defaults to `{service_name}-{host}:{port}`
    pub service_id: Option<String>,
    /// defaults to `http://{host}:{port}/health`
    pub health_check_url: Option<String>,
    pub registry: RegistryConfig,
    pub retry: RetryPolicy,
    pub timeouts: TimeoutConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 20050,
            service_name: "MySQLService".to_string(),
            service_id: None,
            health_check_url: None,
            registry: RegistryConfig::default(),
            retry: RetryPolicy::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn service_id(&self) -> String {
        self.service_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}:{}", self.service_name, self.host, self.port))
    }

    pub fn health_check_url(&self) -> String {
        self.health_check_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/health", self.host, self.port))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from(&self.timeouts)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}
