//! Consul 服务注册
//!
//! Registration is advisory: failures are logged and never stop the service.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::config::ServiceConfig;

const REGISTER_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub timeout: String,
}

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Registration {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: HealthCheck,
}

impl Registration {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            name: config.service_name.clone(),
            id: config.service_id(),
            address: config.host.clone(),
            port: config.port,
            tags: config.registry.tags.clone(),
            check: HealthCheck {
                http: config.health_check_url(),
                interval: config.registry.check_interval.clone(),
                timeout: config.registry.check_timeout.clone(),
            },
        }
    }
}

pub struct ConsulRegistry {
    client: reqwest::Client,
    base_url: String,
    registration: Registration,
    retry_delay: Duration,
}

impl ConsulRegistry {
    pub fn new(config: &ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.registry.base_url(),
            registration: Registration::from_config(config),
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn register_url(&self) -> String {
        format!("{}/v1/agent/service/register", self.base_url)
    }

    pub fn deregister_url(&self) -> String {
        format!(
            "{}/v1/agent/service/deregister/{}",
            self.base_url, self.registration.id
        )
    }

    /// Returns whether the agent accepted the registration.
    pub async fn register(&self) -> bool {
        let url = self.register_url();
        for attempt in 1..=REGISTER_ATTEMPTS {
            let sent = self
                .client
                .put(&url)
                .json(&self.registration)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match sent {
                Ok(_) => {
                    info!(service_id = %self.registration.id, url = %url, "registered with consul");
                    return true;
                }
                Err(e) if attempt < REGISTER_ATTEMPTS => {
                    warn!(attempt, error = %e, "consul registration failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "consul registration failed, continuing unregistered");
                }
            }
        }
        false
    }

    pub async fn deregister(&self) {
        let url = self.deregister_url();
        let sent = self
            .client
            .put(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match sent {
            Ok(_) => info!(service_id = %self.registration.id, "deregistered from consul"),
            Err(e) => error!(service_id = %self.registration.id, error = %e, "consul deregistration failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::RegistryConfig;

    fn config() -> ServiceConfig {
        ServiceConfig::default().port(21000).registry(RegistryConfig {
            enabled: true,
            url: "consul.local:8500/".to_string(),
            ..RegistryConfig::default()
        })
    }

    #[test]
    fn test_registration_body() {
        let body = serde_json::to_value(Registration::from_config(&config())).unwrap();
        assert_eq!(body["Name"], "MySQLService");
        assert_eq!(body["ID"], "MySQLService-127.0.0.1:21000");
        assert_eq!(body["Port"], 21000);
        assert_eq!(body["Tags"][0], "MySQLService");
        assert_eq!(body["Check"]["HTTP"], "http://127.0.0.1:21000/health");
        assert_eq!(body["Check"]["Interval"], "10s");
        assert_eq!(body["Check"]["Timeout"], "5s");
    }

    #[test]
    fn test_urls_get_scheme() {
        let registry = ConsulRegistry::new(&config());
        assert_eq!(
            registry.register_url(),
            "http://consul.local:8500/v1/agent/service/register"
        );
        assert_eq!(
            registry.deregister_url(),
            "http://consul.local:8500/v1/agent/service/deregister/MySQLService-127.0.0.1:21000"
        );
    }
}
