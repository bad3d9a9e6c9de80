use std::sync::Arc;

use dbgate::models::config::ServiceConfig;
use dbgate::server::run_server;
use dbgate::udbc_mysql::MysqlDriver;
use dbgate::DbService;
use tracing_subscriber::{fmt, EnvFilter};

const CONFIG_ENV: &str = "DBGATE_CONFIG";

fn load_config() -> anyhow::Result<ServiceConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            tracing::info!(path = %path, "loading configuration");
            Ok(ServiceConfig::from_file(path)?)
        }
        Err(_) => {
            tracing::info!("{} not set, using default configuration", CONFIG_ENV);
            Ok(ServiceConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 文件可选
    let _ = dotenvy::dotenv();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    tracing::info!(
        service = %config.service_name,
        service_id = %config.service_id(),
        "starting database gateway"
    );
    let service = Arc::new(DbService::new(Arc::new(MysqlDriver), config));
    run_server(service).await?;
    Ok(())
}
