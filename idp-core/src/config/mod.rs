use std::net::{IpAddr, SocketAddr};

use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Listener settings shared by every service in the workspace. Values come
/// from an optional `configuration` file, overridden by `APP_`-prefixed
/// environment variables (`APP_PORT`, `APP_BIND_ADDRESS`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// The socket address the HTTP listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!(
                "invalid bind address '{}'",
                self.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
