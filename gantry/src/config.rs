//! # Configuration
//!
//! The gateway is configured entirely through the process environment:
//!
//! * `LOG_LEVEL`: `DEBUG`, `INFO`, or `ERROR` (default `INFO`)
//! * `PORT`: the HTTP listen port (default `3000`)
//! * `TOKEN`: if non-empty, required as `X-Access-Token` on every
//!   endpoint except `/healthz`
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    pub port: u16,
    pub token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            port: 3000,
            token: String::new(),
        }
    }
}

/// Reads the configuration from the environment over the defaults.
pub fn from_env() -> Result<Config, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Env::raw().only(&["LOG_LEVEL", "PORT", "TOKEN"]))
        .extract()
}
