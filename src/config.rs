use std::{str::FromStr, time::Duration};

use anyhow::Context;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const IDLE_THRESHOLD_SECS: &str = "IDLE_THRESHOLD_SECS";
pub const REAP_INTERVAL_SECS: &str = "REAP_INTERVAL_SECS";
pub const SEND_QUEUE: &str = "SEND_QUEUE";

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// How long an empty room stays "active" after its last join, leave or message.
    pub idle_threshold: Duration,
    pub reap_interval: Duration,
    /// Outbound frames buffered per connection before fan-out waits on it.
    pub send_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://chatrelay.db?mode=rwc".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            idle_threshold: Duration::from_secs(10),
            reap_interval: Duration::from_secs(1),
            send_queue: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let defaults = Config::default();

        Ok(
            Config {
                database_url: dotenv::var(DATABASE_URL).unwrap_or(defaults.database_url),
                bind_addr: dotenv::var(BIND_ADDR).unwrap_or(defaults.bind_addr),
                idle_threshold: parsed::<u64>(IDLE_THRESHOLD_SECS)?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.idle_threshold),
                reap_interval: parsed::<u64>(REAP_INTERVAL_SECS)?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.reap_interval),
                send_queue: parsed::<usize>(SEND_QUEUE)?
                    .unwrap_or(defaults.send_queue),
            }
            .validated()?
        )
    }

    fn validated(self) -> anyhow::Result<Config> {
        anyhow::ensure!(!self.reap_interval.is_zero(), "{REAP_INTERVAL_SECS} must be positive");
        anyhow::ensure!(self.send_queue > 0, "{SEND_QUEUE} must be positive");
        Ok(self)
    }
}

fn parsed<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(raw) => Ok(Some(
            raw.trim()
                .parse()
                .with_context(|| format!("invalid {key}: {raw:?}"))?,
        )),
        Err(_) => Ok(None),
    }
}
