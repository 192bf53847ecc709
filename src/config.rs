use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "shortlink-gateway")]
#[command(about = "URL shortener with click analytics and per-client rate limiting")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Public prefix used when building short links
    #[arg(short, long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    // Postgres connection string; links are kept in memory when unset
    #[arg(long, env = "DB_DSN")]
    pub database_url: Option<String>,

    // Rate limit max requests per window, per client
    #[arg(long, env = "RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: usize,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Seconds between sweeps of idle rate limit keys, 0 disables
    #[arg(long, env = "SWEEP_INTERVAL", default_value_t = 0)]
    pub sweep_interval: u64,

    // Geolocation service, queried as {geo_url}/{ip}/country/
    #[arg(long, env = "GEO_URL", default_value = "https://ipapi.co")]
    pub geo_url: String,

    // Skip geolocation, every click is recorded with an unknown country
    #[arg(long, env = "NO_GEO", default_value_t = false)]
    pub no_geo: bool,

    // Pending click events before new ones are dropped
    #[arg(long, env = "CLICK_QUEUE", default_value_t = 1024)]
    pub click_queue: usize,
}

impl Args {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.rate_window == 0 {
            return Err(ConfigError::ZeroRateWindow);
        }
        if self.click_queue == 0 {
            return Err(ConfigError::ZeroClickQueue);
        }
        if self.public_base_url().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        Ok(())
    }

    // Base url without a trailing slash
    pub fn public_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }

    // Non-blank database url, if any
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }
}
