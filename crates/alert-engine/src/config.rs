use anyhow::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Price lookup backend, e.g. `http://localhost:8000`.
    pub backend_url: String,
    pub lookup_timeout: Duration,
    /// Pause between successive alert lookups within one pass.
    pub pause_between: Duration,
    pub check_interval: Duration,
    pub run_once: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            lookup_timeout: Duration::from_secs(30),
            pause_between: Duration::from_millis(1000),
            check_interval: Duration::from_secs(86_400),
            run_once: false,
        }
    }
}

impl AlertConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            lookup_timeout: Duration::from_secs(
                env::var("PRICE_LOOKUP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            ),
            pause_between: Duration::from_millis(
                env::var("ALERT_PAUSE_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
            ),
            check_interval: Duration::from_secs(
                env::var("ALERT_CHECK_INTERVAL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()?,
            ),
            run_once: env::var("ALERT_RUN_ONCE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
        })
    }
}
