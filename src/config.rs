use std::time::Duration;

use crate::error::{AppError, Result};
use crate::snapshot::FetchPolicy;

pub const NSE_BASE_URL: &str = "https://www.nseindia.com";

/// NSE rejects requests without a browser-like agent.
pub const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";

/// Cash market close in IST. Before this the last completed session is yesterday's.
pub const MARKET_CLOSE_HOUR: u32 = 15;
pub const MARKET_CLOSE_MINUTE: u32 = 30;

/// Maximum entries kept from the gainers and losers lists.
pub const MOVERS_LIMIT: usize = 5;

/// Maximum upcoming result announcements shown.
pub const RESULTS_LIMIT: usize = 5;

/// Underlying symbol for the option-chain PCR reading.
pub const PCR_SYMBOL: &str = "NIFTY";

/// Index names as they appear in `/api/allIndices`.
pub mod indices {
    pub const NIFTY_50: &str = "NIFTY 50";
    pub const NIFTY_BANK: &str = "NIFTY BANK";
    pub const INDIA_VIX: &str = "INDIA VIX";

    /// Substring that puts an index into the "other indices" list.
    pub const FAMILY_MARKER: &str = "NIFTY";
    /// Stripped from other-index display names.
    pub const FAMILY_PREFIX: &str = "NIFTY ";
}

/// Put-call ratio sentiment bands. The neutral band is closed on both ends.
pub mod pcr_thresholds {
    pub const BEARISH_ABOVE: f64 = 1.2;
    pub const BULLISH_BELOW: f64 = 0.8;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub nse_base_url: String,
    /// Directory served under `/static` (STATIC_DIR)
    pub static_dir: String,
    /// `stop_on_first_failure` or `attempt_all` (FETCH_POLICY)
    pub fetch_policy: FetchPolicy,
    /// Per-request upstream timeout (UPSTREAM_TIMEOUT_SECS). None waits indefinitely.
    pub upstream_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            nse_base_url: std::env::var("NSE_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| NSE_BASE_URL.to_string()),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            fetch_policy: match std::env::var("FETCH_POLICY") {
                Ok(s) => s.parse::<FetchPolicy>().map_err(AppError::Config)?,
                Err(_) => FetchPolicy::default(),
            },
            upstream_timeout: match std::env::var("UPSTREAM_TIMEOUT_SECS") {
                Ok(s) => {
                    let secs = s.trim().parse::<u64>().map_err(|_| {
                        AppError::Config("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds".to_string())
                    })?;
                    Some(Duration::from_secs(secs))
                }
                Err(_) => None,
            },
        })
    }
}
