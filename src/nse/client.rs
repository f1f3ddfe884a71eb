use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::debug;

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, Result};
use crate::types::MoverDirection;

/// One NSE market-data resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AllIndices,
    Movers(MoverDirection),
    OptionChain { symbol: String },
    PeRatios,
    /// `date` is `DD-Mon-YYYY` and is used for both ends of the range.
    CorporateAnnouncements { date: String },
}

impl Endpoint {
    /// Short stable name used in logs, errors and test fixtures.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::AllIndices => "allIndices",
            Endpoint::Movers(MoverDirection::Gainers) => "gainers",
            Endpoint::Movers(MoverDirection::Losers) => "losers",
            Endpoint::OptionChain { .. } => "option-chain-indices",
            Endpoint::PeRatios => "market-data-pe",
            Endpoint::CorporateAnnouncements { .. } => "corporate-announcements",
        }
    }

    pub fn path_and_query(&self) -> String {
        match self {
            Endpoint::AllIndices => "/api/allIndices".to_string(),
            Endpoint::Movers(direction) => {
                format!("/api/live-analysis-variations?index={direction}")
            }
            Endpoint::OptionChain { symbol } => {
                format!("/api/option-chain-indices?symbol={symbol}")
            }
            Endpoint::PeRatios => "/api/market-data-pe".to_string(),
            Endpoint::CorporateAnnouncements { date } => format!(
                "/api/corporate-announcements?index=equities&from_date={date}&to_date={date}"
            ),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can answer an NSE endpoint with a JSON body.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_json(&self, endpoint: &Endpoint) -> Result<serde_json::Value>;
}

/// Live NSE client. Sends the browser User-Agent on every call.
pub struct NseClient {
    client: reqwest::Client,
    base_url: String,
}

impl NseClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);
        if let Some(timeout) = cfg.upstream_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: cfg.nse_base_url.clone(),
        })
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path_and_query())
    }
}

#[async_trait]
impl MarketDataSource for NseClient {
    async fn fetch_json(&self, endpoint: &Endpoint) -> Result<serde_json::Value> {
        let url = self.url_for(endpoint);
        debug!("GET {url}");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                endpoint: endpoint.name().to_string(),
                status: status.as_u16(),
            });
        }

        // Read bytes first so a non-JSON body surfaces as a parse error,
        // not a transport error.
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
