//! Wire shapes of the NSE JSON responses, only as deep as the dashboard reads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::nse::client::Endpoint;

/// `/api/allIndices`
#[derive(Debug, Deserialize)]
pub struct AllIndicesResponse {
    pub data: Vec<RawIndex>,
}

/// Prices stay raw here: only the rows that reach the board get parsed.
#[derive(Debug, Deserialize)]
pub struct RawIndex {
    pub index: String,
    #[serde(default)]
    pub last: Value,
    #[serde(default)]
    pub variation: Value,
    #[serde(rename = "percentChange", default)]
    pub percent_change: Value,
}

/// `/api/live-analysis-variations?index=...`
#[derive(Debug, Deserialize)]
pub struct MoversResponse {
    #[serde(rename = "NIFTY")]
    pub nifty: MoversSection,
}

#[derive(Debug, Deserialize)]
pub struct MoversSection {
    /// Typed only after the list is cut to the displayed rows.
    pub data: Vec<Value>,
}

/// `/api/option-chain-indices?symbol=...`
#[derive(Debug, Deserialize)]
pub struct OptionChainResponse {
    pub filtered: FilteredChain,
}

#[derive(Debug, Deserialize)]
pub struct FilteredChain {
    #[serde(rename = "PCR")]
    pub pcr: PcrBlock,
}

#[derive(Debug, Deserialize)]
pub struct PcrBlock {
    #[serde(deserialize_with = "lenient_f64")]
    pub value: f64,
}

/// `/api/market-data-pe`. Rows are scanned, not typed: nothing past the
/// first matching `key` is looked at.
#[derive(Debug, Deserialize)]
pub struct PeResponse {
    pub data: Vec<Value>,
}

/// One element of `/api/corporate-announcements`, which is a bare array.
#[derive(Debug, Deserialize)]
pub struct RawAnnouncement {
    pub subject: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(rename = "recDt", default)]
    pub rec_dt: Option<String>,
}

/// Deserialize an endpoint body, tagging shape problems with the endpoint name.
pub fn decode<T: DeserializeOwned>(endpoint: &Endpoint, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| AppError::schema(endpoint.name(), e.to_string()))
}

/// NSE mixes JSON numbers and formatted strings such as `"22,147.90"`.
pub fn number_from_value(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().replace(',', "").parse().ok()))
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    number_from_value(&v)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {v}")))
}
