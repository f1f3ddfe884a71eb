use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Index quotes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_pct: f64,
}

/// Tracked index slots plus every other NIFTY-family index, in upstream order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexBoard {
    pub nifty50: IndexQuote,
    pub banknifty: IndexQuote,
    pub vix: IndexQuote,
    pub other_indices: Vec<IndexQuote>,
}

// ---------------------------------------------------------------------------
// Movers
// ---------------------------------------------------------------------------

/// One row of the gainers/losers feed. Kept as the upstream object so the
/// template can read whichever columns NSE publishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoverEntry(pub serde_json::Map<String, serde_json::Value>);

impl MoverEntry {
    pub fn symbol(&self) -> Option<&str> {
        self.0.get("symbol").and_then(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoverDirection {
    Gainers,
    Losers,
}

impl std::fmt::Display for MoverDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoverDirection::Gainers => write!(f, "gainers"),
            MoverDirection::Losers => write!(f, "losers"),
        }
    }
}

// ---------------------------------------------------------------------------
// Put-call ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
    #[default]
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sentiment::Bullish => "Bullish",
            Sentiment::Bearish => "Bearish",
            Sentiment::Neutral => "Neutral",
            Sentiment::NotAvailable => "N/A",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PcrReading {
    pub value: f64,
    pub sentiment: Sentiment,
}

// ---------------------------------------------------------------------------
// Corporate results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAnnouncement {
    pub company: String,
    /// `DD Mon YYYY`
    pub date: String,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the dashboard shows. Every field has a zero value so a failed
/// build still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub nifty50: IndexQuote,
    pub banknifty: IndexQuote,
    pub vix: IndexQuote,
    pub other_indices: Vec<IndexQuote>,
    pub gainers: Vec<MoverEntry>,
    pub losers: Vec<MoverEntry>,
    pub pcr: PcrReading,
    pub pe_ratio: f64,
    pub results: Vec<ResultAnnouncement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketStatus {
    Open,
    Closed,
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "Open"),
            MarketStatus::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_serializes_every_field() {
        let v = serde_json::to_value(MarketSnapshot::default()).unwrap();
        for key in [
            "nifty50", "banknifty", "vix", "other_indices", "gainers", "losers", "pcr", "pe_ratio",
            "results",
        ] {
            assert!(!v[key].is_null(), "{key} should never be null");
        }
        assert_eq!(v["pcr"]["value"], 0.0);
        assert_eq!(v["pcr"]["sentiment"], "N/A");
        assert_eq!(v["pe_ratio"], 0.0);
    }

    #[test]
    fn mover_entry_is_passed_through() {
        let raw = serde_json::json!({"symbol": "TCS", "ltp": 4100.5, "perChange": 3.2});
        let entry: MoverEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.symbol(), Some("TCS"));
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }
}
