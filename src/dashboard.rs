//! HTML rendering of a snapshot through the embedded `dashboard.html` template.

use chrono::DateTime;
use chrono_tz::Tz;
use minijinja::Environment;
use serde::Serialize;

use crate::error::Result;
use crate::snapshot::session::{format_updated_at, market_status};
use crate::snapshot::BuildOutcome;
use crate::types::{IndexQuote, MarketStatus, MoverEntry, PcrReading, ResultAnnouncement};

const TEMPLATE_NAME: &str = "dashboard.html";
const DASHBOARD_TEMPLATE: &str = include_str!("../templates/dashboard.html");

/// Flat context handed to the template.
#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub nifty50: &'a IndexQuote,
    pub banknifty: &'a IndexQuote,
    pub vix: &'a IndexQuote,
    pub other_indices: &'a [IndexQuote],
    pub gainers: &'a [MoverEntry],
    pub losers: &'a [MoverEntry],
    pub pcr: &'a PcrReading,
    pub pe_ratio: f64,
    pub results: &'a [ResultAnnouncement],
    pub updated_at: String,
    pub market_status: MarketStatus,
    /// Steps that failed, so the page can flag stale sections.
    pub unavailable: Vec<String>,
}

impl<'a> DashboardView<'a> {
    pub fn new(outcome: &'a BuildOutcome, now: &DateTime<Tz>) -> Self {
        let snapshot = &outcome.snapshot;
        Self {
            nifty50: &snapshot.nifty50,
            banknifty: &snapshot.banknifty,
            vix: &snapshot.vix,
            other_indices: &snapshot.other_indices,
            gainers: &snapshot.gainers,
            losers: &snapshot.losers,
            pcr: &snapshot.pcr,
            pe_ratio: snapshot.pe_ratio,
            results: &snapshot.results,
            updated_at: format_updated_at(now),
            market_status: market_status(now),
            unavailable: outcome.failures.iter().map(|f| f.step.to_string()).collect(),
        }
    }
}

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        Self::with_template(DASHBOARD_TEMPLATE)
    }

    pub fn with_template(source: &'static str) -> Result<Self> {
        let mut env = Environment::new();
        env.add_filter("fixed2", fixed2);
        env.add_filter("signed", signed);
        env.add_template(TEMPLATE_NAME, source)?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &DashboardView<'_>) -> Result<String> {
        let template = self.env.get_template(TEMPLATE_NAME)?;
        Ok(template.render(view)?)
    }
}

fn fixed2(v: f64) -> String {
    format!("{v:.2}")
}

fn signed(v: f64) -> String {
    format!("{v:+.2}")
}
