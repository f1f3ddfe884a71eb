use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{indices, PCR_SYMBOL};
use crate::error::{AppError, Result};
use crate::nse::models::{
    decode, AllIndicesResponse, MoversResponse, OptionChainResponse, PeResponse, RawAnnouncement,
};
use crate::nse::{Endpoint, MarketDataSource};
use crate::snapshot::extract::{
    find_pe_ratio, pcr_reading, select_indices, top_movers, upcoming_results,
};
use crate::snapshot::session::{before_market_close, effective_trading_date, format_query_date};
use crate::types::{
    IndexBoard, MarketSnapshot, MoverDirection, MoverEntry, PcrReading, ResultAnnouncement,
};

/// What to do with the remaining steps once one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Keep what was gathered so far and skip the rest.
    #[default]
    StopOnFirstFailure,
    /// Run every step; each failure leaves only its own fields at default.
    AttemptAll,
}

impl FromStr for FetchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop_on_first_failure" | "stop" => Ok(FetchPolicy::StopOnFirstFailure),
            "attempt_all" | "all" => Ok(FetchPolicy::AttemptAll),
            other => Err(format!(
                "FETCH_POLICY must be stop_on_first_failure or attempt_all, got {other:?}"
            )),
        }
    }
}

/// The upstream calls, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Indices,
    Gainers,
    Losers,
    Pcr,
    PeRatio,
    Results,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Indices,
        Step::Gainers,
        Step::Losers,
        Step::Pcr,
        Step::PeRatio,
        Step::Results,
    ];
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Indices => "indices",
            Step::Gainers => "gainers",
            Step::Losers => "losers",
            Step::Pcr => "pcr",
            Step::PeRatio => "pe_ratio",
            Step::Results => "results",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: Step,
    pub error: AppError,
}

impl Serialize for StepFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StepFailure", 3)?;
        s.serialize_field("step", &self.step)?;
        s.serialize_field("kind", &self.error.kind())?;
        s.serialize_field("message", &self.error.to_string())?;
        s.end()
    }
}

/// A snapshot plus the steps that did not contribute to it.
#[derive(Debug, Serialize)]
pub struct BuildOutcome {
    pub effective_date: NaiveDate,
    pub snapshot: MarketSnapshot,
    pub failures: Vec<StepFailure>,
}

impl BuildOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// The result of one step, applied to the previous snapshot to get the next.
enum Patch {
    Indices(IndexBoard),
    Gainers(Vec<MoverEntry>),
    Losers(Vec<MoverEntry>),
    Pcr(PcrReading),
    PeRatio(f64),
    Results(Vec<ResultAnnouncement>),
    Unchanged,
}

impl Patch {
    fn apply(self, snapshot: MarketSnapshot) -> MarketSnapshot {
        match self {
            Patch::Indices(board) => MarketSnapshot {
                nifty50: board.nifty50,
                banknifty: board.banknifty,
                vix: board.vix,
                other_indices: board.other_indices,
                ..snapshot
            },
            Patch::Gainers(gainers) => MarketSnapshot { gainers, ..snapshot },
            Patch::Losers(losers) => MarketSnapshot { losers, ..snapshot },
            Patch::Pcr(pcr) => MarketSnapshot { pcr, ..snapshot },
            Patch::PeRatio(pe_ratio) => MarketSnapshot { pe_ratio, ..snapshot },
            Patch::Results(results) => MarketSnapshot { results, ..snapshot },
            Patch::Unchanged => snapshot,
        }
    }
}

/// What a step got done, and the error that cut it short if any.
struct StepOutput {
    patch: Patch,
    error: Option<AppError>,
}

impl From<Result<Patch>> for StepOutput {
    fn from(result: Result<Patch>) -> Self {
        match result {
            Ok(patch) => StepOutput { patch, error: None },
            Err(e) => StepOutput {
                patch: Patch::Unchanged,
                error: Some(e),
            },
        }
    }
}

/// Assembles the end-of-day snapshot from the NSE endpoints, one call at a time.
#[derive(Clone)]
pub struct SnapshotBuilder {
    source: Arc<dyn MarketDataSource>,
    policy: FetchPolicy,
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn MarketDataSource>, policy: FetchPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Never fails: upstream problems come back as `failures` next to a
    /// snapshot whose untouched fields keep their defaults.
    pub async fn build(&self, now: DateTime<Tz>) -> BuildOutcome {
        let effective_date = effective_trading_date(&now);
        let span = info_span!("snapshot", effective_date = %effective_date);

        async move {
            if before_market_close(&now) {
                info!("Market still open - using previous close data");
            }
            self.run_steps(effective_date).await
        }
        .instrument(span)
        .await
    }

    async fn run_steps(&self, effective_date: NaiveDate) -> BuildOutcome {
        let query_date = format_query_date(effective_date);
        let mut snapshot = MarketSnapshot::default();
        let mut failures = Vec::new();

        for step in Step::ALL {
            let StepOutput { patch, error } = self.run_step(step, &query_date).await;
            snapshot = patch.apply(snapshot);

            if let Some(e) = error {
                warn!(step = %step, kind = ?e.kind(), "step failed: {e}");
                failures.push(StepFailure { step, error: e });
                if self.policy == FetchPolicy::StopOnFirstFailure {
                    break;
                }
            }
        }

        match failures.as_slice() {
            [] => debug!("snapshot complete"),
            [only] if self.policy == FetchPolicy::StopOnFirstFailure => {
                error!("Error fetching EOD data: {}", only.error);
            }
            many => warn!("{} of {} steps failed", many.len(), Step::ALL.len()),
        }

        BuildOutcome {
            effective_date,
            snapshot,
            failures,
        }
    }

    async fn run_step(&self, step: Step, query_date: &str) -> StepOutput {
        match step {
            Step::Indices => self.fetch_indices().await.into(),
            Step::Gainers => self
                .fetch_movers(MoverDirection::Gainers)
                .await
                .map(Patch::Gainers)
                .into(),
            Step::Losers => self
                .fetch_movers(MoverDirection::Losers)
                .await
                .map(Patch::Losers)
                .into(),
            Step::Pcr => self.fetch_pcr().await.into(),
            Step::PeRatio => self.fetch_pe_ratio().await.into(),
            Step::Results => self.fetch_results(query_date).await,
        }
    }

    async fn fetch_indices(&self) -> Result<Patch> {
        let body: AllIndicesResponse = self.fetch(&Endpoint::AllIndices).await?;
        Ok(Patch::Indices(select_indices(body.data)?))
    }

    async fn fetch_movers(&self, direction: MoverDirection) -> Result<Vec<MoverEntry>> {
        let body: MoversResponse = self.fetch(&Endpoint::Movers(direction)).await?;
        let rows = top_movers(direction, body.nifty.data)?;
        debug!(
            leader = rows.first().and_then(MoverEntry::symbol).unwrap_or("-"),
            "{} {direction}",
            rows.len()
        );
        Ok(rows)
    }

    async fn fetch_pcr(&self) -> Result<Patch> {
        let endpoint = Endpoint::OptionChain {
            symbol: PCR_SYMBOL.to_string(),
        };
        let body: OptionChainResponse = self.fetch(&endpoint).await?;
        Ok(Patch::Pcr(pcr_reading(body.filtered.pcr.value)))
    }

    async fn fetch_pe_ratio(&self) -> Result<Patch> {
        let body: PeResponse = self.fetch(&Endpoint::PeRatios).await?;
        match find_pe_ratio(&body.data, indices::NIFTY_50)? {
            Some(pe) => Ok(Patch::PeRatio(pe)),
            None => {
                debug!("no P/E row for {}", indices::NIFTY_50);
                Ok(Patch::Unchanged)
            }
        }
    }

    /// Results already converted stay in the patch even when a later row fails.
    async fn fetch_results(&self, query_date: &str) -> StepOutput {
        let endpoint = Endpoint::CorporateAnnouncements {
            date: query_date.to_string(),
        };
        let rows: Vec<RawAnnouncement> = match self.fetch(&endpoint).await {
            Ok(rows) => rows,
            Err(e) => {
                return StepOutput {
                    patch: Patch::Unchanged,
                    error: Some(e),
                }
            }
        };
        let (results, error) = upcoming_results(rows);
        StepOutput {
            patch: Patch::Results(results),
            error,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        let body = self.source.fetch_json(endpoint).await?;
        decode(endpoint, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::nse::fixtures::{Canned, CannedSource};
    use crate::snapshot::session::IST;
    use crate::types::Sentiment;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, m: u32) -> DateTime<Tz> {
        IST.with_ymd_and_hms(2026, 10, 17, h, m, 0).unwrap()
    }

    async fn build(source: CannedSource, policy: FetchPolicy, now: DateTime<Tz>) -> (BuildOutcome, Arc<CannedSource>) {
        let source = Arc::new(source);
        let builder = SnapshotBuilder::new(source.clone(), policy);
        (builder.build(now).await, source)
    }

    fn symbols(entries: &[MoverEntry]) -> Vec<&str> {
        entries.iter().filter_map(MoverEntry::symbol).collect()
    }

    #[tokio::test]
    async fn full_day_fills_every_field() {
        let (outcome, source) =
            build(CannedSource::full_day(), FetchPolicy::default(), at(16, 0)).await;
        let snap = &outcome.snapshot;

        assert!(!outcome.is_degraded());
        assert_eq!(outcome.effective_date, NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        assert_eq!(snap.nifty50.name, "Nifty 50");
        assert_eq!(snap.nifty50.price, 22147.9);
        assert_eq!(snap.banknifty.change, -80.0);
        assert_eq!(snap.vix.change_pct, 1.59);
        let others: Vec<_> = snap.other_indices.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(others, vec!["AUTO", "IT"]);
        assert_eq!(symbols(&snap.gainers), vec!["G1", "G2", "G3", "G4", "G5"]);
        assert_eq!(symbols(&snap.losers), vec!["L1", "L2", "L3", "L4", "L5"]);
        assert_eq!(snap.pcr, PcrReading { value: 1.05, sentiment: Sentiment::Neutral });
        assert_eq!(snap.pe_ratio, 22.35);
        assert_eq!(
            snap.results,
            vec![
                ResultAnnouncement { company: "INFY".into(), date: "17 Oct 2026".into() },
                ResultAnnouncement { company: "TCS".into(), date: "16 Oct 2026".into() },
            ]
        );
        assert_eq!(
            source.call_names(),
            vec![
                "allIndices",
                "gainers",
                "losers",
                "option-chain-indices",
                "market-data-pe",
                "corporate-announcements"
            ]
        );
    }

    #[tokio::test]
    async fn announcements_query_uses_effective_date() {
        let (_, source) = build(CannedSource::full_day(), FetchPolicy::default(), at(14, 0)).await;
        let last = source.calls().pop().unwrap();
        assert_eq!(last, Endpoint::CorporateAnnouncements { date: "16-Oct-2026".into() });

        let (_, source) = build(CannedSource::full_day(), FetchPolicy::default(), at(15, 30)).await;
        let last = source.calls().pop().unwrap();
        assert_eq!(last, Endpoint::CorporateAnnouncements { date: "17-Oct-2026".into() });
    }

    #[tokio::test]
    async fn failure_stops_remaining_steps_and_keeps_earlier_fields() {
        let source = CannedSource::full_day().with("option-chain-indices", Canned::Status(401));
        let (outcome, source) = build(source, FetchPolicy::StopOnFirstFailure, at(16, 0)).await;
        let snap = &outcome.snapshot;

        assert_eq!(snap.nifty50.name, "Nifty 50");
        assert_eq!(snap.gainers.len(), 5);
        assert_eq!(snap.losers.len(), 5);
        assert_eq!(snap.pcr, PcrReading::default());
        assert_eq!(snap.pcr.sentiment, Sentiment::NotAvailable);
        assert_eq!(snap.pe_ratio, 0.0);
        assert!(snap.results.is_empty());

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].step, Step::Pcr);
        assert_eq!(outcome.failures[0].error.kind(), ErrorKind::Network);
        assert_eq!(source.calls().len(), 4);
    }

    #[tokio::test]
    async fn first_call_failing_yields_default_snapshot() {
        let source = CannedSource::full_day().with("allIndices", Canned::NotJson);
        let (outcome, source) = build(source, FetchPolicy::StopOnFirstFailure, at(16, 0)).await;

        assert_eq!(outcome.snapshot, MarketSnapshot::default());
        assert_eq!(outcome.failures[0].error.kind(), ErrorKind::Parse);
        assert_eq!(source.calls().len(), 1);

        let v = serde_json::to_value(&outcome.snapshot).unwrap();
        for (key, value) in v.as_object().unwrap() {
            assert!(!value.is_null(), "{key} is null");
        }
    }

    #[tokio::test]
    async fn attempt_all_reports_every_failure() {
        let source = CannedSource::full_day()
            .with("gainers", Canned::NotJson)
            .json("market-data-pe", json!({"unexpected": true}));
        let (outcome, source) = build(source, FetchPolicy::AttemptAll, at(16, 0)).await;
        let snap = &outcome.snapshot;

        let failed: Vec<_> = outcome.failures.iter().map(|f| (f.step, f.error.kind())).collect();
        assert_eq!(
            failed,
            vec![(Step::Gainers, ErrorKind::Parse), (Step::PeRatio, ErrorKind::SchemaMismatch)]
        );
        assert!(snap.gainers.is_empty());
        assert_eq!(snap.losers.len(), 5);
        assert_eq!(snap.pcr.value, 1.05);
        assert_eq!(snap.pe_ratio, 0.0);
        assert_eq!(snap.results.len(), 2);
        assert_eq!(source.calls().len(), 6);
    }

    #[tokio::test]
    async fn pcr_sentiment_from_upstream_value() {
        let source = CannedSource::full_day()
            .json("option-chain-indices", json!({"filtered": {"PCR": {"value": 1.5}}}));
        let (outcome, _) = build(source, FetchPolicy::default(), at(16, 0)).await;
        assert_eq!(outcome.snapshot.pcr.sentiment, Sentiment::Bearish);
    }

    #[tokio::test]
    async fn seven_results_cut_to_five() {
        let rows: Vec<_> = (1..=7)
            .map(|i| json!({"symbol": format!("C{i}"), "subject": "Financial Results", "recDt": format!("{i:02}-Oct-2026")}))
            .collect();
        let source = CannedSource::full_day().json("corporate-announcements", json!(rows));
        let (outcome, _) = build(source, FetchPolicy::default(), at(16, 0)).await;

        let results = &outcome.snapshot.results;
        assert_eq!(results.len(), 5);
        let dates: Vec<_> = results.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["01 Oct 2026", "02 Oct 2026", "03 Oct 2026", "04 Oct 2026", "05 Oct 2026"]);
    }

    #[tokio::test]
    async fn missing_pe_row_keeps_zero_without_failure() {
        let source = CannedSource::full_day()
            .json("market-data-pe", json!({"data": [{"key": "NIFTY BANK", "pe": 15.2}]}));
        let (outcome, _) = build(source, FetchPolicy::default(), at(16, 0)).await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.snapshot.pe_ratio, 0.0);
        assert_eq!(outcome.snapshot.results.len(), 2);
    }

    #[tokio::test]
    async fn untracked_index_without_prices_does_not_fail_the_build() {
        let mut indices = crate::nse::fixtures::all_indices();
        indices["data"].as_array_mut().unwrap().push(json!({
            "index": "BHARAT BOND INDEX - APRIL 2030",
            "last": 1000.0,
            "variation": null,
            "percentChange": null
        }));
        let source = CannedSource::full_day().json("allIndices", indices);
        let (outcome, source) = build(source, FetchPolicy::default(), at(16, 0)).await;

        assert!(!outcome.is_degraded());
        assert_eq!(outcome.snapshot.nifty50.price, 22147.9);
        assert_eq!(outcome.snapshot.other_indices.len(), 2);
        assert_eq!(outcome.snapshot.gainers.len(), 5);
        assert_eq!(source.calls().len(), 6);
    }

    #[tokio::test]
    async fn odd_mover_rows_beyond_five_are_ignored() {
        let mut losers = crate::nse::fixtures::movers("L", 5);
        losers["NIFTY"]["data"].as_array_mut().unwrap().push(json!(null));
        let source = CannedSource::full_day().json("losers", losers);
        let (outcome, _) = build(source, FetchPolicy::default(), at(16, 0)).await;

        assert!(!outcome.is_degraded());
        assert_eq!(symbols(&outcome.snapshot.losers), vec!["L1", "L2", "L3", "L4", "L5"]);
    }

    #[tokio::test]
    async fn bad_result_date_keeps_earlier_results() {
        let rows = json!([
            {"symbol": "A", "subject": "Financial Results", "recDt": "01-Oct-2026"},
            {"symbol": "B", "subject": "Financial Results", "recDt": "02-Oct-2026"},
            {"symbol": "C", "subject": "Financial Results", "recDt": ""}
        ]);
        let source = CannedSource::full_day().json("corporate-announcements", rows);
        let (outcome, _) = build(source, FetchPolicy::default(), at(16, 0)).await;

        let companies: Vec<_> = outcome.snapshot.results.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(companies, vec!["A", "B"]);
        assert_eq!(outcome.snapshot.pe_ratio, 22.35);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].step, Step::Results);
        assert_eq!(outcome.failures[0].error.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn failure_serializes_with_kind() {
        let failure = StepFailure {
            step: Step::PeRatio,
            error: AppError::schema("market-data-pe", "missing field `data`"),
        };
        let v = serde_json::to_value(&failure).unwrap();
        assert_eq!(v["step"], "pe_ratio");
        assert_eq!(v["kind"], "schema_mismatch");
        assert_eq!(v["message"], "Schema mismatch in market-data-pe: missing field `data`");
    }

    #[test]
    fn policy_parses_from_env_strings() {
        assert_eq!("attempt_all".parse::<FetchPolicy>().unwrap(), FetchPolicy::AttemptAll);
        assert_eq!(" STOP_ON_FIRST_FAILURE ".parse::<FetchPolicy>().unwrap(), FetchPolicy::StopOnFirstFailure);
        assert!("sometimes".parse::<FetchPolicy>().is_err());
    }
}
