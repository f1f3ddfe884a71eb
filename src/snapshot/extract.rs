use chrono::NaiveDate;
use serde_json::Value;

use crate::config::{indices, pcr_thresholds, MOVERS_LIMIT, RESULTS_LIMIT};
use crate::error::{AppError, Result};
use crate::nse::models::{number_from_value, RawAnnouncement, RawIndex};
use crate::nse::Endpoint;
use crate::types::{
    IndexBoard, IndexQuote, MoverDirection, MoverEntry, PcrReading, ResultAnnouncement, Sentiment,
};

enum Slot {
    Nifty50,
    BankNifty,
    Vix,
    Other,
}

/// Route each upstream index to its dashboard slot.
/// Exact names fill the three tracked slots; any other name containing
/// `NIFTY` joins `other_indices` with `NIFTY ` removed. Rows that match
/// neither are skipped without reading their prices.
pub fn select_indices(raw: Vec<RawIndex>) -> Result<IndexBoard> {
    let mut board = IndexBoard::default();

    for row in raw {
        let (slot, name) = match row.index.as_str() {
            indices::NIFTY_50 => (Slot::Nifty50, "Nifty 50".to_string()),
            indices::NIFTY_BANK => (Slot::BankNifty, "Bank Nifty".to_string()),
            indices::INDIA_VIX => (Slot::Vix, "India VIX".to_string()),
            name if name.contains(indices::FAMILY_MARKER) => {
                (Slot::Other, name.replace(indices::FAMILY_PREFIX, ""))
            }
            _ => continue,
        };

        let quote = index_quote(&row, name)?;
        match slot {
            Slot::Nifty50 => board.nifty50 = quote,
            Slot::BankNifty => board.banknifty = quote,
            Slot::Vix => board.vix = quote,
            Slot::Other => board.other_indices.push(quote),
        }
    }

    Ok(board)
}

fn index_quote(row: &RawIndex, name: String) -> Result<IndexQuote> {
    let number = |field: &str, v: &Value| {
        number_from_value(v).ok_or_else(|| {
            AppError::schema(
                Endpoint::AllIndices.name(),
                format!("{}: {field} is not a number: {v}", row.index),
            )
        })
    };

    Ok(IndexQuote {
        price: number("last", &row.last)?,
        change: number("variation", &row.variation)?,
        change_pct: number("percentChange", &row.percent_change)?,
        name,
    })
}

pub fn classify_pcr(value: f64) -> Sentiment {
    if value > pcr_thresholds::BEARISH_ABOVE {
        Sentiment::Bearish
    } else if value < pcr_thresholds::BULLISH_BELOW {
        Sentiment::Bullish
    } else {
        Sentiment::Neutral
    }
}

pub fn pcr_reading(value: f64) -> PcrReading {
    PcrReading {
        value,
        sentiment: classify_pcr(value),
    }
}

/// First five rows in upstream order. Rows past the cut are never typed.
pub fn top_movers(direction: MoverDirection, mut rows: Vec<Value>) -> Result<Vec<MoverEntry>> {
    rows.truncate(MOVERS_LIMIT);
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                AppError::schema(Endpoint::Movers(direction).name(), e.to_string())
            })
        })
        .collect()
}

/// First row whose key matches wins; the scan stops there.
pub fn find_pe_ratio(rows: &[Value], key: &str) -> Result<Option<f64>> {
    let Some(row) = rows.iter().find(|r| r.get("key").and_then(Value::as_str) == Some(key)) else {
        return Ok(None);
    };
    let pe = row.get("pe").unwrap_or(&Value::Null);
    number_from_value(pe).map(Some).ok_or_else(|| {
        AppError::schema(
            Endpoint::PeRatios.name(),
            format!("pe for {key} is not a number: {pe}"),
        )
    })
}

/// `17-Oct-2026` → `17 Oct 2026`
pub fn reformat_announcement_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), "%d-%b-%Y")
        .ok()
        .map(|d| d.format("%d %b %Y").to_string())
}

/// Announcements whose subject mentions `Result`, first five in feed order.
/// A bad row stops the list there: the rows before it are kept and the
/// error is returned next to them.
pub fn upcoming_results(rows: Vec<RawAnnouncement>) -> (Vec<ResultAnnouncement>, Option<AppError>) {
    let mut results = Vec::new();

    for row in rows
        .into_iter()
        .filter(|a| a.subject.contains("Result"))
        .take(RESULTS_LIMIT)
    {
        match result_announcement(row) {
            Ok(result) => results.push(result),
            Err(e) => return (results, Some(e)),
        }
    }

    (results, None)
}

fn result_announcement(row: RawAnnouncement) -> Result<ResultAnnouncement> {
    let endpoint = "corporate-announcements";

    let company = row
        .symbol
        .ok_or_else(|| AppError::schema(endpoint, "result announcement without symbol"))?;
    let raw_date = row
        .rec_dt
        .ok_or_else(|| AppError::schema(endpoint, format!("{company}: missing recDt")))?;
    let date = reformat_announcement_date(&raw_date).ok_or_else(|| {
        AppError::schema(endpoint, format!("{company}: recDt {raw_date:?} is not DD-Mon-YYYY"))
    })?;
    Ok(ResultAnnouncement { company, date })
}
