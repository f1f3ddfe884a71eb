//! IST session clock: which trading day a request reports on, and whether the
//! cash market is still open.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::config::{MARKET_CLOSE_HOUR, MARKET_CLOSE_MINUTE};
use crate::types::MarketStatus;

/// NSE trades on Asia/Kolkata time (UTC+5:30, no DST).
pub const IST: Tz = chrono_tz::Asia::Kolkata;

pub fn now_ist() -> DateTime<Tz> {
    Utc::now().with_timezone(&IST)
}

fn market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(MARKET_CLOSE_HOUR, MARKET_CLOSE_MINUTE, 0).unwrap_or_default()
}

/// True strictly before 15:30 local.
pub fn before_market_close(now: &DateTime<Tz>) -> bool {
    now.time() < market_close()
}

/// The last completed session: yesterday until 15:30, today from 15:30 on.
pub fn effective_trading_date(now: &DateTime<Tz>) -> NaiveDate {
    let today = now.date_naive();
    if before_market_close(now) {
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    } else {
        today
    }
}

/// `Closed` only once the clock is past 15:30:00; 15:30:00 itself is still `Open`.
pub fn market_status(now: &DateTime<Tz>) -> MarketStatus {
    if now.time() > market_close() {
        MarketStatus::Closed
    } else {
        MarketStatus::Open
    }
}

/// `DD-Mon-YYYY`, as the announcements endpoint expects.
pub fn format_query_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// `DD Mon YYYY, HH:MM AM`
pub fn format_updated_at(now: &DateTime<Tz>) -> String {
    now.format("%d %b %Y, %I:%M %p").to_string()
}
