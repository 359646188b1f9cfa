//! Local-time helpers shared by the generator, reconciler and scheduler.
//!
//! Everything here works in the local time zone on purpose: dose times are
//! wall-clock times, and the date key must not drift to the previous or
//! next day near midnight the way a UTC conversion would.

use crate::{Error, Result};
use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

/// Format an instant as zero-padded 24-hour local `HH:MM`.
pub fn to_local_hhmm(t: &DateTime<Local>) -> String {
    t.format("%H:%M").to_string()
}

/// Parse an `HH:MM` string, rejecting anything else.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::InvalidRule(format!("invalid time {:?}, expected HH:MM", s)))
}

/// Combine an `HH:MM` string with a calendar date into a local instant,
/// seconds zeroed.
pub fn parse_hhmm_on_date(s: &str, date: NaiveDate) -> Result<DateTime<Local>> {
    let time = parse_hhmm(s)?;
    Ok(resolve_local(date.and_time(time)))
}

/// Today's calendar date as a `YYYY-MM-DD` key, local time zone.
pub fn today_date_key() -> String {
    date_key(Local::now().date_naive())
}

/// Format any calendar date as a `YYYY-MM-DD` key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The local calendar date an absolute instant falls on.
pub fn local_date_of(t: &DateTime<Utc>) -> NaiveDate {
    t.with_timezone(&Local).date_naive()
}

/// Map a naive local datetime to an instant.
///
/// DST-ambiguous wall times take the earliest offset; wall times inside a
/// spring-forward gap shift ahead one hour.
fn resolve_local(ndt: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&ndt) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let shifted = ndt + Duration::hours(1);
            match Local.from_local_datetime(&shifted) {
                LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t,
                LocalResult::None => Local.from_utc_datetime(&ndt),
            }
        }
    }
}
