//! Temporal literal parsing.
//!
//! Turns the engine's textual dates and timestamps into absolute UTC instants.
//! Only whole dates and timestamps are eligible; anything ambiguous returns
//! `None` and the caller keeps the original text.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

/// `YYYY-MM-DD[ HH:MM[:SS[.fffffffff]]][ zone]`
static TEMPORAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(?:[ T](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?)?(?:\s*(\S.*))?$",
    )
    .expect("temporal pattern is valid")
});

/// `+HH:MM`, `-HHMM`
static OFFSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])(\d{2}):?(\d{2})$").expect("offset pattern is valid")
});

/// Temporal column families eligible for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    /// `date`: calendar date, midnight UTC by convention.
    Date,
    /// `timestamp`: wall clock, UTC by convention unless a zone is present.
    Timestamp,
    /// `timestamp with time zone`: converted only when the zone is explicit.
    TimestampWithZone,
}

/// Parses `raw` as the given kind and normalizes it to UTC.
pub fn parse_temporal(kind: TemporalKind, raw: &str) -> Option<DateTime<Utc>> {
    let caps = TEMPORAL_RE.captures(raw.trim())?;

    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;

    let time = match (caps.get(4), caps.get(5)) {
        (Some(h), Some(m)) => {
            let seconds: u32 = caps.get(6).map_or(Some(0), |s| s.as_str().parse().ok())?;
            let nanos: u32 = caps.get(7).map_or(Some(0), |f| fraction_nanos(f.as_str()))?;
            Some(NaiveTime::from_hms_nano_opt(
                h.as_str().parse().ok()?,
                m.as_str().parse().ok()?,
                seconds,
                nanos,
            )?)
        }
        _ => None,
    };
    let zone = caps.get(8).map(|z| z.as_str().trim());

    match (kind, time, zone) {
        (TemporalKind::Date, None, None) => Some(date.and_hms_opt(0, 0, 0)?.and_utc()),
        (TemporalKind::Timestamp, Some(time), None) => Some(date.and_time(time).and_utc()),
        (TemporalKind::Timestamp | TemporalKind::TimestampWithZone, Some(time), Some(zone)) => {
            to_utc(date.and_time(time), zone)
        }
        _ => None,
    }
}

/// Right-pads fractional seconds to nanoseconds.
fn fraction_nanos(digits: &str) -> Option<u32> {
    let padded = format!("{digits:0<9}");
    padded.parse().ok()
}

/// Applies an explicit zone designator to a wall-clock time.
fn to_utc(local: NaiveDateTime, zone: &str) -> Option<DateTime<Utc>> {
    if zone == "Z" || zone == "UTC" {
        return Some(local.and_utc());
    }

    if let Some(caps) = OFFSET_RE.captures(zone) {
        let hours: i32 = caps[2].parse().ok()?;
        let minutes: i32 = caps[3].parse().ok()?;
        let mut seconds = hours * 3600 + minutes * 60;
        if &caps[1] == "-" {
            seconds = -seconds;
        }
        let offset = FixedOffset::east_opt(seconds)?;
        return offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc));
    }

    // GMT+1 style designators are not SQL zone syntax.
    if zone.starts_with("GMT") || zone.starts_with("UTC") {
        return None;
    }

    let tz: Tz = zone.parse().ok()?;
    // Nonexistent or ambiguous local times (DST transitions) stay text.
    tz.from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
