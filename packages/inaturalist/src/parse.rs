//! Interpretation of iNaturalist observations.
//!
//! The evidence observation field decides whether a pulled observation is a
//! nest or an individual, and the Vespa-Watch ID field tells whether it was
//! created here in the first place.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use vespawatch_inaturalist_models::{EVIDENCE_NEST, InatObservation};
use vespawatch_observation_models::ObservationKind;

/// Zone for naive times when the observation names none we know.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::Brussels;

/// Naive formats accepted in `observed_on_string`, most precise first.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y/%m/%d %H:%M:%S %z"];

/// Nest when the evidence field says so, individual otherwise.
#[must_use]
pub fn observation_kind(obs: &InatObservation, evidence_field_id: i64) -> ObservationKind {
    match obs.field_value(evidence_field_id) {
        Some(v) if v.eq_ignore_ascii_case(EVIDENCE_NEST) => ObservationKind::Nest,
        _ => ObservationKind::Individual,
    }
}

/// Local observation ID stored on an observation pushed from here.
#[must_use]
pub fn vespawatch_id(obs: &InatObservation, id_field_id: i64) -> Option<i64> {
    obs.field_value(id_field_id)?.parse().ok()
}

/// The zone naive times of an observation are written in.
#[must_use]
pub fn observed_zone(obs: &InatObservation) -> Tz {
    obs.observed_time_zone
        .as_deref()
        .and_then(|name| name.trim().parse::<Tz>().ok())
        .unwrap_or(DEFAULT_TIME_ZONE)
}

/// Resolves a wall-clock time in `tz`. Times skipped by a DST jump move
/// forward an hour; repeated times take the earlier instant.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Works out when an observation was made.
///
/// Tries, in order: `time_observed_at`, `observed_on_string`, and the
/// broken-down `observed_on_details` (to the hour). Times without an
/// offset are read in the observation's `observed_time_zone`.
#[must_use]
pub fn observation_time(obs: &InatObservation) -> Option<DateTime<Utc>> {
    let tz = observed_zone(obs);

    obs.time_observed_at
        .as_deref()
        .and_then(|s| parse_datetime(s, tz))
        .or_else(|| {
            obs.observed_on_string
                .as_deref()
                .and_then(|s| parse_datetime(s, tz))
        })
        .or_else(|| {
            let details = obs.observed_on_details.as_ref()?;
            let date = match (details.year, details.month, details.day) {
                (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
                _ => details
                    .date
                    .as_deref()
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
            }?;
            localize(date.and_hms_opt(details.hour.unwrap_or(0), 0, 0)?, tz)
        })
}

/// Parses a date or date-time string in any of the accepted formats.
/// Strings without an offset are wall-clock times in `tz`.
#[must_use]
pub fn parse_datetime(s: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(naive, tz);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return localize(date.and_hms_opt(0, 0, 0)?, tz);
        }
    }

    None
}
