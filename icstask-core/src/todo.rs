//! Calendar to-do items.
//!
//! `Todo` is the VTODO side of the conversion. It carries exactly the
//! properties icstask maps, and is turned into iCalendar text (and back) by
//! the `ics` module.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::recurrence::Recurrence;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Todo {
    pub uid: String,
    pub dtstamp: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub dtstart: Option<TodoTime>,
    pub due: Option<TodoTime>,
    pub completed: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub priority: Option<u32>,
    pub status: Option<TodoStatus>,
    pub description: Option<String>,
    /// Emitted as RRULE. Parsed documents leave this empty.
    pub rrule: Option<Recurrence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    NeedsAction,
    InProcess,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub fn as_ics_str(&self) -> &'static str {
        match self {
            TodoStatus::NeedsAction => "NEEDS-ACTION",
            TodoStatus::InProcess => "IN-PROCESS",
            TodoStatus::Completed => "COMPLETED",
            TodoStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s {
            "NEEDS-ACTION" => Some(TodoStatus::NeedsAction),
            "IN-PROCESS" => Some(TodoStatus::InProcess),
            "COMPLETED" => Some(TodoStatus::Completed),
            "CANCELLED" => Some(TodoStatus::Cancelled),
            _ => None,
        }
    }
}

/// A DTSTART or DUE value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoTime {
    /// All-day value (`VALUE=DATE`)
    Date(NaiveDate),
    /// UTC date-time (`Z` suffix)
    DateTimeUtc(DateTime<Utc>),
    /// Date-time without zone information
    DateTimeFloating(NaiveDateTime),
    /// Local date-time with a `TZID` parameter
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl TodoTime {
    /// Express an instant in `tz`. UTC stays a `Z` value, any other zone
    /// becomes a `TZID` value.
    pub fn in_zone(dt: &DateTime<Utc>, tz: Tz) -> Self {
        if tz == Tz::UTC {
            TodoTime::DateTimeUtc(*dt)
        } else {
            TodoTime::DateTimeZoned {
                datetime: dt.with_timezone(&tz).naive_local(),
                tzid: tz.name().to_string(),
            }
        }
    }

    /// Resolve to an instant. Dates mean local midnight and floating values
    /// local time, both in `tz`; zoned values use their own TZID when known.
    pub fn to_utc(&self, tz: Tz) -> Option<DateTime<Utc>> {
        match self {
            TodoTime::Date(d) => local_to_utc(&d.and_time(NaiveTime::MIN), tz),
            TodoTime::DateTimeUtc(dt) => Some(*dt),
            TodoTime::DateTimeFloating(dt) => local_to_utc(dt, tz),
            TodoTime::DateTimeZoned { datetime, tzid } => {
                let zone = tzid.parse::<Tz>().unwrap_or(tz);
                local_to_utc(datetime, zone)
            }
        }
    }
}

/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Times skipped by a DST gap are read with the offset in force before the
/// gap, which lands as far past the gap as they were into it.
fn local_to_utc(dt: &NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(dt) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before = tz
                .offset_from_local_datetime(&(*dt - Duration::days(1)))
                .earliest()?
                .fix();
            let resolved = before.from_local_datetime(dt).single()?.with_timezone(&Utc);
            log::warn!(
                "{} does not exist in {}, using {}",
                dt,
                tz.name(),
                resolved.with_timezone(&tz)
            );
            Some(resolved)
        }
    }
}
