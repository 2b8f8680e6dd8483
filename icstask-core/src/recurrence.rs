//! Taskwarrior `recur` periods as iCalendar RRULEs.
//!
//! Only the encode direction exists: an RRULE coming from a calendar client
//! is never turned back into a `recur` value, since a generic rule does not
//! say which Taskwarrior unit suffix it came from.

use std::fmt;

use crate::error::{IcsTaskError, IcsTaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_ics_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

/// A recurrence rule reduced to frequency and interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub interval: u32,
}

/// Unit suffixes, longest first so `2weeks` is not read as `2week` + `s`.
const SUFFIXES: &[(&str, Frequency)] = &[
    ("months", Frequency::Monthly),
    ("month", Frequency::Monthly),
    ("weeks", Frequency::Weekly),
    ("years", Frequency::Yearly),
    ("week", Frequency::Weekly),
    ("year", Frequency::Yearly),
    ("days", Frequency::Daily),
    ("mo", Frequency::Monthly),
    ("w", Frequency::Weekly),
    ("y", Frequency::Yearly),
];

impl Recurrence {
    /// Parse a Taskwarrior `recur` value such as `weekly`, `3days` or `2w`.
    pub fn from_recur(recur: &str) -> IcsTaskResult<Self> {
        let recur = recur.trim();

        if recur == "weekly" {
            return Ok(Recurrence {
                frequency: Frequency::Weekly,
                interval: 1,
            });
        }

        let (prefix, frequency) = SUFFIXES
            .iter()
            .find_map(|(suffix, freq)| recur.strip_suffix(suffix).map(|p| (p, *freq)))
            .ok_or_else(|| IcsTaskError::UnsupportedRecurrence(recur.to_string()))?;

        let interval = if prefix.is_empty() {
            1
        } else {
            prefix
                .parse::<u32>()
                .map_err(|_| IcsTaskError::UnsupportedRecurrence(recur.to_string()))?
        };

        if interval == 0 {
            return Err(IcsTaskError::UnsupportedRecurrence(recur.to_string()));
        }

        Ok(Recurrence {
            frequency,
            interval,
        })
    }

    /// The RRULE value, e.g. `FREQ=WEEKLY;INTERVAL=2`.
    pub fn to_rrule(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency.as_ics_str())?;
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        Ok(())
    }
}
