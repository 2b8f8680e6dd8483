//! Taskwarrior task records.
//!
//! These mirror the JSON objects produced by `task export` and accepted by
//! `task import`. Fields Taskwarrior computes on its own (`id`, `urgency`,
//! `mask`, ...) are not modelled and are dropped when reading an export.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IcsTaskError, IcsTaskResult};

/// Timestamp format used by Taskwarrior for every date field.
pub const TASK_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Fields are kept in alphabetical order: `task import` payloads are
/// serialized with sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,

    pub description: String,

    #[serde(default, with = "task_date::option", skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, with = "task_date::option", skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, with = "task_date::option", skip_serializing_if = "Option::is_none")]
    pub entry: Option<DateTime<Utc>>,
    #[serde(default, with = "task_date::option", skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// Set on instances generated from a recurring template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Free-form recurrence period, e.g. `weekly` or `2w`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recur: Option<String>,

    #[serde(default, with = "task_date::option", skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Assigned by Taskwarrior. Absent in import payloads for new tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl Task {
    /// Generated instances of a recurring task carry both `recur` and `parent`.
    pub fn is_recurrence_instance(&self) -> bool {
        self.recur.is_some() && self.parent.is_some()
    }

    /// Serialize as a single compact JSON object with sorted keys,
    /// the form handed to `task import`.
    pub fn to_import_json(&self) -> IcsTaskResult<String> {
        serde_json::to_string(self).map_err(|e| IcsTaskError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Waiting,
    Completed,
    Deleted,
    /// Template of a recurring task.
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    H,
    M,
    L,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub description: String,
    #[serde(with = "task_date")]
    pub entry: DateTime<Utc>,
}

/// Parse a Taskwarrior timestamp (`20240105T093000Z`).
pub fn parse_task_date(s: &str) -> IcsTaskResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TASK_DATE_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| IcsTaskError::Serialization(format!("Invalid task date '{s}': {e}")))
}

pub fn format_task_date(dt: &DateTime<Utc>) -> String {
    dt.format(TASK_DATE_FORMAT).to_string()
}

/// Serde adapter for Taskwarrior's compact UTC timestamps.
pub mod task_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_task_date(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_task_date(&s).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&crate::task::format_task_date(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| crate::task::parse_task_date(&s).map_err(de::Error::custom))
                .transpose()
        }
    }
}
