//! VTODO → task.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::cache::{ALL_PROJECTS, UNAFFILIATED};
use crate::task::{Annotation, Priority, Task, TaskStatus};
use crate::todo::{Todo, TodoStatus};

/// Everything besides the VTODO itself that shapes the resulting task.
#[derive(Debug, Clone)]
pub struct ImportContext<'a> {
    /// Target project. The virtual projects mean "no project".
    pub project: Option<&'a str>,
    /// Uuid of the task being replaced, if any.
    pub uuid: Option<&'a str>,
    /// Cached record of that task; its annotation timestamps are reused.
    pub previous: Option<&'a Task>,
    /// Zone for all-day and floating values.
    pub tz: Tz,
    /// Stamp `start` when a VTODO goes IN-PROCESS without a DTSTART.
    pub auto_start: bool,
    /// Stand-in for a missing DTSTAMP.
    pub now: DateTime<Utc>,
}

/// Build the task payload for `task import`.
pub fn to_task(todo: &Todo, ctx: &ImportContext) -> Task {
    let dtstamp = todo.dtstamp.unwrap_or(ctx.now);

    let mut task = Task {
        uuid: ctx.uuid.map(str::to_string),
        project: ctx
            .project
            .filter(|p| *p != ALL_PROJECTS && *p != UNAFFILIATED)
            .map(str::to_string),
        description: todo
            .summary
            .clone()
            .unwrap_or_else(|| "(No title)".to_string()),
        entry: todo.dtstamp,
        modified: todo.last_modified,
        start: todo.dtstart.as_ref().and_then(|t| t.to_utc(ctx.tz)),
        due: todo.due.as_ref().and_then(|t| t.to_utc(ctx.tz)),
        end: todo.completed,
        tags: (!todo.categories.is_empty()).then(|| todo.categories.clone()),
        priority: todo.priority.map(priority_from_ics),
        annotations: todo
            .description
            .as_deref()
            .map(|d| annotations(d, ctx.previous, dtstamp)),
        ..Default::default()
    };

    match todo.status {
        Some(TodoStatus::InProcess) => {
            task.status = TaskStatus::Pending;
            if ctx.auto_start && task.start.is_none() {
                task.start = Some(dtstamp);
            }
        }
        Some(TodoStatus::NeedsAction) | None => task.status = TaskStatus::Pending,
        Some(TodoStatus::Completed) => {
            task.status = TaskStatus::Completed;
            task.end.get_or_insert(dtstamp);
        }
        Some(TodoStatus::Cancelled) => {
            task.status = TaskStatus::Deleted;
            task.end.get_or_insert(dtstamp);
        }
    }

    task
}

/// Below 3 is high, 4-6 medium, everything else (including 3 and 7) low.
pub fn priority_from_ics(priority: u32) -> Priority {
    if priority < 3 {
        Priority::H
    } else if 3 < priority && priority < 7 {
        Priority::M
    } else {
        Priority::L
    }
}

/// One annotation per non-empty line.
///
/// Taskwarrior refuses two annotations with the same timestamp on one task,
/// so new lines get `dtstamp + position` seconds. Lines whose text matches
/// an annotation of the previous version keep that annotation's timestamp;
/// each previous annotation is claimed at most once.
fn annotations(description: &str, previous: Option<&Task>, dtstamp: DateTime<Utc>) -> Vec<Annotation> {
    let known = previous
        .and_then(|t| t.annotations.as_deref())
        .unwrap_or_default();
    let mut claimed = vec![false; known.len()];

    description
        .split('\n')
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| {
            let reused = (0..known.len()).find(|&j| !claimed[j] && known[j].description == line);
            let entry = match reused {
                Some(j) => {
                    claimed[j] = true;
                    known[j].entry
                }
                None => dtstamp + Duration::seconds(i as i64),
            };
            Annotation {
                description: line.to_string(),
                entry,
            }
        })
        .collect()
}
