//! Task → VTODO.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::convert::uid_for;
use crate::error::{IcsTaskError, IcsTaskResult};
use crate::recurrence::Recurrence;
use crate::task::{Priority, Task, TaskStatus};
use crate::todo::{Todo, TodoStatus, TodoTime};

/// Translate one task. Fails only for a `recur` value the recurrence codec
/// does not understand.
pub fn to_todo(task: &Task, tz: Tz, host: &str) -> IcsTaskResult<Todo> {
    let uuid = task
        .uuid
        .as_deref()
        .ok_or_else(|| IcsTaskError::NotFound(format!("uuid of task '{}'", task.description)))?;

    let rrule = task
        .recur
        .as_deref()
        .map(Recurrence::from_recur)
        .transpose()?;

    let description = task.annotations.as_ref().map(|annotations| {
        annotations
            .iter()
            .map(|a| a.description.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    });

    Ok(Todo {
        uid: uid_for(uuid, host),
        dtstamp: task.entry,
        last_modified: task.modified,
        dtstart: task.start.map(|dt| TodoTime::in_zone(&dt, tz)),
        due: task.due.map(|dt| due_time(&dt, tz)),
        completed: task.end,
        summary: Some(task.description.clone()),
        categories: task.tags.clone().unwrap_or_default(),
        priority: task.priority.map(priority_to_ics),
        status: Some(status_to_ics(task.status, task.start.is_some())),
        description,
        rrule,
    })
}

/// Due dates at local midnight are all-day values.
fn due_time(dt: &DateTime<Utc>, tz: Tz) -> TodoTime {
    let local = dt.with_timezone(&tz);
    if local.time() == NaiveTime::MIN {
        TodoTime::Date(local.date_naive())
    } else {
        TodoTime::in_zone(dt, tz)
    }
}

pub fn priority_to_ics(priority: Priority) -> u32 {
    match priority {
        Priority::H => 1,
        Priority::M => 5,
        Priority::L => 9,
    }
}

/// Open tasks are IN-PROCESS once started.
pub fn status_to_ics(status: TaskStatus, started: bool) -> TodoStatus {
    match status {
        TaskStatus::Pending | TaskStatus::Waiting | TaskStatus::Recurring => {
            if started {
                TodoStatus::InProcess
            } else {
                TodoStatus::NeedsAction
            }
        }
        TaskStatus::Completed => TodoStatus::Completed,
        TaskStatus::Deleted => TodoStatus::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Frequency;
    use crate::task::Annotation;
    use chrono::{NaiveDate, TimeZone};

    fn make_test_task() -> Task {
        Task {
            uuid: Some("4a5b6c7d-1e2f-4a3b-8c9d-0e1f2a3b4c5d".to_string()),
            description: "Write report".to_string(),
            entry: Some(Utc.with_ymd_and_hms(2024, 1, 5, 9, 30, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_task() {
        let todo = to_todo(&make_test_task(), Tz::UTC, "host").unwrap();

        assert_eq!(todo.uid, "4a5b6c7d-1e2f-4a3b-8c9d-0e1f2a3b4c5d@host");
        assert_eq!(todo.summary.as_deref(), Some("Write report"));
        assert_eq!(todo.dtstamp, Some(Utc.with_ymd_and_hms(2024, 1, 5, 9, 30, 0).unwrap()));
        assert_eq!(todo.status, Some(TodoStatus::NeedsAction));
        assert!(todo.categories.is_empty());
        assert_eq!(todo.priority, None);
        assert_eq!(todo.description, None);
        assert_eq!(todo.rrule, None);
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(priority_to_ics(Priority::H), 1);
        assert_eq!(priority_to_ics(Priority::M), 5);
        assert_eq!(priority_to_ics(Priority::L), 9);
    }

    #[test]
    fn test_status_table() {
        assert_eq!(status_to_ics(TaskStatus::Pending, false), TodoStatus::NeedsAction);
        assert_eq!(status_to_ics(TaskStatus::Pending, true), TodoStatus::InProcess);
        assert_eq!(status_to_ics(TaskStatus::Waiting, true), TodoStatus::InProcess);
        assert_eq!(status_to_ics(TaskStatus::Waiting, false), TodoStatus::NeedsAction);
        assert_eq!(status_to_ics(TaskStatus::Completed, true), TodoStatus::Completed);
        assert_eq!(status_to_ics(TaskStatus::Deleted, false), TodoStatus::Cancelled);
    }

    #[test]
    fn test_due_at_local_midnight_is_all_day() {
        let tz = chrono_tz::Europe::Berlin;
        let mut task = make_test_task();
        // 2024-01-10 00:00 in Berlin
        task.due = Some(Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap());

        let todo = to_todo(&task, tz, "host").unwrap();
        assert_eq!(
            todo.due,
            Some(TodoTime::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()))
        );
    }

    #[test]
    fn test_due_with_time_of_day_is_date_time() {
        let tz = chrono_tz::Europe::Berlin;
        let mut task = make_test_task();
        task.due = Some(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());

        let todo = to_todo(&task, tz, "host").unwrap();
        match todo.due {
            Some(TodoTime::DateTimeZoned { datetime, tzid }) => {
                assert_eq!(tzid, "Europe/Berlin");
                assert_eq!(datetime.format("%Y%m%dT%H%M%S").to_string(), "20240110T010000");
            }
            other => panic!("Expected DateTimeZoned, got {:?}", other),
        }
    }

    #[test]
    fn test_annotations_join_in_order() {
        let mut task = make_test_task();
        task.annotations = Some(vec![
            Annotation {
                description: "first".to_string(),
                entry: Utc.with_ymd_and_hms(2024, 1, 5, 9, 31, 0).unwrap(),
            },
            Annotation {
                description: "second".to_string(),
                entry: Utc.with_ymd_and_hms(2024, 1, 5, 9, 32, 0).unwrap(),
            },
        ]);

        let todo = to_todo(&task, Tz::UTC, "host").unwrap();
        assert_eq!(todo.description.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_recur_becomes_rrule() {
        let mut task = make_test_task();
        task.recur = Some("2w".to_string());

        let todo = to_todo(&task, Tz::UTC, "host").unwrap();
        let rrule = todo.rrule.unwrap();
        assert_eq!(rrule.frequency, Frequency::Weekly);
        assert_eq!(rrule.interval, 2);
    }

    #[test]
    fn test_unsupported_recur_fails_the_task() {
        let mut task = make_test_task();
        task.recur = Some("bogus".to_string());

        assert!(matches!(
            to_todo(&task, Tz::UTC, "host"),
            Err(IcsTaskError::UnsupportedRecurrence(_))
        ));
    }
}
