//! ICS parsing using the icalendar crate's parser.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{IcsTaskError, IcsTaskResult};
use crate::todo::{Todo, TodoStatus, TodoTime};

/// Parse every VTODO in an iCalendar document.
///
/// Other components (VEVENT, VTIMEZONE, ...) are ignored. Non-UTC stamps
/// and floating values are resolved in `tz`.
pub fn parse_todos(content: &str, tz: Tz) -> IcsTaskResult<Vec<Todo>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| IcsTaskError::IcsParse(e.to_string()))?;
    let mut categories = raw_categories(&unfolded).into_iter();

    Ok(calendar
        .components
        .iter()
        .filter(|c| c.name == "VTODO")
        .map(|vtodo| parse_vtodo(vtodo, categories.next().unwrap_or_default(), tz))
        .collect())
}

fn parse_vtodo(vtodo: &Component, categories: Vec<String>, tz: Tz) -> Todo {
    let uid = vtodo
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .unwrap_or_default();

    // The parser has already unescaped TEXT values
    let summary = vtodo.find_prop("SUMMARY").map(|p| p.val.to_string());
    let description = vtodo.find_prop("DESCRIPTION").map(|p| p.val.to_string());

    let priority = vtodo
        .find_prop("PRIORITY")
        .and_then(|p| p.val.as_ref().trim().parse().ok());

    let status = vtodo
        .find_prop("STATUS")
        .and_then(|p| TodoStatus::from_ics_str(p.val.as_ref().trim()));

    Todo {
        uid,
        dtstamp: utc_property(vtodo, "DTSTAMP", tz),
        last_modified: utc_property(vtodo, "LAST-MODIFIED", tz),
        dtstart: time_property(vtodo, "DTSTART"),
        due: time_property(vtodo, "DUE"),
        completed: utc_property(vtodo, "COMPLETED", tz),
        summary,
        categories,
        priority,
        status,
        description,
        // RRULEs are not translated back into Taskwarrior recurrences
        rrule: None,
    }
}

fn time_property(vtodo: &Component, name: &str) -> Option<TodoTime> {
    vtodo.find_prop(name).and_then(parse_time_property)
}

fn utc_property(vtodo: &Component, name: &str, tz: Tz) -> Option<DateTime<Utc>> {
    time_property(vtodo, name).and_then(|t| t.to_utc(tz))
}

/// Parse a date or date-time property, preserving timezone info.
///
/// Handles:
/// - VALUE=DATE: `DUE;VALUE=DATE:20240108`
/// - TZID parameter: `DUE;TZID=Europe/Berlin:20240108T100000`
/// - UTC: `DUE:20240108T100000Z`
/// - Floating: `DUE:20240108T100000`
fn parse_time_property(prop: &Property) -> Option<TodoTime> {
    if let Ok(dpt) = DatePerhapsTime::try_from(prop) {
        return Some(to_todo_time(dpt));
    }

    // Fall back to reading the raw value, e.g. a date without VALUE=DATE
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let s = prop.val.as_ref().trim();
    if let Some(ref tz) = tzid {
        NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| TodoTime::DateTimeZoned {
                datetime: dt,
                tzid: tz.clone(),
            })
    } else if let Some(utc) = s.strip_suffix('Z') {
        NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| TodoTime::DateTimeUtc(dt.and_utc()))
    } else if s.len() == 8 {
        NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(TodoTime::Date)
    } else {
        NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
            .ok()
            .map(TodoTime::DateTimeFloating)
    }
}

/// Convert icalendar's DatePerhapsTime to our TodoTime, preserving timezone info
fn to_todo_time(dpt: DatePerhapsTime) -> TodoTime {
    match dpt {
        DatePerhapsTime::Date(d) => TodoTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => TodoTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => TodoTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                TodoTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// CATEGORIES values of every VTODO, in document order.
///
/// The parser unescapes TEXT values, which merges `a\,b` (one category)
/// with `a,b` (two). The list is therefore split on the raw content lines.
fn raw_categories(unfolded: &str) -> Vec<Vec<String>> {
    let mut todos = Vec::new();
    let mut current: Option<Vec<String>> = None;

    for line in unfolded.lines() {
        let line = line.trim_start();
        if line.eq_ignore_ascii_case("BEGIN:VTODO") {
            current = Some(Vec::new());
        } else if line.eq_ignore_ascii_case("END:VTODO") {
            todos.extend(current.take());
        } else if let Some(categories) = current.as_mut()
            && let Some(value) = categories_value(line)
        {
            categories.extend(split_text_list(value).into_iter().filter(|c| !c.is_empty()));
        }
    }

    todos
}

/// Value part of a CATEGORIES content line, skipping quoted parameters.
fn categories_value(line: &str) -> Option<&str> {
    let name = line.get(..10)?;
    if !name.eq_ignore_ascii_case("CATEGORIES") || !line[10..].starts_with([':', ';']) {
        return None;
    }

    let mut quoted = false;
    for (i, c) in line.char_indices().skip(10) {
        match c {
            '"' => quoted = !quoted,
            ':' if !quoted => return Some(&line[i + 1..]),
            _ => {}
        }
    }
    None
}

/// Undo RFC 5545 TEXT escaping (`\n`, `\,`, `\;`, `\\`).
fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split a comma-separated TEXT list, honouring escaped commas.
fn split_text_list(s: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            items.push(unescape_text(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(unescape_text(&current));

    items.into_iter().map(|s| s.trim().to_string()).collect()
}
