//! ICS generation.

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, Property, ValueType};

use crate::todo::{Todo, TodoTime};

const PRODID: &str = "-//icstask//icstask//EN";

/// Generate one VCALENDAR containing a VTODO per todo.
pub fn generate_ics(todos: &[Todo]) -> String {
    let mut cal = Calendar::new();

    for todo in todos {
        cal.push(build_vtodo(todo));
    }

    let cal = cal.done();
    normalize_ics(&cal.to_string())
}

fn build_vtodo(todo: &Todo) -> icalendar::Todo {
    let mut vtodo = icalendar::Todo::new();
    vtodo.uid(&todo.uid);

    // DTSTAMP is required; the icalendar crate fills in the current time
    // when it is missing
    if let Some(dtstamp) = todo.dtstamp {
        vtodo.add_property("DTSTAMP", format_utc(&dtstamp));
    }

    if let Some(last_modified) = todo.last_modified {
        vtodo.add_property("LAST-MODIFIED", format_utc(&last_modified));
    }

    if let Some(ref dtstart) = todo.dtstart {
        add_datetime_property(&mut vtodo, "DTSTART", dtstart);
    }

    if let Some(ref due) = todo.due {
        add_datetime_property(&mut vtodo, "DUE", due);
    }

    if let Some(completed) = todo.completed {
        vtodo.add_property("COMPLETED", format_utc(&completed));
    }

    if let Some(ref summary) = todo.summary {
        vtodo.summary(summary);
    }

    // One property per tag; the icalendar crate escapes TEXT values itself
    for category in &todo.categories {
        vtodo.append_multi_property(Property::new("CATEGORIES", category));
    }

    if let Some(priority) = todo.priority {
        vtodo.add_property("PRIORITY", priority.to_string());
    }

    if let Some(status) = todo.status {
        vtodo.add_property("STATUS", status.as_ics_str());
    }

    if let Some(ref description) = todo.description {
        vtodo.description(description);
    }

    if let Some(ref rrule) = todo.rrule {
        vtodo.add_property("RRULE", rrule.to_rrule());
    }

    vtodo.done()
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with our own
/// - Remove CALSCALE:GREGORIAN (it's the default)
fn normalize_ics(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Add a date or date-time property formatted for its TodoTime variant
fn add_datetime_property(vtodo: &mut icalendar::Todo, name: &str, time: &TodoTime) {
    match time {
        TodoTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            vtodo.append_property(prop);
        }
        TodoTime::DateTimeUtc(dt) => {
            vtodo.add_property(name, format_utc(dt));
        }
        TodoTime::DateTimeFloating(dt) => {
            vtodo.add_property(name, dt.format("%Y%m%dT%H%M%S").to_string());
        }
        TodoTime::DateTimeZoned { datetime, tzid } => {
            let mut prop = Property::new(name, datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            vtodo.append_property(prop);
        }
    }
}
