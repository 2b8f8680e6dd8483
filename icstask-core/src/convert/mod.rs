//! Field-by-field translation between tasks and VTODOs.

mod to_task;
mod to_todo;

pub use to_task::{ImportContext, priority_from_ics, to_task};
pub use to_todo::{priority_to_ics, status_to_ics, to_todo};

/// Calendar uid of a task: `uuid@host`.
pub fn uid_for(uuid: &str, host: &str) -> String {
    format!("{uuid}@{host}")
}

/// The uuid part of a calendar uid. A uid without `@` is taken as a bare uuid.
pub fn uuid_from_uid(uid: &str) -> &str {
    uid.split_once('@').map_or(uid, |(uuid, _)| uuid)
}
