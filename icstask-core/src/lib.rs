//! Taskwarrior tasks as iCalendar VTODOs.
//!
//! - `IcsTask` serves a Taskwarrior database as a VTODO collection
//! - `convert` maps single records in either direction
//! - `ics` reads and writes iCalendar documents

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod ics;
pub mod icstask;
pub mod recurrence;
pub mod task;
pub mod todo;

pub use config::IcsTaskConfig;
pub use error::{IcsTaskError, IcsTaskResult};
pub use gateway::{TaskGateway, TaskwarriorCli};
pub use icstask::IcsTask;
pub use task::Task;
pub use todo::Todo;
