//! iCalendar text for VTODOs.
//!
//! Reading and writing goes through the icalendar crate; this module maps
//! its components onto `Todo`.

mod generate;
mod parse;

pub use generate::generate_ics;
pub use parse::parse_todos;
