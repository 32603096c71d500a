//! Helper utilities.

mod sync_age;

pub use sync_age::{HoursParseError, format_hours, parse_hours, sync_age_duration};
