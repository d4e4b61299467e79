pub mod business_calendar;
pub mod duration;

pub use business_calendar::add_business_minutes;
pub use duration::{format_duration, parse_duration};
