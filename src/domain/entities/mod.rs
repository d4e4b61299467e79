pub mod agent;
pub mod business_hours;
pub mod conversation;
pub mod sla;

pub use agent::*;
pub use business_hours::*;
pub use conversation::*;
pub use sla::*;
