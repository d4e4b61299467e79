#![allow(unused_imports)]
pub mod sla_helpers;
pub mod test_db;

pub use sla_helpers::*;
pub use test_db::*;
